//! Settings and state persistence.
//!
//! # Storage layout
//!
//! ```text
//! ~/.prwatch/
//!   config.yaml   (user settings: token, repositories, interval; mode 0600)
//!   state.json    (machine state: tab group handle, last update; mode 0600)
//! ```
//!
//! # API pattern
//!
//! Free functions take an explicit `home: &Path` (`*_at`) so tests can point
//! them at a `TempDir`. [`FileStore`] wraps them behind the [`StateStore`]
//! trait consumed by the sync pipeline; [`MemoryStore`] is the in-process
//! equivalent used by tests and dry runs.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::error::{io_err, StoreError};
use crate::types::{GroupId, RepoSlug, Settings, SyncState, Token};

pub const CONFIG_FILE: &str = "config.yaml";
pub const STATE_FILE: &str = "state.json";

// ---------------------------------------------------------------------------
// 1. Path helpers
// ---------------------------------------------------------------------------

/// `<home>/.prwatch/`
pub fn prwatch_root(home: &Path) -> PathBuf {
    home.join(".prwatch")
}

/// `<home>/.prwatch/config.yaml`: pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    prwatch_root(home).join(CONFIG_FILE)
}

/// `<home>/.prwatch/state.json`: pure, no I/O.
pub fn state_path_at(home: &Path) -> PathBuf {
    prwatch_root(home).join(STATE_FILE)
}

/// Resolve the user's home directory.
pub fn default_home() -> Result<PathBuf, StoreError> {
    dirs::home_dir().ok_or(StoreError::HomeNotFound)
}

// ---------------------------------------------------------------------------
// 2. Settings
// ---------------------------------------------------------------------------

/// Load `config.yaml`. A missing file yields [`Settings::default`].
pub fn load_settings_at(home: &Path) -> Result<Settings, StoreError> {
    let path = config_path_at(home);
    let Some(contents) = read_optional(&path)? else {
        return Ok(Settings::default());
    };
    if contents.trim().is_empty() {
        return Ok(Settings::default());
    }
    serde_yaml::from_str(&contents).map_err(|e| StoreError::Parse {
        path,
        message: e.to_string(),
    })
}

/// Atomically save `config.yaml` (`.tmp` sibling → `chmod 0600` → `rename`).
pub fn save_settings_at(home: &Path, settings: &Settings) -> Result<(), StoreError> {
    let yaml = serde_yaml::to_string(settings)?;
    write_atomic(&config_path_at(home), yaml.as_bytes())
}

/// Store a new credential, keeping every other setting.
pub fn set_token_at(home: &Path, token: Token) -> Result<(), StoreError> {
    let mut settings = load_settings_at(home)?;
    settings.token = Some(token);
    save_settings_at(home, &settings)
}

/// Validate and append a repository. Rejects malformed slugs and duplicates.
pub fn add_repository_at(home: &Path, raw: &str) -> Result<RepoSlug, StoreError> {
    let slug: RepoSlug = raw.parse()?;
    let mut settings = load_settings_at(home)?;
    let canonical = slug.to_string();
    if settings.repositories.iter().any(|r| r.trim() == canonical) {
        return Err(StoreError::DuplicateRepository(canonical));
    }
    settings.repositories.push(canonical);
    save_settings_at(home, &settings)?;
    Ok(slug)
}

/// Remove a repository by its exact configured string.
pub fn remove_repository_at(home: &Path, raw: &str) -> Result<(), StoreError> {
    let mut settings = load_settings_at(home)?;
    let wanted = raw.trim();
    let before = settings.repositories.len();
    settings.repositories.retain(|r| r.trim() != wanted);
    if settings.repositories.len() == before {
        return Err(StoreError::UnknownRepository(wanted.to_owned()));
    }
    save_settings_at(home, &settings)
}

// ---------------------------------------------------------------------------
// 3. State
// ---------------------------------------------------------------------------

/// Load `state.json`. A missing file yields an empty state.
pub fn load_state_at(home: &Path) -> Result<SyncState, StoreError> {
    let path = state_path_at(home);
    let Some(contents) = read_optional(&path)? else {
        return Ok(SyncState::default());
    };
    serde_json::from_str(&contents).map_err(|e| StoreError::Parse {
        path,
        message: e.to_string(),
    })
}

pub fn save_state_at(home: &Path, state: &SyncState) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(state)?;
    write_atomic(&state_path_at(home), json.as_bytes())
}

// ---------------------------------------------------------------------------
// 4. StateStore seam
// ---------------------------------------------------------------------------

/// Key/value access used by the sync pipeline. Each call is atomic per key.
pub trait StateStore: Send + Sync {
    fn settings(&self) -> Result<Settings, StoreError>;

    fn state(&self) -> Result<SyncState, StoreError>;

    fn set_group_handle(&self, id: GroupId) -> Result<(), StoreError>;

    fn clear_group_handle(&self) -> Result<(), StoreError>;

    fn record_last_update(&self, at: DateTime<Utc>) -> Result<(), StoreError>;

    fn group_handle(&self) -> Result<Option<GroupId>, StoreError> {
        Ok(self.state()?.group_id)
    }
}

/// [`StateStore`] backed by the files under `<home>/.prwatch/`.
#[derive(Debug)]
pub struct FileStore {
    home: PathBuf,
    // Serializes read-modify-write of state.json.
    state_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self {
            home: home.into(),
            state_lock: Mutex::new(()),
        }
    }

    fn update_state(&self, apply: impl FnOnce(&mut SyncState)) -> Result<(), StoreError> {
        let _guard = lock(&self.state_lock);
        let mut state = load_state_at(&self.home)?;
        apply(&mut state);
        save_state_at(&self.home, &state)
    }
}

impl StateStore for FileStore {
    fn settings(&self) -> Result<Settings, StoreError> {
        load_settings_at(&self.home)
    }

    fn state(&self) -> Result<SyncState, StoreError> {
        load_state_at(&self.home)
    }

    fn set_group_handle(&self, id: GroupId) -> Result<(), StoreError> {
        self.update_state(|state| state.group_id = Some(id))
    }

    fn clear_group_handle(&self) -> Result<(), StoreError> {
        self.update_state(|state| state.group_id = None)
    }

    fn record_last_update(&self, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.update_state(|state| state.last_update = Some(at))
    }
}

/// In-memory [`StateStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    settings: Mutex<Settings>,
    state: Mutex<SyncState>,
}

impl MemoryStore {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings: Mutex::new(settings),
            state: Mutex::new(SyncState::default()),
        }
    }

    pub fn with_state(self, state: SyncState) -> Self {
        *lock(&self.state) = state;
        self
    }
}

impl StateStore for MemoryStore {
    fn settings(&self) -> Result<Settings, StoreError> {
        Ok(lock(&self.settings).clone())
    }

    fn state(&self) -> Result<SyncState, StoreError> {
        Ok(lock(&self.state).clone())
    }

    fn set_group_handle(&self, id: GroupId) -> Result<(), StoreError> {
        lock(&self.state).group_id = Some(id);
        Ok(())
    }

    fn clear_group_handle(&self) -> Result<(), StoreError> {
        lock(&self.state).group_id = None;
        Ok(())
    }

    fn record_last_update(&self, at: DateTime<Utc>) -> Result<(), StoreError> {
        lock(&self.state).last_update = Some(at);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn read_optional(path: &Path) -> Result<Option<String>, StoreError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(io_err(path, err)),
    }
}

/// Write flow: create parent (0700) → `<file>.tmp` → `chmod 0600` → `rename`.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    if let Some(dir) = path.parent() {
        if !dir.exists() {
            std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
            set_dir_permissions(dir)?;
        }
    }
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    std::fs::write(&tmp, bytes).map_err(|e| io_err(&tmp, e))?;
    set_file_permissions(&tmp)?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
