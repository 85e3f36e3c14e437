//! One cycle at a time per home directory, across processes.
//!
//! The orchestrator's in-flight flag only covers its own process. The CLI
//! fallback and the daemon each build their own orchestrator, so every cycle
//! also holds an exclusive advisory lock on `~/.prwatch/update.lock`.

use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::Path;

use fs2::FileExt;

use prwatch_core::store::prwatch_root;
use prwatch_sync::{CycleOutcome, Orchestrator, SkipReason};

use crate::error::{io_err, DaemonError};
use crate::paths::lock_path;

/// Held lock; released when dropped.
#[derive(Debug)]
pub struct CycleLock {
    _file: File,
}

impl CycleLock {
    /// Non-blocking. `Ok(None)` when someone else holds the lock.
    pub fn try_acquire(home: &Path) -> Result<Option<Self>, DaemonError> {
        let root = prwatch_root(home);
        fs::create_dir_all(&root).map_err(|e| io_err(&root, e))?;

        let path = lock_path(home);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| io_err(&path, e))?;

        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => Ok(Some(Self { _file: file })),
            Err(err) if is_contended(&err) => Ok(None),
            Err(err) => Err(io_err(&path, err)),
        }
    }
}

fn is_contended(err: &std::io::Error) -> bool {
    err.kind() == ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

/// Run one cycle under the lock. A held lock reads as [`SkipReason::Busy`].
pub async fn run_locked_cycle(
    home: &Path,
    orchestrator: &Orchestrator,
) -> Result<CycleOutcome, DaemonError> {
    let Some(_lock) = CycleLock::try_acquire(home)? else {
        tracing::info!("another prwatch process is updating; skipping");
        return Ok(CycleOutcome::Skipped {
            reason: SkipReason::Busy,
        });
    };
    Ok(orchestrator.run_cycle().await?)
}
