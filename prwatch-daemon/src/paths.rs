use std::path::{Path, PathBuf};
use std::time::Duration;

use prwatch_core::store::prwatch_root;

pub const DAEMON_SOCKET: &str = "daemon.sock";
pub const UPDATE_LOCK: &str = "update.lock";

/// Shortest timer period, regardless of the configured interval.
pub const MIN_PERIOD: Duration = Duration::from_secs(60);

pub fn socket_path(home: &Path) -> PathBuf {
    prwatch_root(home).join(DAEMON_SOCKET)
}

/// Advisory lock held for the duration of every cycle under `home`.
pub fn lock_path(home: &Path) -> PathBuf {
    prwatch_root(home).join(UPDATE_LOCK)
}

/// Timer period for a configured interval in minutes.
pub fn cycle_period(interval_minutes: u64) -> Duration {
    Duration::from_secs(interval_minutes.saturating_mul(60)).max(MIN_PERIOD)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_lives_under_prwatch_root() {
        let path = socket_path(Path::new("/home/u"));
        assert_eq!(path, PathBuf::from("/home/u/.prwatch/daemon.sock"));
    }

    #[test]
    fn lock_sits_beside_socket() {
        let home = Path::new("/home/u");
        assert_eq!(lock_path(home).parent(), socket_path(home).parent());
    }

    #[test]
    fn period_is_clamped_to_one_minute() {
        assert_eq!(cycle_period(0), MIN_PERIOD);
        assert_eq!(cycle_period(15), Duration::from_secs(900));
    }
}
