use std::path::{Path, PathBuf};

use notebridge_core::config::notebridge_root;
use notebridge_core::SyncConfig;

pub const DAEMON_SOCKET: &str = "daemon.sock";
pub const DAEMON_LOG: &str = "daemon.log";

pub fn socket_path(home: &Path) -> PathBuf {
    notebridge_root(home).join(DAEMON_SOCKET)
}

pub fn logs_dir(home: &Path) -> PathBuf {
    notebridge_root(home).join("logs")
}

pub fn default_log_path(home: &Path) -> PathBuf {
    logs_dir(home).join(DAEMON_LOG)
}

/// The configured `log_file`, or `logs/daemon.log` under the notebridge root.
pub fn log_path(home: &Path, config: Option<&SyncConfig>) -> PathBuf {
    config
        .and_then(|c| c.log_file.clone())
        .unwrap_or_else(|| default_log_path(home))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_files_live_under_notebridge_root() {
        let home = Path::new("/home/ada");
        assert_eq!(socket_path(home), PathBuf::from("/home/ada/.notebridge/daemon.sock"));
        assert_eq!(
            log_path(home, None),
            PathBuf::from("/home/ada/.notebridge/logs/daemon.log")
        );
    }

    #[test]
    fn configured_log_file_wins() {
        let mut config = SyncConfig::new("/n/org", "/n/vault");
        config.log_file = Some(PathBuf::from("/var/log/notebridge.log"));
        assert_eq!(
            log_path(Path::new("/home/ada"), Some(&config)),
            PathBuf::from("/var/log/notebridge.log")
        );
    }
}
