use std::path::{Path, PathBuf};

pub const SERVER_PID_FILE: &str = "server.pid";
pub const TUNNEL_PID_FILE: &str = "tunnel.pid";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PidStatus {
    Running(u32),
    Stopped,
}

/// Sentinel file holding the PID of a detached process as plain text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    pub fn server(dir: &Path) -> Self {
        Self {
            path: dir.join(SERVER_PID_FILE),
        }
    }

    pub fn tunnel(dir: &Path) -> Self {
        Self {
            path: dir.join(TUNNEL_PID_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn read(&self) -> Option<u32> {
        std::fs::read_to_string(&self.path)
            .ok()
            .and_then(|s| s.trim().parse().ok())
    }

    pub fn write(&self, pid: u32) -> std::io::Result<()> {
        std::fs::write(&self.path, pid.to_string())
    }

    pub fn remove(&self) -> std::io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    /// Checks the recorded process, deleting the file when it is stale or unreadable.
    pub fn inspect(&self) -> PidStatus {
        if !self.exists() {
            return PidStatus::Stopped;
        }

        match self.read() {
            Some(pid) if is_running(pid) => PidStatus::Running(pid),
            stale => {
                tracing::info!(
                    "Removing stale pid file {} ({:?})",
                    self.path.display(),
                    stale
                );
                if let Err(e) = self.remove() {
                    tracing::warn!("Failed to remove {}: {}", self.path.display(), e);
                }
                PidStatus::Stopped
            }
        }
    }
}

/// Liveness probe. Any failure counts as not running.
#[cfg(unix)]
pub fn is_running(pid: u32) -> bool {
    use nix::{sys::signal::kill, unistd::Pid};

    match i32::try_from(pid) {
        Ok(raw) if raw > 0 => kill(Pid::from_raw(raw), None).is_ok(),
        _ => false,
    }
}

#[cfg(windows)]
pub fn is_running(pid: u32) -> bool {
    let output = std::process::Command::new("tasklist")
        .arg("/FI")
        .arg(format!("PID eq {pid}"))
        .arg("/NH")
        .output();

    let needle = pid.to_string();
    match output {
        Ok(output) => String::from_utf8_lossy(&output.stdout)
            .split_whitespace()
            .any(|word| word == needle),
        Err(e) => {
            tracing::debug!("tasklist failed: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_pid_file_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = PidFile::server(dir.path());
        pid_file.write(i32::MAX as u32).unwrap();

        assert_eq!(pid_file.inspect(), PidStatus::Stopped);
        assert!(!pid_file.exists());
    }

    #[test]
    fn garbage_pid_file_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SERVER_PID_FILE), "not a pid").unwrap();

        assert_eq!(PidFile::server(dir.path()).inspect(), PidStatus::Stopped);
        assert!(!dir.path().join(SERVER_PID_FILE).exists());
    }

    #[test]
    fn own_process_is_running() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = PidFile::server(dir.path());
        pid_file.write(std::process::id()).unwrap();

        assert_eq!(
            pid_file.inspect(),
            PidStatus::Running(std::process::id())
        );
        assert!(pid_file.exists());
    }

    #[test]
    fn remove_missing_is_ok() {
        let dir = tempfile::tempdir().unwrap();

        assert!(PidFile::tunnel(dir.path()).remove().is_ok());
    }
}
