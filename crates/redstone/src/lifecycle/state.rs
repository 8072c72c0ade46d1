use std::path::{Path, PathBuf};

use strum::Display;

use super::{
    LifecycleError,
    pid::{PidFile, PidStatus},
};
use crate::store::ServerRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ServerState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl ServerState {
    pub fn can_transition_to(self, next: ServerState) -> bool {
        use ServerState::*;

        matches!(
            (self, next),
            (Stopped, Starting)
                | (Starting, Running)
                | (Starting, Stopped)
                | (Running, Stopping)
                | (Stopping, Stopped)
        )
    }
}

/// One server as seen by the current invocation.
#[derive(Debug, Clone)]
pub struct ServerHandle {
    dir: PathBuf,
    record: ServerRecord,
    pid_file: PidFile,
    state: ServerState,
    pid: Option<u32>,
}

impl ServerHandle {
    pub fn open(dir: &Path, record: ServerRecord) -> Self {
        let mut handle = Self {
            dir: dir.to_path_buf(),
            record,
            pid_file: PidFile::server(dir),
            state: ServerState::Stopped,
            pid: None,
        };
        handle.refresh();
        handle
    }

    /// Re-reads the PID file. Stale files are cleaned up.
    pub fn refresh(&mut self) -> ServerState {
        if matches!(self.state, ServerState::Starting | ServerState::Stopping) {
            return self.state;
        }

        match self.pid_file.inspect() {
            PidStatus::Running(pid) => {
                self.state = ServerState::Running;
                self.pid = Some(pid);
            }
            PidStatus::Stopped => {
                self.state = ServerState::Stopped;
                self.pid = None;
            }
        }
        self.state
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn record(&self) -> &ServerRecord {
        &self.record
    }

    pub fn pid_file(&self) -> &PidFile {
        &self.pid_file
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn is_running(&self) -> bool {
        self.state == ServerState::Running
    }

    pub(crate) fn set_pid(&mut self, pid: Option<u32>) {
        self.pid = pid;
    }

    pub(crate) fn transition(&mut self, next: ServerState) -> Result<(), LifecycleError> {
        if !self.state.can_transition_to(next) {
            return Err(LifecycleError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }

        tracing::debug!("{}: {} -> {}", self.record.name, self.state, next);
        self.state = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ServerType;

    fn handle(dir: &Path) -> ServerHandle {
        let record = ServerRecord::new("s", ServerType::Vanilla, "1.20.1", 1024, dir);
        ServerHandle::open(dir, record)
    }

    #[test]
    fn allowed_transitions() {
        use ServerState::*;

        assert!(Stopped.can_transition_to(Starting));
        assert!(Starting.can_transition_to(Stopped));
        assert!(Running.can_transition_to(Stopping));
        assert!(!Stopped.can_transition_to(Running));
        assert!(!Running.can_transition_to(Starting));
        assert!(!Stopping.can_transition_to(Running));
    }

    #[test]
    fn stale_pid_opens_as_stopped() {
        let dir = tempfile::tempdir().unwrap();
        PidFile::server(dir.path()).write(i32::MAX as u32).unwrap();

        let handle = handle(dir.path());

        assert_eq!(handle.state(), ServerState::Stopped);
        assert!(!dir.path().join(super::super::pid::SERVER_PID_FILE).exists());
    }

    #[test]
    fn rejects_invalid_transition() {
        let dir = tempfile::tempdir().unwrap();
        let mut handle = handle(dir.path());

        assert!(matches!(
            handle.transition(ServerState::Stopping),
            Err(LifecycleError::InvalidTransition { .. })
        ));
        assert!(handle.transition(ServerState::Starting).is_ok());
    }
}
