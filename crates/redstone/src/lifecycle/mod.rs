mod launcher;
mod pid;
mod port;
mod state;
mod watch;

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

pub use launcher::{JavaCommand, Launcher, SessionWrapper, locate_java_pid, session_name};
pub use pid::{PidFile, PidStatus, is_running};
pub use port::{force_free_port, is_port_in_use};
pub use state::{ServerHandle, ServerState};
pub use watch::{TUNNEL_POLL_INTERVAL, watch_tunnel_url};

use crate::{
    config::ConfigGenerator,
    java::{self, JavaVersion},
    platform::Platform,
    provision::SERVER_JAR,
    store::ServerProperties,
};

pub const STOP_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("Server is already running (pid {0})")]
    AlreadyRunning(u32),
    #[error("Server is not running")]
    NotRunning,
    #[error("No server.jar in `{0}`, finish the installation or pick another server type")]
    NoServerJar(PathBuf),
    #[error("Java could not be found, install Java {required} or set JAVA_HOME")]
    JavaMissing { required: JavaVersion },
    #[error("Minecraft needs Java {required}, but `{path}` is Java {found}")]
    JavaIncompatible {
        required: JavaVersion,
        found: u32,
        path: PathBuf,
    },
    #[error("Port {0} is already in use")]
    PortInUse(u16),
    #[error("Could not stop process {pid}: {reason}")]
    ProcessKillFailed { pid: u32, reason: String },
    #[error("Cannot go from {from} to {to}")]
    InvalidTransition { from: ServerState, to: ServerState },
    #[error("Failed to start `{program}`")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{launcher} exited with {status}")]
    LauncherFailed {
        launcher: &'static str,
        status: String,
    },
    #[error("Server started but its process id could not be determined")]
    PidUnknown,
    #[error("Path `{0}`")]
    Io(PathBuf, #[source] std::io::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StartOptions {
    /// Kill Java processes holding the port instead of failing with `PortInUse`.
    pub free_port: bool,
    /// Start even when the detected Java is older than required.
    pub ignore_java_mismatch: bool,
}

#[derive(Debug, Clone)]
pub struct StartReport {
    pub pid: u32,
    pub port: u16,
    pub launcher: Launcher,
    pub log_file: Option<PathBuf>,
    pub removed_locks: usize,
    /// Set when the port was busy and the force-free step ran.
    pub port_freed: Option<bool>,
}

#[derive(Debug)]
pub struct StopReport {
    pub pid: u32,
    /// Process gone after the grace period.
    pub confirmed: bool,
    pub kill_error: Option<LifecycleError>,
    pub tunnel_stopped: bool,
}

#[derive(Debug, Clone)]
pub struct LifecycleManager {
    platform: Platform,
    wrapper: SessionWrapper,
    stop_grace: Duration,
}

impl LifecycleManager {
    pub fn new(platform: Platform, wrapper: SessionWrapper) -> Self {
        Self {
            platform,
            wrapper,
            stop_grace: STOP_GRACE,
        }
    }

    pub fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    /// Port the server will bind, preferring `server.properties` over the record.
    pub fn configured_port(handle: &ServerHandle) -> u16 {
        ServerProperties::load(handle.dir())
            .ok()
            .and_then(|p| p.port())
            .unwrap_or(handle.record().port)
    }

    #[tracing::instrument(level = "info", skip_all, fields(server = %handle.record().name))]
    pub async fn start(
        &self,
        handle: &mut ServerHandle,
        options: StartOptions,
    ) -> Result<StartReport, LifecycleError> {
        if let ServerState::Running = handle.refresh() {
            return Err(LifecycleError::AlreadyRunning(handle.pid().unwrap_or_default()));
        }

        handle.transition(ServerState::Starting)?;

        match self.launch(handle, options).await {
            Ok(report) => {
                handle.set_pid(Some(report.pid));
                handle.transition(ServerState::Running)?;
                tracing::info!(
                    "Server {} running with pid {} via {}",
                    handle.record().name,
                    report.pid,
                    report.launcher.describe()
                );
                Ok(report)
            }
            Err(e) => {
                tracing::warn!("Start of {} failed: {}", handle.record().name, e);
                handle.transition(ServerState::Stopped)?;
                Err(e)
            }
        }
    }

    async fn launch(
        &self,
        handle: &ServerHandle,
        options: StartOptions,
    ) -> Result<StartReport, LifecycleError> {
        let dir = handle.dir();
        let record = handle.record();

        let jar = dir.join(SERVER_JAR);
        if !jar.is_file() {
            return Err(LifecycleError::NoServerJar(dir.to_path_buf()));
        }

        let required = java::required_java(&record.version);
        match java::resolve(&record.java_path).await {
            Some(installation) if installation.satisfies(required) => {
                tracing::debug!("Using Java {} at {}", installation.version, installation.path.display());
            }
            Some(installation) if options.ignore_java_mismatch => {
                tracing::warn!(
                    "Starting with Java {} although {} is required",
                    installation.major,
                    required
                );
            }
            Some(installation) => {
                return Err(LifecycleError::JavaIncompatible {
                    required,
                    found: installation.major,
                    path: installation.path,
                });
            }
            None => return Err(LifecycleError::JavaMissing { required }),
        }

        let port = Self::configured_port(handle);
        let mut port_freed = None;
        if is_port_in_use(port) {
            if !options.free_port {
                return Err(LifecycleError::PortInUse(port));
            }

            let freed = force_free_port(self.platform, port).await;
            if !freed {
                tracing::warn!("Port {} still busy, trying to start anyway", port);
            }
            port_freed = Some(freed);
        }

        let removed_locks = clear_session_locks(dir);

        let java = JavaCommand::for_record(record, dir);
        if let Err(e) = ConfigGenerator::new(dir).write_start_scripts(&java) {
            tracing::warn!("{:#}", e);
        }

        let launcher = Launcher::select(self.platform, self.wrapper, &record.name);
        let pid = launcher.spawn(&java, dir).await?;

        handle
            .pid_file()
            .write(pid)
            .map_err(|e| LifecycleError::Io(handle.pid_file().path().to_path_buf(), e))?;

        Ok(StartReport {
            pid,
            port,
            log_file: launcher.log_file(dir),
            launcher,
            removed_locks,
            port_freed,
        })
    }

    /// Signals the server, waits the grace period and always removes the PID file.
    #[tracing::instrument(level = "info", skip_all, fields(server = %handle.record().name))]
    pub async fn stop(&self, handle: &mut ServerHandle) -> Result<StopReport, LifecycleError> {
        let pid = match (handle.refresh(), handle.pid()) {
            (ServerState::Running, Some(pid)) => pid,
            _ => return Err(LifecycleError::NotRunning),
        };

        handle.transition(ServerState::Stopping)?;

        let kill_error = terminate(pid, handle.dir()).await.err();
        if let Some(e) = &kill_error {
            tracing::warn!("{}", e);
        }

        tokio::time::sleep(self.stop_grace).await;
        let confirmed = !is_running(pid);

        if let Err(e) = handle.pid_file().remove() {
            tracing::warn!("Failed to remove {}: {}", handle.pid_file().path().display(), e);
        }

        let tunnel_stopped = stop_tunnel_agent(handle.dir()).await;

        handle.set_pid(None);
        handle.transition(ServerState::Stopped)?;

        Ok(StopReport {
            pid,
            confirmed,
            kill_error,
            tunnel_stopped,
        })
    }
}

/// Removes `session.lock` files left in world folders by a crashed server.
pub fn clear_session_locks(dir: &Path) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let is_world = entry.file_name().to_string_lossy().starts_with("world");
        let lock = entry.path().join("session.lock");

        if is_world && lock.is_file() {
            match std::fs::remove_file(&lock) {
                Ok(()) => {
                    tracing::debug!("Removed stale lock {}", lock.display());
                    removed += 1;
                }
                Err(e) => tracing::warn!("Could not remove {}: {}", lock.display(), e),
            }
        }
    }
    removed
}

/// Stops the tunnel agent recorded in `tunnel.pid`, if any.
pub async fn stop_tunnel_agent(dir: &Path) -> bool {
    let pid_file = PidFile::tunnel(dir);
    let stopped = match pid_file.inspect() {
        PidStatus::Running(pid) => match terminate(pid, dir).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Tunnel agent: {}", e);
                false
            }
        },
        PidStatus::Stopped => false,
    };

    if let Err(e) = pid_file.remove() {
        tracing::warn!("Failed to remove {}: {}", pid_file.path().display(), e);
    }
    stopped
}

#[cfg(unix)]
async fn terminate(pid: u32, _dir: &Path) -> Result<(), LifecycleError> {
    use nix::{
        sys::signal::{Signal, kill},
        unistd::Pid,
    };

    let raw = i32::try_from(pid).map_err(|e| LifecycleError::ProcessKillFailed {
        pid,
        reason: e.to_string(),
    })?;

    kill(Pid::from_raw(raw), Signal::SIGTERM).map_err(|errno| {
        LifecycleError::ProcessKillFailed {
            pid,
            reason: errno.desc().to_string(),
        }
    })
}

#[cfg(windows)]
async fn terminate(pid: u32, dir: &Path) -> Result<(), LifecycleError> {
    use tokio::process::Command;

    // The recorded pid may belong to the console wrapper; match the JVM by its working directory.
    let script = format!(
        "Get-CimInstance Win32_Process -Filter \"Name='java.exe'\" | \
         Where-Object {{ $_.CommandLine -like '*{}*' }} | \
         ForEach-Object {{ Stop-Process -Id $_.ProcessId -Force }}",
        dir.display()
    );
    if let Err(e) = Command::new("powershell")
        .arg("-NoProfile")
        .arg("-Command")
        .arg(&script)
        .output()
        .await
    {
        tracing::debug!("PowerShell process match failed: {}", e);
    }

    let output = Command::new("taskkill")
        .arg("/PID")
        .arg(pid.to_string())
        .args(["/F", "/T"])
        .output()
        .await
        .map_err(|e| LifecycleError::ProcessKillFailed {
            pid,
            reason: e.to_string(),
        })?;

    if output.status.success() || !is_running(pid) {
        Ok(())
    } else {
        Err(LifecycleError::ProcessKillFailed {
            pid,
            reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ServerRecord, ServerType};

    fn handle(dir: &Path) -> ServerHandle {
        let record = ServerRecord::new("s", ServerType::Vanilla, "1.20.1", 1024, dir);
        ServerHandle::open(dir, record)
    }

    #[test]
    fn clears_world_session_locks() {
        let dir = tempfile::tempdir().unwrap();
        for world in ["world", "world_nether", "plugins"] {
            std::fs::create_dir_all(dir.path().join(world)).unwrap();
            std::fs::write(dir.path().join(world).join("session.lock"), b"").unwrap();
        }

        assert_eq!(clear_session_locks(dir.path()), 2);
        assert!(dir.path().join("plugins").join("session.lock").exists());
        assert!(!dir.path().join("world").join("session.lock").exists());
    }

    #[tokio::test]
    async fn start_refuses_when_already_running() {
        let dir = tempfile::tempdir().unwrap();
        PidFile::server(dir.path()).write(std::process::id()).unwrap();
        let mut handle = handle(dir.path());
        let manager = LifecycleManager::new(Platform::Linux, SessionWrapper::None);

        let err = manager
            .start(&mut handle, StartOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, LifecycleError::AlreadyRunning(pid) if pid == std::process::id()));
    }

    #[tokio::test]
    async fn start_without_jar_falls_back_to_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let mut handle = handle(dir.path());
        let manager = LifecycleManager::new(Platform::Linux, SessionWrapper::None);

        let err = manager
            .start(&mut handle, StartOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, LifecycleError::NoServerJar(_)));
        assert_eq!(handle.state(), ServerState::Stopped);
    }

    #[tokio::test]
    async fn stop_requires_running_server() {
        let dir = tempfile::tempdir().unwrap();
        let mut handle = handle(dir.path());
        let manager = LifecycleManager::new(Platform::Linux, SessionWrapper::None);

        assert!(matches!(
            manager.stop(&mut handle).await,
            Err(LifecycleError::NotRunning)
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stop_terminates_and_removes_pid_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut child = tokio::process::Command::new("sleep")
            .arg("30")
            .spawn()
            .unwrap();
        let pid = child.id().unwrap();
        PidFile::server(dir.path()).write(pid).unwrap();

        let mut handle = handle(dir.path());
        assert_eq!(handle.state(), ServerState::Running);

        let manager = LifecycleManager::new(Platform::Linux, SessionWrapper::None)
            .with_stop_grace(Duration::from_millis(50));
        let report = manager.stop(&mut handle).await.unwrap();

        assert_eq!(report.pid, pid);
        assert!(report.kill_error.is_none());
        assert!(!PidFile::server(dir.path()).exists());
        assert_eq!(handle.state(), ServerState::Stopped);

        let status = child.wait().await.unwrap();
        assert!(!status.success());
    }
}
