use std::{
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};
use tokio::process::Command;

use super::LifecycleError;
use crate::{platform::Platform, provision::SERVER_JAR, store::ServerRecord};

pub const SERVER_LOG: &str = "server.log";

const PID_LOOKUP_ATTEMPTS: u32 = 10;
const PID_LOOKUP_INTERVAL: Duration = Duration::from_millis(300);

/// Preferred way to keep a console attached to a running server.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SessionWrapper {
    #[default]
    Auto,
    Screen,
    Tmux,
    None,
}

/// `java -Xmx<ram>M -Xms<ram/2>M -jar <server.jar> nogui`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JavaCommand {
    pub java: String,
    pub ram_mb: u32,
    pub jar: PathBuf,
}

impl JavaCommand {
    pub fn for_record(record: &ServerRecord, dir: &Path) -> Self {
        let jar = dir.join(SERVER_JAR);
        let jar = std::path::absolute(&jar).unwrap_or(jar);
        let java = match record.java_path.trim() {
            "" => "java".to_string(),
            path => path.to_string(),
        };

        Self {
            java,
            ram_mb: record.ram,
            jar,
        }
    }

    pub fn args(&self) -> Vec<String> {
        vec![
            format!("-Xmx{}M", self.ram_mb),
            format!("-Xms{}M", (self.ram_mb / 2).max(1)),
            "-jar".to_string(),
            self.jar.to_string_lossy().into_owned(),
            "nogui".to_string(),
        ]
    }

    pub fn shell_line(&self) -> String {
        std::iter::once(self.java.clone())
            .chain(self.args())
            .map(|arg| quote(&arg))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn quote(arg: &str) -> String {
    if arg.is_empty() || arg.contains([' ', '"', '\'', '\t']) {
        format!("\"{}\"", arg.replace('"', "\\\""))
    } else {
        arg.to_string()
    }
}

/// `minecraft-<name>` with characters screen and tmux dislike replaced.
pub fn session_name(server_name: &str) -> String {
    let cleaned: String = server_name
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' => c,
            _ => '-',
        })
        .collect();

    format!("minecraft-{cleaned}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Launcher {
    WindowsConsole,
    Termux,
    Screen { session: String },
    Tmux { session: String },
    Nohup,
    Setsid,
    Direct,
}

impl Launcher {
    pub fn select(platform: Platform, wrapper: SessionWrapper, server_name: &str) -> Self {
        match platform {
            Platform::Windows => return Launcher::WindowsConsole,
            Platform::Termux => return Launcher::Termux,
            Platform::Linux | Platform::MacOs => {}
        }

        let session = session_name(server_name);
        let has = |bin: &str| which::which(bin).is_ok();

        match wrapper {
            SessionWrapper::Screen if has("screen") => Launcher::Screen { session },
            SessionWrapper::Tmux if has("tmux") => Launcher::Tmux { session },
            SessionWrapper::None => Self::background(),
            SessionWrapper::Screen | SessionWrapper::Tmux => {
                tracing::warn!("{} is not installed, picking another launcher", wrapper);
                Self::auto(session)
            }
            SessionWrapper::Auto => Self::auto(session),
        }
    }

    fn auto(session: String) -> Self {
        if which::which("screen").is_ok() {
            Launcher::Screen { session }
        } else if which::which("tmux").is_ok() {
            Launcher::Tmux { session }
        } else {
            Self::background()
        }
    }

    fn background() -> Self {
        if which::which("nohup").is_ok() {
            Launcher::Nohup
        } else if which::which("setsid").is_ok() {
            Launcher::Setsid
        } else {
            Launcher::Direct
        }
    }

    /// File the server console is redirected to, when it is not shown anywhere else.
    pub fn log_file(&self, dir: &Path) -> Option<PathBuf> {
        match self {
            Launcher::Termux => Some(dir.join("logs").join("latest.log")),
            Launcher::Nohup | Launcher::Setsid | Launcher::Direct => Some(dir.join(SERVER_LOG)),
            _ => None,
        }
    }

    pub fn attach_hint(&self) -> Option<String> {
        match self {
            Launcher::Screen { session } => Some(format!("screen -r {session}")),
            Launcher::Tmux { session } => Some(format!("tmux attach -t {session}")),
            Launcher::WindowsConsole => Some("use the console window that just opened".into()),
            _ => None,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Launcher::WindowsConsole => "new console window",
            Launcher::Termux => "termux background process",
            Launcher::Screen { .. } => "screen session",
            Launcher::Tmux { .. } => "tmux session",
            Launcher::Nohup => "nohup",
            Launcher::Setsid => "setsid",
            Launcher::Direct => "background process",
        }
    }

    fn command(&self, java: &JavaCommand, dir: &Path) -> Command {
        let mut command = match self {
            Launcher::WindowsConsole => {
                let mut c = Command::new("cmd");
                c.args(["/c", "start", "cmd", "/k"]);
                c.arg(&java.java);
                c
            }
            Launcher::Screen { session } => {
                let mut c = Command::new("screen");
                c.arg("-dmS").arg(session).arg(&java.java);
                c
            }
            Launcher::Tmux { session } => {
                let mut c = Command::new("tmux");
                c.args(["new-session", "-d", "-s"]).arg(session).arg("-c").arg(dir);
                c.arg(java.shell_line());
                return with_dir(c, dir);
            }
            Launcher::Nohup => {
                let mut c = Command::new("nohup");
                c.arg(&java.java);
                c
            }
            Launcher::Setsid => {
                let mut c = Command::new("setsid");
                c.arg(&java.java);
                c
            }
            Launcher::Termux | Launcher::Direct => Command::new(&java.java),
        };

        command.args(java.args());
        with_dir(command, dir)
    }

    /// Starts the server and returns the PID to record.
    #[tracing::instrument(level = "info", skip(java), fields(launcher = self.describe()))]
    pub async fn spawn(&self, java: &JavaCommand, dir: &Path) -> Result<u32, LifecycleError> {
        let mut command = self.command(java, dir);
        command.stdin(Stdio::null());

        if let Some(log) = self.log_file(dir) {
            let (stdout, stderr) = open_log(&log)?;
            command.stdout(stdout).stderr(stderr);
        } else {
            command.stdout(Stdio::null()).stderr(Stdio::null());
        }

        #[cfg(unix)]
        if matches!(self, Launcher::Nohup | Launcher::Direct | Launcher::Termux) {
            command.process_group(0);
        }

        tracing::debug!("Spawning {:?}", command.as_std());

        let mut child = command.spawn().map_err(|source| LifecycleError::Spawn {
            program: java.java.clone(),
            source,
        })?;

        let wrapper_pid = child.id();

        if let Launcher::Termux = self {
            acquire_wake_lock().await;
        }

        match self {
            Launcher::Screen { .. } | Launcher::Tmux { .. } => {
                let status = child.wait().await.map_err(|source| LifecycleError::Spawn {
                    program: self.describe().to_string(),
                    source,
                })?;
                if !status.success() {
                    return Err(LifecycleError::LauncherFailed {
                        launcher: self.describe(),
                        status: status.to_string(),
                    });
                }

                match locate_java_pid(&java.jar).await {
                    Some(pid) => Ok(pid),
                    None => wrapper_pid.ok_or(LifecycleError::PidUnknown),
                }
            }
            _ => wrapper_pid.ok_or(LifecycleError::PidUnknown),
        }
    }
}

fn with_dir(mut command: Command, dir: &Path) -> Command {
    command.current_dir(dir);
    command
}

fn open_log(path: &Path) -> Result<(Stdio, Stdio), LifecycleError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| LifecycleError::Io(parent.to_path_buf(), e))?;
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| LifecycleError::Io(path.to_path_buf(), e))?;
    let clone = file
        .try_clone()
        .map_err(|e| LifecycleError::Io(path.to_path_buf(), e))?;

    Ok((Stdio::from(file), Stdio::from(clone)))
}

async fn acquire_wake_lock() {
    match Command::new("termux-wake-lock").status().await {
        Ok(status) if status.success() => tracing::debug!("Termux wake lock acquired"),
        Ok(status) => tracing::debug!("termux-wake-lock exited with {}", status),
        Err(e) => tracing::debug!("termux-wake-lock unavailable: {}", e),
    }
}

/// `pgrep -f` pattern for a JVM running `jar`. Anchored on the java binary so
/// the `screen` or `tmux` wrapper that launched it does not match.
fn java_process_pattern(jar: &Path) -> String {
    format!(
        "^([^ ]*/)?java(\\.exe)? .*-jar {}",
        regex::escape(&jar.to_string_lossy())
    )
}

/// Finds the newest JVM whose command line runs `jar`.
pub async fn locate_java_pid(jar: &Path) -> Option<u32> {
    let pattern = java_process_pattern(jar);

    for _ in 0..PID_LOOKUP_ATTEMPTS {
        if let Ok(output) = Command::new("pgrep")
            .args(["-n", "-f"])
            .arg(&pattern)
            .output()
            .await
        {
            let pid = String::from_utf8_lossy(&output.stdout)
                .lines()
                .find_map(|line| line.trim().parse::<u32>().ok());
            if pid.is_some() {
                return pid;
            }
        }

        tokio::time::sleep(PID_LOOKUP_INTERVAL).await;
    }

    tracing::debug!("pgrep found no process for {}", jar.display());
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn java() -> JavaCommand {
        JavaCommand {
            java: "java".into(),
            ram_mb: 4096,
            jar: PathBuf::from("/srv/mc/server.jar"),
        }
    }

    #[test]
    fn jvm_arguments() {
        assert_eq!(
            java().args(),
            vec!["-Xmx4096M", "-Xms2048M", "-jar", "/srv/mc/server.jar", "nogui"]
        );
        assert_eq!(
            java().shell_line(),
            "java -Xmx4096M -Xms2048M -jar /srv/mc/server.jar nogui"
        );
    }

    #[test]
    fn pid_lookup_skips_session_wrappers() {
        let pattern = regex::Regex::new(&java_process_pattern(Path::new("/srv/mc/server.jar"))).unwrap();

        assert!(pattern.is_match("java -Xmx4096M -Xms2048M -jar /srv/mc/server.jar nogui"));
        assert!(pattern.is_match(
            "/usr/lib/jvm/java-21/bin/java -Xmx4096M -Xms2048M -jar /srv/mc/server.jar nogui"
        ));
        assert!(!pattern.is_match(
            "SCREEN -dmS minecraft-s java -Xmx4096M -Xms2048M -jar /srv/mc/server.jar nogui"
        ));
        assert!(!pattern.is_match("tmux new-session -d -s minecraft-s java -jar /srv/mc/server.jar"));
        assert!(!pattern.is_match("java -jar /srv/other/server.jar nogui"));
    }

    #[test]
    fn session_names_are_sanitized() {
        assert_eq!(session_name("test1"), "minecraft-test1");
        assert_eq!(session_name("my world!"), "minecraft-my-world-");
    }

    #[test]
    fn platform_specific_launchers() {
        assert_eq!(
            Launcher::select(Platform::Windows, SessionWrapper::Auto, "x"),
            Launcher::WindowsConsole
        );
        assert_eq!(
            Launcher::select(Platform::Termux, SessionWrapper::Screen, "x"),
            Launcher::Termux
        );
    }

    #[test]
    fn log_files_for_background_launchers() {
        let dir = Path::new("/srv/mc");

        assert_eq!(Launcher::Nohup.log_file(dir), Some(dir.join(SERVER_LOG)));
        assert_eq!(
            Launcher::Termux.log_file(dir),
            Some(dir.join("logs").join("latest.log"))
        );
        assert_eq!(
            Launcher::Screen {
                session: "minecraft-x".into()
            }
            .log_file(dir),
            None
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn direct_launch_records_child_pid() {
        let dir = tempfile::tempdir().unwrap();
        let fake = JavaCommand {
            java: "sh".into(),
            ram_mb: 1024,
            jar: dir.path().join(SERVER_JAR),
        };

        // `sh -Xmx1024M ...` fails fast but still produces a pid and a log file.
        let pid = Launcher::Direct.spawn(&fake, dir.path()).await.unwrap();

        assert!(pid > 0);
        assert!(dir.path().join(SERVER_LOG).exists());
    }
}
