pub mod agent;
pub mod extractor;
mod service;

use std::{
    fs,
    io::{Read, Seek, SeekFrom},
    path::{Path, PathBuf},
    process::Stdio,
    sync::LazyLock,
    time::Duration,
};

use redstone_meta::MetaError;
use regex::Regex;
use strum::IntoEnumIterator;
use tokio::{
    process::{Child, Command},
    time::Instant,
};

pub use agent::{AgentInstaller, MIN_AGENT_SIZE};
pub use extractor::{Detection, PatternSet, TunnelAddressExtractor};
pub use service::TunnelService;

use crate::{
    lifecycle::{PidFile, PidStatus, is_running, stop_tunnel_agent},
    store::ServerStore,
};

pub const TUNNEL_LOG: &str = "tunnel.log";
pub const OUTPUT_POLL: Duration = Duration::from_millis(250);

/// How long a background watch keeps reading agent output after the first wait timed out.
pub const LATE_WATCH_LIMIT: Duration = Duration::from_secs(10 * 60);
const LATE_WATCH_POLL: Duration = Duration::from_secs(1);

static ANSI_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]").expect("valid ANSI regex"));

#[derive(Debug, thiserror::Error)]
pub enum TunnelError {
    #[error("{service} is not available on this machine, install it with `{hint}`")]
    TunnelUnavailable {
        service: TunnelService,
        hint: String,
    },
    #[error("Failed to start `{program}`")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Tunnel agent exited with {status} before printing an address:\n{tail}")]
    AgentExited { status: String, tail: String },
    #[error("Downloaded agent `{0}` is only {1} bytes")]
    AgentTooSmall(PathBuf, u64),
    #[error("Archive `{0}` does not contain `{1}`")]
    MissingMember(PathBuf, String),
    #[error("Path `{0}`")]
    Io(PathBuf, #[source] std::io::Error),
    #[error(transparent)]
    Download(#[from] MetaError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TunnelOutcome {
    Address(String),
    ClaimRequired(String),
    /// The agent is still running but printed nothing recognizable in time.
    TimedOut,
}

impl From<Detection> for TunnelOutcome {
    fn from(detection: Detection) -> Self {
        match detection {
            Detection::Address(address) => TunnelOutcome::Address(address),
            Detection::ClaimRequired(url) => TunnelOutcome::ClaimRequired(url),
        }
    }
}

/// A tunnel agent left running in the background and what it printed so far.
///
/// The agent outlives the session; it is stopped through `tunnel.pid`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelSession {
    pub service: TunnelService,
    pub pid: u32,
    pub outcome: TunnelOutcome,
    pub log_file: PathBuf,
}

/// Incremental reader over an agent's log file.
#[derive(Debug)]
struct LogTail {
    path: PathBuf,
    offset: u64,
    bytes: Vec<u8>,
    /// Start of the last line that had no newline yet; the next scan begins here.
    line_start: usize,
}

impl LogTail {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            offset: 0,
            bytes: Vec::new(),
            line_start: 0,
        }
    }

    /// Text appended since the last call, starting at the last incomplete line.
    fn fresh(&mut self) -> Option<String> {
        let mut file = fs::File::open(&self.path).ok()?;
        file.seek(SeekFrom::Start(self.offset)).ok()?;

        let mut chunk = Vec::new();
        let read = file.read_to_end(&mut chunk).ok()?;
        if read == 0 {
            return None;
        }

        self.offset += read as u64;
        self.bytes.extend_from_slice(&chunk);

        let start = self.line_start;
        self.line_start = self
            .bytes
            .iter()
            .rposition(|b| *b == b'\n')
            .map(|i| i + 1)
            .unwrap_or(0)
            .max(start);

        Some(clean(&self.bytes[start..]))
    }

    fn all(&self) -> String {
        clean(&self.bytes)
    }

    fn last_lines(&self, n: usize) -> String {
        let text = self.all();
        let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
        lines[lines.len().saturating_sub(n)..].join("\n")
    }
}

fn clean(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    ANSI_ESCAPE.replace_all(&text, "").into_owned()
}

fn open_log(path: &Path) -> Result<(Stdio, Stdio), TunnelError> {
    let file = fs::File::create(path).map_err(|e| TunnelError::Io(path.to_path_buf(), e))?;
    let clone = file
        .try_clone()
        .map_err(|e| TunnelError::Io(path.to_path_buf(), e))?;

    Ok((Stdio::from(file), Stdio::from(clone)))
}

/// Spawns `command` with its output going to `log_file` and watches that file for an address.
///
/// Returns within `budget` plus one `poll`. An agent that exits before anything is found is an
/// error carrying its last output lines.
pub async fn run_agent(
    mut command: Command,
    extractor: &dyn TunnelAddressExtractor,
    log_file: &Path,
    budget: Duration,
    poll: Duration,
) -> Result<(Child, TunnelOutcome), TunnelError> {
    let (stdout, stderr) = open_log(log_file)?;
    command.stdin(Stdio::null()).stdout(stdout).stderr(stderr);

    #[cfg(unix)]
    command.process_group(0);

    let program = command.as_std().get_program().to_string_lossy().into_owned();
    tracing::debug!("Spawning tunnel agent {:?}", command.as_std());

    let mut child = command
        .spawn()
        .map_err(|source| TunnelError::Spawn { program, source })?;

    let deadline = Instant::now() + budget;
    let mut tail = LogTail::new(log_file);

    loop {
        if let Some(text) = tail.fresh() {
            if let Some(found) = extractor.scan(&text) {
                return Ok((child, found.into()));
            }
        }

        match child.try_wait() {
            Ok(Some(status)) => {
                tail.fresh();
                if let Some(found) = extractor.final_scan(&tail.all()) {
                    return Ok((child, found.into()));
                }
                return Err(TunnelError::AgentExited {
                    status: status.to_string(),
                    tail: tail.last_lines(5),
                });
            }
            Ok(None) => {}
            Err(e) => tracing::debug!("Could not poll tunnel agent: {}", e),
        }

        if Instant::now() >= deadline {
            tail.fresh();
            let outcome = extractor
                .final_scan(&tail.all())
                .map(TunnelOutcome::from)
                .unwrap_or(TunnelOutcome::TimedOut);
            return Ok((child, outcome));
        }

        tokio::time::sleep(poll).await;
    }
}

/// Starts tunnel agents for servers and records what they report.
#[derive(Debug, Clone)]
pub struct TunnelClient {
    installer: AgentInstaller,
}

impl TunnelClient {
    pub fn new(installer: AgentInstaller) -> Self {
        Self { installer }
    }

    pub fn installer(&self) -> &AgentInstaller {
        &self.installer
    }

    /// Replaces any agent already running for the server and waits for its public address.
    #[tracing::instrument(level = "info", skip(self, server_dir))]
    pub async fn acquire(
        &self,
        service: TunnelService,
        port: u16,
        server_dir: &Path,
    ) -> Result<TunnelSession, TunnelError> {
        if stop_tunnel_agent(server_dir).await {
            tracing::info!("Stopped the previous tunnel agent");
        }

        let binary = self.installer.ensure(service).await?;

        let mut command = Command::new(&binary);
        command.args(service.agent_args(port)).current_dir(server_dir);

        let log_file = server_dir.join(TUNNEL_LOG);
        let extractor = PatternSet::for_service(service);

        let (child, outcome) = run_agent(
            command,
            &extractor,
            &log_file,
            service.wait_budget(),
            OUTPUT_POLL,
        )
        .await?;

        let pid = child.id().unwrap_or_default();
        if pid != 0 {
            if let Err(e) = PidFile::tunnel(server_dir).write(pid) {
                tracing::warn!("Could not record tunnel pid {}: {}", pid, e);
            }
        }

        if let TunnelOutcome::Address(address) = &outcome {
            if let Err(e) = ServerStore::update_tunnel_url(server_dir, Some(address.as_str())) {
                tracing::warn!("Could not save tunnel address: {}", e);
            }
        }

        tracing::info!("{} tunnel: {:?}", service, outcome);

        Ok(TunnelSession {
            service,
            pid,
            outcome,
            log_file,
        })
    }
}

/// Keeps reading agent output on a dedicated thread and saves the first address
/// to `redstone.json`, so menus blocked on prompts do not stall it.
///
/// Stops when an address is saved, the agent process is gone, or [`LATE_WATCH_LIMIT`] passes.
pub fn spawn_late_watch(
    service: TunnelService,
    log_file: PathBuf,
    server_dir: PathBuf,
    agent_pid: u32,
) -> std::io::Result<std::thread::JoinHandle<Option<String>>> {
    std::thread::Builder::new()
        .name("tunnel-late-watch".into())
        .spawn(move || {
            let extractor = PatternSet::for_service(service);
            let mut tail = LogTail::new(&log_file);
            let deadline = std::time::Instant::now() + LATE_WATCH_LIMIT;

            while std::time::Instant::now() < deadline {
                if let Some(text) = tail.fresh() {
                    if let Some(Detection::Address(address)) = extractor.scan(&text) {
                        save_address(&server_dir, &address);
                        return Some(address);
                    }
                }

                if agent_pid != 0 && !is_running(agent_pid) {
                    tracing::debug!("Tunnel agent {} exited, stopping late watch", agent_pid);
                    break;
                }

                std::thread::sleep(LATE_WATCH_POLL);
            }

            None
        })
}

fn save_address(server_dir: &Path, address: &str) {
    match ServerStore::update_tunnel_url(server_dir, Some(address)) {
        Ok(_) => tracing::info!("Late tunnel address {}", address),
        Err(e) => tracing::warn!("Could not save tunnel address: {}", e),
    }
}

/// Picks up an address a still-running agent printed after the last session
/// stopped watching its log. Returns the saved address.
pub fn recover_tunnel_url(server_dir: &Path) -> Option<String> {
    let record = ServerStore::load(server_dir).ok()?;
    if record.tunnel_url.is_some() {
        return None;
    }
    if !matches!(PidFile::tunnel(server_dir).inspect(), PidStatus::Running(_)) {
        return None;
    }

    let mut tail = LogTail::new(&server_dir.join(TUNNEL_LOG));
    let text = tail.fresh()?;
    let address = TunnelService::iter().find_map(|service| {
        match PatternSet::for_service(service).scan(&text) {
            Some(Detection::Address(address)) => Some(address),
            _ => None,
        }
    })?;

    save_address(server_dir, &address);
    Some(address)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::store::{ServerRecord, ServerType};

    fn sh(script: &str) -> Command {
        let mut command = Command::new("sh");
        command.arg("-c").arg(script);
        command
    }

    #[tokio::test]
    async fn finds_bore_address() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join(TUNNEL_LOG);
        let extractor = PatternSet::for_service(TunnelService::Bore);

        let (mut child, outcome) = run_agent(
            sh("echo 'INFO listening at bore.pub:45123'; sleep 30"),
            &extractor,
            &log,
            Duration::from_secs(5),
            Duration::from_millis(50),
        )
        .await
        .unwrap();
        child.start_kill().unwrap();

        assert_eq!(outcome, TunnelOutcome::Address("bore.pub:45123".into()));
    }

    #[tokio::test]
    async fn address_split_across_writes() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join(TUNNEL_LOG);
        let extractor = PatternSet::for_service(TunnelService::Bore);

        let (mut child, outcome) = run_agent(
            sh("printf 'listening at bore.'; sleep 0.3; printf 'pub:40001\\n'; sleep 30"),
            &extractor,
            &log,
            Duration::from_secs(5),
            Duration::from_millis(50),
        )
        .await
        .unwrap();
        child.start_kill().unwrap();

        assert_eq!(outcome, TunnelOutcome::Address("bore.pub:40001".into()));
    }

    #[tokio::test]
    async fn silent_agent_times_out_on_budget() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join(TUNNEL_LOG);
        let extractor = PatternSet::for_service(TunnelService::Playit);
        let started = std::time::Instant::now();

        let (mut child, outcome) = run_agent(
            sh("echo 'starting playit agent'; sleep 5"),
            &extractor,
            &log,
            Duration::from_millis(300),
            Duration::from_millis(50),
        )
        .await
        .unwrap();
        child.start_kill().unwrap();

        assert_eq!(outcome, TunnelOutcome::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn early_exit_reports_output() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join(TUNNEL_LOG);
        let extractor = PatternSet::for_service(TunnelService::Ngrok);

        let err = run_agent(
            sh("echo 'ERROR: authentication failed'; exit 1"),
            &extractor,
            &log,
            Duration::from_secs(5),
            Duration::from_millis(50),
        )
        .await
        .unwrap_err();

        match err {
            TunnelError::AgentExited { tail, .. } => {
                assert!(tail.contains("authentication failed"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn claim_url_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join(TUNNEL_LOG);
        let extractor = PatternSet::for_service(TunnelService::Playit);

        let (mut child, outcome) = run_agent(
            sh("printf '\\033[1mVisit claim url: https://playit.gg/claim/5f2a-9c\\033[0m\\n'; sleep 30"),
            &extractor,
            &log,
            Duration::from_secs(5),
            Duration::from_millis(50),
        )
        .await
        .unwrap();
        child.start_kill().unwrap();

        assert_eq!(
            outcome,
            TunnelOutcome::ClaimRequired("https://playit.gg/claim/5f2a-9c".into())
        );
    }

    #[test]
    fn late_watch_saves_address_while_caller_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let record = ServerRecord::new("s", ServerType::Paper, "1.20.4", 2048, dir.path());
        ServerStore::save(dir.path(), &record).unwrap();

        let log = dir.path().join(TUNNEL_LOG);
        fs::write(&log, "connecting\n").unwrap();

        let handle = spawn_late_watch(
            TunnelService::Playit,
            log.clone(),
            dir.path().to_path_buf(),
            std::process::id(),
        )
        .unwrap();

        fs::write(&log, "connecting\ntunnel ready: quiet-owl.gl.joinmc.link\n").unwrap();

        // Blocking sleep stands in for a synchronous prompt.
        let mut saved = None;
        for _ in 0..50 {
            std::thread::sleep(Duration::from_millis(100));
            saved = ServerStore::load(dir.path()).unwrap().tunnel_url;
            if saved.is_some() {
                break;
            }
        }

        assert_eq!(saved.as_deref(), Some("quiet-owl.gl.joinmc.link"));
        assert_eq!(handle.join().unwrap().as_deref(), Some("quiet-owl.gl.joinmc.link"));
    }

    #[test]
    fn recovers_address_from_running_agent_log() {
        let dir = tempfile::tempdir().unwrap();
        let record = ServerRecord::new("s", ServerType::Paper, "1.20.4", 2048, dir.path());
        ServerStore::save(dir.path(), &record).unwrap();
        fs::write(
            dir.path().join(TUNNEL_LOG),
            "starting\ntunnel ready: quiet-owl.gl.joinmc.link\n",
        )
        .unwrap();

        assert_eq!(recover_tunnel_url(dir.path()), None);

        PidFile::tunnel(dir.path()).write(std::process::id()).unwrap();
        assert_eq!(
            recover_tunnel_url(dir.path()).as_deref(),
            Some("quiet-owl.gl.joinmc.link")
        );
        assert_eq!(
            ServerStore::load(dir.path()).unwrap().tunnel_url.as_deref(),
            Some("quiet-owl.gl.joinmc.link")
        );
        assert_eq!(recover_tunnel_url(dir.path()), None);
    }
}
