use std::path::{Path, PathBuf};

use anyhow::Result;
use colored::Colorize;
use strum::{Display, EnumIter, IntoEnumIterator};

use super::{Interrupted, Shell, players, prompt, report, start, world};
use crate::{
    lifecycle::{LifecycleError, PidFile, PidStatus, ServerHandle, ServerState},
    store::{EntryStatus, OpEntry, ServerEntry, ServerRecord, ServerStore, WhitelistEntry},
    tunnel::recover_tunnel_url,
};

struct ServerRow {
    entry: ServerEntry,
    running: Option<u32>,
}

impl ServerRow {
    fn new(entry: ServerEntry) -> Self {
        let running = match PidFile::server(&entry.dir).inspect() {
            PidStatus::Running(pid) => Some(pid),
            PidStatus::Stopped => None,
        };
        Self { entry, running }
    }
}

impl std::fmt::Display for ServerRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.entry.status {
            EntryStatus::Ready(record) => {
                write!(f, "{}  {} {}", self.entry.name, record.server_type, record.version)?;
                if self.running.is_some() {
                    write!(f, "  {}", "● running".green())?;
                }
                if self.entry.linked {
                    write!(f, "  {}", self.entry.dir.display().to_string().dimmed())?;
                }
                Ok(())
            }
            EntryStatus::Corrupt(_) => write!(f, "{}  {}", self.entry.name, "(corrupt)".red()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
enum ServerAction {
    Start,
    Stop,
    #[strum(to_string = "Server info")]
    Info,
    Properties,
    Operators,
    Whitelist,
    Worlds,
    Backups,
    #[strum(to_string = "Forget tunnel address")]
    ForgetTunnel,
    #[strum(to_string = "Delete server")]
    Delete,
    Back,
}

impl ServerAction {
    fn available(self, running: bool, has_tunnel: bool) -> bool {
        match self {
            ServerAction::Start => !running,
            ServerAction::Stop => running,
            ServerAction::ForgetTunnel => has_tunnel,
            _ => true,
        }
    }
}

/// What to show on the public address line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Public<'a> {
    Address(&'a str),
    Waiting,
    LocalOnly,
}

pub(super) fn info_rows(
    record: &ServerRecord,
    dir: &Path,
    status: String,
    port: u16,
    public: Public<'_>,
) -> Vec<(&'static str, String)> {
    let mut rows = vec![
        ("Name", record.name.clone()),
        ("Type", format!("{} {}", record.server_type, record.version)),
        ("RAM", format!("{:.1} GB", f64::from(record.ram) / 1024.0)),
        ("Path", dir.display().to_string()),
        ("Status", status),
        ("Local", format!("localhost:{port}")),
    ];

    match public {
        Public::Address(address) => {
            rows.push(("Public", address.to_string()));
            if address.starts_with("bore.pub") {
                rows.push(("Note", "bore.pub can be unreliable".to_string()));
                rows.push(("", "if players cannot join, check: ps aux | grep bore".to_string()));
            }
        }
        Public::Waiting => rows.push(("Public", "Waiting for tunnel address...".to_string())),
        Public::LocalOnly => rows.push(("Public", "Local network only".to_string())),
    }

    rows
}

fn status_line(handle: &ServerHandle) -> String {
    match (handle.state(), handle.pid()) {
        (ServerState::Running, Some(pid)) => format!("● Running (pid {pid})"),
        (state, _) => format!("○ {state}"),
    }
}

pub async fn browse(shell: &mut Shell) -> Result<()> {
    loop {
        let entries = shell.store.list()?;
        if entries.is_empty() {
            prompt::warn("No servers found. Create one first!");
            return prompt::pause();
        }

        let rows: Vec<ServerRow> = entries.into_iter().map(ServerRow::new).collect();
        let Some(row) = prompt::select("Select server:", rows)? else {
            return Ok(());
        };

        match row.entry.status {
            EntryStatus::Ready(record) => {
                server_menu(shell, row.entry.dir, *record).await?;
            }
            EntryStatus::Corrupt(reason) => {
                prompt::warn(&reason);
                if prompt::confirm(
                    &format!("Delete \"{}\" and all its files?", row.entry.name),
                    false,
                )? {
                    shell.store.remove(&row.entry.name, &row.entry.dir)?;
                    prompt::success("Server deleted");
                }
            }
        }
    }
}

async fn server_menu(shell: &mut Shell, dir: PathBuf, record: ServerRecord) -> Result<()> {
    let mut record = record;

    loop {
        if let Some(url) = recover_tunnel_url(&dir) {
            record.tunnel_url = Some(url);
        }
        let mut handle = ServerHandle::open(&dir, record.clone());
        let running = handle.is_running();

        println!(
            "\n{}  {}",
            record.name.cyan().bold(),
            status_line(&handle).dimmed()
        );

        let options = ServerAction::iter()
            .filter(|a| a.available(running, record.tunnel_url.is_some()))
            .collect();
        let action = match prompt::select("Server menu:", options)? {
            None | Some(ServerAction::Back) => return Ok(()),
            Some(action) => action,
        };

        let result = match action {
            ServerAction::Start => start::start_server(shell, &mut handle).await,
            ServerAction::Stop => stop_server(shell, &mut handle).await,
            ServerAction::Info => show_info(shell, &handle),
            ServerAction::Properties => players::properties(&dir),
            ServerAction::Operators => {
                players::manage(shell, &dir, "Operators", OpEntry::new).await
            }
            ServerAction::Whitelist => {
                players::manage(shell, &dir, "Whitelist", WhitelistEntry::new).await
            }
            ServerAction::Worlds => world::worlds(&dir, running),
            ServerAction::Backups => world::backups(shell, &dir),
            ServerAction::ForgetTunnel => ServerStore::update_tunnel_url(&dir, None)
                .map(|_| prompt::success("Tunnel address cleared"))
                .map_err(Into::into),
            ServerAction::Delete => match delete_server(shell, &handle) {
                Ok(true) => return Ok(()),
                Ok(false) => Ok(()),
                Err(e) => Err(e),
            },
            ServerAction::Back => return Ok(()),
        };

        if let Err(e) = result {
            if e.is::<Interrupted>() {
                return Err(e);
            }
            report(&e)?;
        }

        match ServerStore::load(&dir) {
            Ok(fresh) => record = fresh,
            Err(e) => {
                prompt::warn(&format!("{e}"));
                return Ok(());
            }
        }
    }
}

async fn stop_server(shell: &Shell, handle: &mut ServerHandle) -> Result<()> {
    let spinner = shell.printer.spinner(format!("Stopping {}...", handle.record().name));
    let result = shell.lifecycle().stop(handle).await;
    spinner.finish_and_clear();

    let stopped = match result {
        Ok(stopped) => stopped,
        Err(LifecycleError::NotRunning) => {
            prompt::warn("Server is not running");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    if stopped.confirmed {
        prompt::success(&format!("Server stopped (pid {})", stopped.pid));
    } else {
        prompt::warn(&format!(
            "Sent the stop signal, but process {} may still be shutting down",
            stopped.pid
        ));
    }
    if let Some(e) = &stopped.kill_error {
        prompt::warn(&e.to_string());
    }
    if stopped.tunnel_stopped {
        prompt::hint("Tunnel agent stopped");
    }

    Ok(())
}

fn show_info(shell: &Shell, handle: &ServerHandle) -> Result<()> {
    let record = handle.record();
    let port = crate::lifecycle::LifecycleManager::configured_port(handle);
    let public = match &record.tunnel_url {
        Some(address) => Public::Address(address),
        None => Public::LocalOnly,
    };

    let rows = info_rows(record, handle.dir(), status_line(handle), port, public);
    println!("{}", shell.layout().render("Server Information", &rows).cyan());

    prompt::pause()
}

/// Returns `true` when the server is gone.
fn delete_server(shell: &Shell, handle: &ServerHandle) -> Result<bool> {
    if handle.is_running() {
        prompt::warn("Stop the server before deleting it");
        return Ok(false);
    }

    let record = handle.record();
    let question = format!(
        "Delete \"{}\" and everything in {}? This cannot be undone!",
        record.name,
        handle.dir().display()
    );
    if !prompt::confirm(&question.red().to_string(), false)? {
        prompt::warn("Deletion cancelled");
        return Ok(false);
    }

    shell.store.remove(&record.name, handle.dir())?;
    prompt::success(&format!("Server \"{}\" deleted", record.name));
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ServerType;

    #[test]
    fn info_rows_for_bore_include_hint() {
        let record = ServerRecord::new("test1", ServerType::Vanilla, "1.20.1", 2048, Path::new("/srv/test1"));

        let rows = info_rows(
            &record,
            Path::new("/srv/test1"),
            "● Running".into(),
            25565,
            Public::Address("bore.pub:41234"),
        );

        assert!(rows.contains(&("RAM", "2.0 GB".to_string())));
        assert!(rows.contains(&("Local", "localhost:25565".to_string())));
        assert!(rows.contains(&("Public", "bore.pub:41234".to_string())));
        assert!(rows.iter().any(|(k, _)| *k == "Note"));
    }

    #[test]
    fn local_only_without_tunnel() {
        let record = ServerRecord::new("s", ServerType::Paper, "1.21", 1024, Path::new("/srv/s"));

        let rows = info_rows(&record, Path::new("/srv/s"), "○ Stopped".into(), 25570, Public::LocalOnly);

        assert_eq!(rows.last(), Some(&("Public", "Local network only".to_string())));
    }

    #[test]
    fn start_and_stop_are_exclusive() {
        assert!(ServerAction::Start.available(false, false));
        assert!(!ServerAction::Start.available(true, false));
        assert!(ServerAction::Stop.available(true, false));
        assert!(!ServerAction::ForgetTunnel.available(true, false));
    }
}
