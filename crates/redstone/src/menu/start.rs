use std::{path::Path, sync::LazyLock};

use anyhow::Result;
use colored::Colorize;
use regex::Regex;
use strum::IntoEnumIterator;

use super::{
    Shell, prompt,
    servers::{Public, info_rows},
    terminal,
    tunnel::print_playit_tutorial,
};
use crate::{
    lifecycle::{
        LifecycleError, ServerHandle, StartOptions, StartReport, TUNNEL_POLL_INTERVAL,
        watch_tunnel_url,
    },
    store::ServerStore,
    tunnel::{TunnelOutcome, TunnelService, TunnelSession, spawn_late_watch},
};

static BORE_ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^bore\.pub:\d{1,5}$").expect("valid bore address regex"));

fn validate_bore_address(input: &str) -> Result<(), String> {
    if input.is_empty() || BORE_ADDRESS.is_match(input) {
        Ok(())
    } else {
        Err("Expected bore.pub:<port>".into())
    }
}

/// Asks whether to open a tunnel and with which service. `None` means local only.
fn ask_tunnel(shell: &Shell) -> Result<Option<TunnelService>> {
    let default = shell.settings.tunnel_for(shell.platform);

    if !prompt::confirm(&format!("Start with tunnel ({default} - recommended)?"), true)? {
        return Ok(None);
    }

    prompt::select_from("Tunnel service:", TunnelService::iter().collect(), &default)
}

/// Starts the process, offering to retry on a busy port or a Java mismatch.
async fn launch(shell: &Shell, handle: &mut ServerHandle) -> Result<Option<StartReport>> {
    let lifecycle = shell.lifecycle();
    let mut options = StartOptions::default();

    loop {
        let spinner = shell.printer.spinner(format!("Starting {}...", handle.record().name));
        let result = lifecycle.start(handle, options).await;
        spinner.finish_and_clear();

        match result {
            Ok(report) => return Ok(Some(report)),
            Err(LifecycleError::PortInUse(port)) if !options.free_port => {
                prompt::warn(&format!("Port {port} is already in use"));
                if !prompt::confirm("Stop the Java processes holding it and retry?", false)? {
                    return Ok(None);
                }
                options.free_port = true;
            }
            Err(e @ LifecycleError::JavaIncompatible { .. }) if !options.ignore_java_mismatch => {
                prompt::warn(&e.to_string());
                if !prompt::confirm("Start anyway?", false)? {
                    return Ok(None);
                }
                options.ignore_java_mismatch = true;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

async fn open_tunnel(shell: &Shell, handle: &ServerHandle, service: TunnelService, port: u16) -> Result<()> {
    let dir = handle.dir();
    let spinner = shell
        .printer
        .spinner(format!("Opening {service} tunnel for port {port}..."));
    let result = shell.tunnels.acquire(service, port, dir).await;
    spinner.finish_and_clear();

    let session = match result {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!("Tunnel failed: {}", e);
            println!("{} {}", "Tunnel failed, continuing without tunnel:".red(), e);
            prompt::hint(&format!("Install manually: {}", service.install_hint(shell.platform)));
            return Ok(());
        }
    };

    match &session.outcome {
        TunnelOutcome::Address(address) => {
            prompt::success(&format!("Public address: {address}"));
        }
        TunnelOutcome::ClaimRequired(url) => {
            prompt::warn("Playit needs to be linked to your account once:");
            println!("  1. Open {}", url.cyan());
            println!("  2. Log in or create a free account and approve the agent");
            println!("  3. The address shows up here once the tunnel is ready");
            watch_late(&session, dir);
        }
        TunnelOutcome::TimedOut if service == TunnelService::Bore => {
            prompt::warn("Bore did not report its address in time");
            prompt::hint(&format!("Check {} for a line like bore.pub:12345", session.log_file.display()));
            let address = prompt::text_with(
                "Public address (empty to skip):",
                None,
                validate_bore_address,
            )?;
            if let Some(address) = address.filter(|a| !a.is_empty()) {
                ServerStore::update_tunnel_url(dir, Some(address.as_str()))?;
                prompt::success(&format!("Public address: {address}"));
            }
        }
        TunnelOutcome::TimedOut => {
            prompt::warn(&format!("{service} is running but has not reported an address yet"));
            if let Some(url) = service.dashboard_url() {
                prompt::hint(&format!("Find it on {url}"));
            }
            watch_late(&session, dir);
        }
    }

    Ok(())
}

fn watch_late(session: &TunnelSession, dir: &Path) {
    if let Err(e) = spawn_late_watch(session.service, session.log_file.clone(), dir.to_path_buf(), session.pid) {
        tracing::warn!("Could not start the tunnel address watch: {}", e);
    }
}

pub async fn start_server(shell: &Shell, handle: &mut ServerHandle) -> Result<()> {
    let version = handle.record().version.clone();
    prompt::hint(&format!("Players must join with Minecraft {version}"));

    let service = ask_tunnel(shell)?;
    if service == Some(TunnelService::Playit)
        && shell
            .tunnels
            .installer()
            .find_installed(TunnelService::Playit)
            .is_none()
    {
        print_playit_tutorial(shell.platform);
        prompt::pause()?;
    }

    let Some(report) = launch(shell, handle).await? else {
        return Ok(());
    };

    prompt::success(&format!(
        "Server started (pid {}) via {}",
        report.pid,
        report.launcher.describe()
    ));
    if report.removed_locks > 0 {
        prompt::hint(&format!("Removed {} stale session.lock file(s)", report.removed_locks));
    }
    if report.port_freed == Some(false) {
        prompt::warn(&format!("Port {} may still be busy", report.port));
    }

    if let Some(service) = service {
        open_tunnel(shell, handle, service, report.port).await?;
    }

    running_screen(shell, handle, &report, service.is_some()).await
}

/// Shows the running server until Enter, refreshing when a tunnel address appears.
async fn running_screen(
    shell: &Shell,
    handle: &ServerHandle,
    report: &StartReport,
    tunneled: bool,
) -> Result<()> {
    let dir = handle.dir().to_path_buf();
    let mut address = ServerStore::load(&dir)?.tunnel_url;
    let mut updates = watch_tunnel_url(dir.clone(), address.clone(), TUNNEL_POLL_INTERVAL);

    let mut enter = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        std::io::stdin().read_line(&mut line)
    });

    loop {
        terminal::clear_screen();

        let public = match (&address, tunneled) {
            (Some(address), _) => Public::Address(address),
            (None, true) => Public::Waiting,
            (None, false) => Public::LocalOnly,
        };
        let status = format!("● Running (pid {})", report.pid);
        let rows = info_rows(handle.record(), &dir, status, report.port, public);
        println!("{}", shell.layout().render("Server Running", &rows).green());

        if let Some(hint) = report.launcher.attach_hint() {
            prompt::hint(&format!("Console: {hint}"));
        }
        if let Some(log) = &report.log_file {
            prompt::hint(&format!("Log: {}", log.display()));
        }
        println!("\n{}", "Press Enter to return to the menu (the server keeps running)".dimmed());

        tokio::select! {
            _ = &mut enter => return Ok(()),
            update = updates.recv() => match update {
                Some(url) => address = Some(url),
                None => {
                    let _ = (&mut enter).await;
                    return Ok(());
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bore_address_entry() {
        assert!(validate_bore_address("bore.pub:41234").is_ok());
        assert!(validate_bore_address("").is_ok());
        assert!(validate_bore_address("bore.pub").is_err());
        assert!(validate_bore_address("example.com:25565").is_err());
    }
}
