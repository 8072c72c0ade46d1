use std::{net::TcpListener, time::Duration};

use tokio::process::Command;

use crate::platform::Platform;

/// True only when binding fails because the address is taken.
pub fn is_port_in_use(port: u16) -> bool {
    match TcpListener::bind(("0.0.0.0", port)) {
        Ok(_) => false,
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => true,
        Err(e) => {
            tracing::debug!("Probe of port {} failed: {}", port, e);
            false
        }
    }
}

async fn run_quietly(program: &str, args: &[&str]) -> bool {
    tracing::debug!("Running {} {:?}", program, args);

    match Command::new(program).args(args).output().await {
        Ok(output) => output.status.success(),
        Err(e) => {
            tracing::debug!("{} failed to start: {}", program, e);
            false
        }
    }
}

/// Kills every Java process to release `port`. Returns whether the port is free afterwards.
#[tracing::instrument(level = "info")]
pub async fn force_free_port(platform: Platform, port: u16) -> bool {
    tracing::warn!("Port {} is busy, terminating Java processes", port);

    match platform {
        Platform::Windows => {
            if !run_quietly("taskkill", &["/F", "/IM", "java.exe"]).await {
                run_quietly("wmic", &["process", "where", "name='java.exe'", "delete"]).await;
            }
        }
        Platform::Termux => {
            run_quietly("pkill", &["java"]).await;
            tokio::time::sleep(Duration::from_secs(1)).await;
            run_quietly("killall", &["-9", "java"]).await;
        }
        Platform::Linux | Platform::MacOs => {
            run_quietly("pkill", &["java"]).await;
            tokio::time::sleep(Duration::from_secs(1)).await;
            run_quietly("pkill", &["-9", "java"]).await;
        }
    }

    tokio::time::sleep(Duration::from_secs(3)).await;

    let free = !is_port_in_use(port);
    if free {
        tracing::info!("Port {} released", port);
    } else {
        tracing::warn!("Port {} is still in use", port);
    }
    free
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_bound_port() {
        let listener = TcpListener::bind(("0.0.0.0", 0)).unwrap();
        let port = listener.local_addr().unwrap().port();

        assert!(is_port_in_use(port));

        drop(listener);
        assert!(!is_port_in_use(port));
    }
}
