use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use crate::platform::Platform;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter,
)]
#[serde(rename_all = "lowercase")]
pub enum TunnelService {
    #[strum(to_string = "Playit.gg")]
    Playit,
    Bore,
    #[strum(to_string = "ngrok")]
    Ngrok,
    Cloudflared,
    #[strum(to_string = "LocalTunnel")]
    #[serde(rename = "localtunnel")]
    LocalTunnel,
}

impl TunnelService {
    pub fn recommended(platform: Platform) -> Self {
        match platform {
            Platform::Windows => TunnelService::Playit,
            _ => TunnelService::Bore,
        }
    }

    /// Identifier used for cache directories.
    pub fn slug(self) -> &'static str {
        match self {
            TunnelService::Playit => "playit",
            TunnelService::Bore => "bore",
            TunnelService::Ngrok => "ngrok",
            TunnelService::Cloudflared => "cloudflared",
            TunnelService::LocalTunnel => "localtunnel",
        }
    }

    pub fn binary_name(self) -> &'static str {
        match self {
            TunnelService::LocalTunnel => "lt",
            other => other.slug(),
        }
    }

    /// How long to watch agent output for an address.
    pub fn wait_budget(self) -> Duration {
        match self {
            TunnelService::Playit => Duration::from_secs(30),
            TunnelService::Bore => Duration::from_secs(15),
            TunnelService::Ngrok => Duration::from_secs(20),
            TunnelService::Cloudflared => Duration::from_secs(30),
            TunnelService::LocalTunnel => Duration::from_secs(20),
        }
    }

    pub fn agent_args(self, port: u16) -> Vec<String> {
        let port = port.to_string();
        match self {
            TunnelService::Playit => Vec::new(),
            TunnelService::Bore => vec!["local".into(), port, "--to".into(), "bore.pub".into()],
            TunnelService::Ngrok => vec![
                "tcp".into(),
                port,
                "--log".into(),
                "stdout".into(),
                "--log-format".into(),
                "logfmt".into(),
            ],
            TunnelService::Cloudflared => vec![
                "tunnel".into(),
                "--url".into(),
                format!("tcp://localhost:{port}"),
            ],
            TunnelService::LocalTunnel => vec!["--port".into(), port],
        }
    }

    pub fn summary(self) -> &'static str {
        match self {
            TunnelService::Playit => {
                "Free, made for game servers. Needs a one-time claim in the browser, then gives a stable *.joinmc.link address."
            }
            TunnelService::Bore => {
                "No account needed. Gives bore.pub:<port>; the port changes on every start."
            }
            TunnelService::Ngrok => {
                "Reliable TCP tunnels. Requires a free account and `ngrok config add-authtoken <token>`."
            }
            TunnelService::Cloudflared => {
                "Quick tunnels on trycloudflare.com. Players need cloudflared on their side for raw TCP."
            }
            TunnelService::LocalTunnel => {
                "HTTP only, install with `npm install -g localtunnel`. Not suitable for Minecraft's TCP traffic."
            }
        }
    }

    pub fn dashboard_url(self) -> Option<&'static str> {
        match self {
            TunnelService::Playit => Some("https://playit.gg/account/tunnels"),
            TunnelService::Ngrok => Some("https://dashboard.ngrok.com/endpoints"),
            _ => None,
        }
    }

    pub fn install_hint(self, platform: Platform) -> String {
        match (self, platform) {
            (TunnelService::Bore, _) => "cargo install bore-cli".into(),
            (TunnelService::LocalTunnel, _) => "npm install -g localtunnel".into(),
            (TunnelService::Playit, Platform::Termux) => "pkg install playit".into(),
            (TunnelService::Cloudflared, Platform::Termux) => "pkg install cloudflared".into(),
            (service, _) => format!("download {} from its website and put it on PATH", service),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bore_arguments() {
        assert_eq!(
            TunnelService::Bore.agent_args(25565),
            vec!["local", "25565", "--to", "bore.pub"]
        );
        assert_eq!(
            TunnelService::Cloudflared.agent_args(25565),
            vec!["tunnel", "--url", "tcp://localhost:25565"]
        );
    }

    #[test]
    fn serde_names_are_lowercase() {
        assert_eq!(
            serde_json::to_string(&TunnelService::LocalTunnel).unwrap(),
            "\"localtunnel\""
        );
        assert_eq!(
            serde_json::from_str::<TunnelService>("\"playit\"").unwrap(),
            TunnelService::Playit
        );
    }

    #[test]
    fn budgets() {
        assert_eq!(TunnelService::Bore.wait_budget(), Duration::from_secs(15));
        assert_eq!(TunnelService::Playit.wait_budget(), Duration::from_secs(30));
    }
}
