use regex::Regex;
use smallvec::SmallVec;

use super::TunnelService;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detection {
    Address(String),
    /// First-run agents print a URL the user must open to link the agent to an account.
    ClaimRequired(String),
}

/// Finds a public address in agent output.
pub trait TunnelAddressExtractor: Send + Sync {
    fn scan(&self, text: &str) -> Option<Detection>;

    /// Last look at everything the agent printed before giving up.
    fn final_scan(&self, buffer: &str) -> Option<Detection> {
        self.scan(buffer)
    }
}

#[derive(Debug, Clone, Copy)]
enum Render {
    /// Capture group 1 is the address.
    Capture,
    /// Capture group 1 is a bore.pub port.
    BorePort,
}

#[derive(Debug, Clone)]
struct AddressPattern {
    regex: Regex,
    render: Render,
}

/// Ordered regexes for one provider. Claim patterns win over addresses.
#[derive(Debug, Clone)]
pub struct PatternSet {
    claims: SmallVec<[Regex; 2]>,
    addresses: SmallVec<[AddressPattern; 6]>,
}

impl PatternSet {
    fn new(claims: &[&str], addresses: &[(&str, Render)]) -> Self {
        Self {
            claims: claims.iter().filter_map(|p| compile(p)).collect(),
            addresses: addresses
                .iter()
                .filter_map(|(p, render)| {
                    compile(p).map(|regex| AddressPattern {
                        regex,
                        render: *render,
                    })
                })
                .collect(),
        }
    }

    pub fn for_service(service: TunnelService) -> Self {
        match service {
            TunnelService::Playit => Self::new(
                &[
                    r"(?i)claim.*?url:?\s*(https?://playit\.gg/claim/[a-z0-9-]+)",
                    r"(?i)(https?://playit\.gg/claim/[a-z0-9-]+)",
                ],
                &[
                    (r"(?i)([a-z0-9-]+\.gl\.joinmc\.link)", Render::Capture),
                    (r"(?i)([a-z0-9-]+\.joinmc\.link)", Render::Capture),
                    (r"(?i)address:\s*([a-z0-9-]+\.playit\.gg:\d+)", Render::Capture),
                    (r"(?i)(?:tcp|udp)://([a-z0-9-]+\.playit\.gg:\d+)", Render::Capture),
                    (r"(?i)([a-z0-9-]+\.playit\.gg:\d+)", Render::Capture),
                ],
            ),
            TunnelService::Bore => Self::new(
                &[],
                &[
                    (r"(?i)listening at bore\.pub:(\d+)", Render::BorePort),
                    (r"(?i)bore\.pub:(\d+)", Render::BorePort),
                    (r"remote_port=(\d+)", Render::BorePort),
                ],
            ),
            TunnelService::Ngrok => Self::new(
                &[],
                &[
                    (r"(?i)url=tcp://([a-z0-9.-]+\.ngrok[a-z0-9.-]*:\d+)", Render::Capture),
                    (r"(?i)tcp://([a-z0-9.-]+\.ngrok[a-z0-9.-]*:\d+)", Render::Capture),
                ],
            ),
            TunnelService::Cloudflared => Self::new(
                &[],
                &[(r"(?i)https://([a-z0-9-]+\.trycloudflare\.com)", Render::Capture)],
            ),
            TunnelService::LocalTunnel => Self::new(
                &[],
                &[(r"(?i)your url is:\s*(https://[a-z0-9-]+\.loca\.lt)", Render::Capture)],
            ),
        }
    }
}

fn compile(pattern: &str) -> Option<Regex> {
    match Regex::new(pattern) {
        Ok(regex) => Some(regex),
        Err(e) => {
            tracing::error!("Invalid tunnel pattern {}: {}", pattern, e);
            None
        }
    }
}

fn valid_bore_port(port: &str) -> Option<u16> {
    port.parse::<u16>()
        .ok()
        .filter(|p| (1025..=65534).contains(p))
}

impl TunnelAddressExtractor for PatternSet {
    fn scan(&self, text: &str) -> Option<Detection> {
        for claim in &self.claims {
            if let Some(url) = claim.captures(text).and_then(|c| c.get(1)) {
                return Some(Detection::ClaimRequired(url.as_str().to_string()));
            }
        }

        for pattern in &self.addresses {
            for caps in pattern.regex.captures_iter(text) {
                let Some(found) = caps.get(1) else {
                    continue;
                };

                match pattern.render {
                    Render::Capture => {
                        return Some(Detection::Address(found.as_str().to_lowercase()));
                    }
                    Render::BorePort => {
                        if let Some(port) = valid_bore_port(found.as_str()) {
                            return Some(Detection::Address(format!("bore.pub:{port}")));
                        }
                    }
                }
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(service: TunnelService, text: &str) -> Option<Detection> {
        PatternSet::for_service(service).scan(text)
    }

    #[test]
    fn playit_prefers_joinmc_links() {
        let out = "tunnel running\naddress: fancy-cat.playit.gg:12345\nalso fancy-cat.gl.joinmc.link";

        assert_eq!(
            scan(TunnelService::Playit, out),
            Some(Detection::Address("fancy-cat.gl.joinmc.link".into()))
        );
        assert_eq!(
            scan(TunnelService::Playit, "tcp://green-frog.playit.gg:4021 => 127.0.0.1:25565"),
            Some(Detection::Address("green-frog.playit.gg:4021".into()))
        );
    }

    #[test]
    fn playit_claim_comes_first() {
        let out = "Visit claim url: https://playit.gg/claim/ab12-cd34 to setup\nold.gl.joinmc.link";

        assert_eq!(
            scan(TunnelService::Playit, out),
            Some(Detection::ClaimRequired("https://playit.gg/claim/ab12-cd34".into()))
        );
    }

    #[test]
    fn bore_ports_are_validated() {
        assert_eq!(
            scan(TunnelService::Bore, "INFO bore_cli::client: listening at bore.pub:40123"),
            Some(Detection::Address("bore.pub:40123".into()))
        );
        assert_eq!(
            scan(TunnelService::Bore, "connected to server remote_port=51000"),
            Some(Detection::Address("bore.pub:51000".into()))
        );
        assert_eq!(scan(TunnelService::Bore, "listening at bore.pub:80"), None);
        assert_eq!(scan(TunnelService::Bore, "listening at bore.pub:99999"), None);
    }

    #[test]
    fn ngrok_and_cloudflared() {
        assert_eq!(
            scan(
                TunnelService::Ngrok,
                "t=2024 lvl=info msg=\"started tunnel\" url=tcp://4.tcp.eu.ngrok.io:13337"
            ),
            Some(Detection::Address("4.tcp.eu.ngrok.io:13337".into()))
        );
        assert_eq!(
            scan(
                TunnelService::Cloudflared,
                "|  https://quiet-river-bold.trycloudflare.com  |"
            ),
            Some(Detection::Address("quiet-river-bold.trycloudflare.com".into()))
        );
    }

    #[test]
    fn unrelated_output_yields_nothing() {
        for service in [
            TunnelService::Playit,
            TunnelService::Bore,
            TunnelService::Ngrok,
            TunnelService::Cloudflared,
            TunnelService::LocalTunnel,
        ] {
            assert_eq!(scan(service, "starting agent v0.15.0\nconnecting..."), None);
        }
    }
}
