use anyhow::Result;
use colored::Colorize;
use strum::IntoEnumIterator;

use super::{Shell, prompt};
use crate::{platform::Platform, tunnel::TunnelService};

#[derive(Debug, Clone, PartialEq, Eq)]
enum TunnelChoice {
    About(TunnelService),
    SetDefault,
    Back,
}

impl std::fmt::Display for TunnelChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TunnelChoice::About(service) => write!(f, "About {service}"),
            TunnelChoice::SetDefault => write!(f, "Set default service"),
            TunnelChoice::Back => write!(f, "Back"),
        }
    }
}

fn choices() -> Vec<TunnelChoice> {
    TunnelService::iter()
        .map(TunnelChoice::About)
        .chain([TunnelChoice::SetDefault, TunnelChoice::Back])
        .collect()
}

fn describe(shell: &Shell, service: TunnelService) {
    prompt::title(&service.to_string());
    println!("  {}", service.summary());
    println!();

    match shell.tunnels.installer().find_installed(service) {
        Some(path) => prompt::success(&format!("Installed at {}", path.display())),
        None => prompt::hint(&format!("Install: {}", service.install_hint(shell.platform))),
    }
    if let Some(url) = service.dashboard_url() {
        prompt::hint(&format!("Dashboard: {url}"));
    }
    if service == TunnelService::Playit {
        prompt::hint("Run `redstone tutorial` for the first-time setup walkthrough");
    }
}

pub(super) fn tunneling_options(shell: &mut Shell) -> Result<()> {
    loop {
        prompt::title("Tunneling Options");

        let recommended = TunnelService::recommended(shell.platform);
        let current = shell.settings.tunnel_for(shell.platform);
        prompt::hint(&format!("Recommended on {}: {recommended}", shell.platform));
        prompt::hint(&format!("Default: {current}"));
        println!();

        let Some(choice) = prompt::select("Tunneling:", choices())? else {
            return Ok(());
        };

        match choice {
            TunnelChoice::About(service) => {
                describe(shell, service);
                println!();
                prompt::pause()?;
            }
            TunnelChoice::SetDefault => {
                let Some(service) =
                    prompt::select_from("Default service:", TunnelService::iter().collect(), &current)?
                else {
                    continue;
                };

                shell.settings.default_tunnel = Some(service);
                shell.save_settings()?;
                prompt::success(&format!("{service} is now the default tunnel"));
            }
            TunnelChoice::Back => return Ok(()),
        }
    }
}

/// First-run walkthrough for linking a Playit agent to an account.
pub fn print_playit_tutorial(platform: Platform) {
    let service = TunnelService::Playit;

    println!("\n{}\n", "Playit.gg Setup".cyan().bold());
    println!("Playit gives your server a public address without port forwarding.\n");

    println!("{}", "1. Install the agent".bold());
    println!("   {}", service.install_hint(platform));
    println!("   RedStone downloads it automatically when it can.\n");

    println!("{}", "2. Claim the agent".bold());
    println!("   The first start prints a link like https://playit.gg/claim/abc123");
    println!("   Open it, log in or sign up, and approve the agent.\n");

    println!("{}", "3. Create a Minecraft Java tunnel".bold());
    println!("   Point it at localhost and your server port (25565 by default).\n");

    println!("{}", "4. Share the address".bold());
    println!("   It looks like name.gl.joinmc.link and shows up in Server info.");
    if let Some(url) = service.dashboard_url() {
        println!("   You can always find it on {url}");
    }

    if platform.is_termux() {
        println!("\n{}", "Keep Termux open (or acquire a wakelock) while hosting.".yellow());
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_service_has_an_info_page() {
        let choices = choices();

        assert_eq!(choices.len(), TunnelService::iter().count() + 2);
        assert_eq!(TunnelChoice::About(TunnelService::Bore).to_string(), "About Bore");
        assert_eq!(choices.last(), Some(&TunnelChoice::Back));
    }
}
