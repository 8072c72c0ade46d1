mod create;
mod players;
pub mod prompt;
mod servers;
mod settings;
mod start;
pub mod terminal;
mod tunnel;
mod world;

use std::{io::IsTerminal, sync::Arc};

use anyhow::{Context, Result};
use colored::Colorize;
use strum::{Display, EnumIter, IntoEnumIterator};

use crate::{
    cli::printer::{Layout, Printer},
    lifecycle::LifecycleManager,
    platform::{Platform, RedstoneHome, detect_arch},
    provision::Provisioner,
    store::{AppSettings, ServerStore, StoreError},
    tunnel::{AgentInstaller, TunnelClient},
};

pub use prompt::Interrupted;
pub use tunnel::print_playit_tutorial;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
enum MainChoice {
    #[strum(to_string = "Create new server")]
    Create,
    #[strum(to_string = "List servers")]
    List,
    #[strum(to_string = "Tunneling options")]
    Tunneling,
    Configuration,
    Tutorial,
    Exit,
}

impl MainChoice {
    fn options(compact: bool) -> Vec<Self> {
        MainChoice::iter()
            .filter(|c| !compact || matches!(c, MainChoice::Create | MainChoice::List | MainChoice::Exit))
            .collect()
    }
}

/// Everything one interactive session needs, passed down instead of kept in globals.
#[derive(Debug)]
pub struct Shell {
    home: RedstoneHome,
    platform: Platform,
    settings: AppSettings,
    store: ServerStore,
    provisioner: Arc<Provisioner>,
    tunnels: TunnelClient,
    printer: Printer,
}

impl Shell {
    pub fn new(home: RedstoneHome, platform: Platform) -> Result<Self> {
        let settings_file = home.settings_file();
        let settings = match AppSettings::load(&settings_file) {
            Ok(settings) => settings,
            Err(e @ StoreError::ConfigCorrupt { .. }) => {
                tracing::warn!("{}", e);
                prompt::warn(&format!("{e}, using default settings"));
                AppSettings::default()
            }
            Err(e) => return Err(e.into()),
        };

        let servers_dir = settings
            .servers_dir
            .clone()
            .unwrap_or_else(|| home.servers_dir());
        std::fs::create_dir_all(&servers_dir)
            .with_context(|| format!("Failed to create {}", servers_dir.display()))?;

        let client = reqwest::Client::builder()
            .user_agent(concat!("redstone/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        let printer = if std::io::stdout().is_terminal() {
            Printer::Default
        } else {
            Printer::Quiet
        };
        let installer = AgentInstaller::new(
            home.agents_dir(),
            client.clone(),
            printer,
            platform,
            detect_arch(),
        );

        Ok(Self {
            provisioner: Arc::new(Provisioner::new(client, printer)),
            tunnels: TunnelClient::new(installer),
            store: ServerStore::new(servers_dir),
            home,
            platform,
            settings,
            printer,
        })
    }

    fn lifecycle(&self) -> LifecycleManager {
        LifecycleManager::new(self.platform, self.settings.session_wrapper)
    }

    fn layout(&self) -> Layout {
        if self.platform.prefers_compact_layout() {
            Layout::Compact
        } else {
            Layout::Boxed
        }
    }

    fn save_settings(&self) -> Result<()> {
        self.settings.save(&self.home.settings_file())?;
        Ok(())
    }

    fn banner(&self) {
        let version = env!("CARGO_PKG_VERSION");
        let rows = [("Version", version.to_string())];
        let title = if self.platform.is_termux() {
            "RedStone Mobile"
        } else {
            "RedStone - Minecraft Server Manager"
        };

        println!("{}", self.layout().render(title, &rows).red());
    }

    /// Main menu loop. Returns when the user picks Exit, presses ESC or hits Ctrl+C.
    pub async fn run(&mut self) -> Result<()> {
        loop {
            terminal::clear_screen();
            self.banner();

            let compact = self.platform.prefers_compact_layout();
            let message = if compact { "Menu" } else { "Main Menu" };

            let choice = match prompt::select(message, MainChoice::options(compact)) {
                Ok(Some(choice)) => choice,
                Ok(None) => break,
                Err(e) if e.is::<Interrupted>() => break,
                Err(e) => return Err(e),
            };

            if choice == MainChoice::Exit {
                break;
            }

            match self.dispatch(choice).await {
                Ok(()) => {}
                Err(e) if e.is::<Interrupted>() => break,
                Err(e) => {
                    if report(&e).is_err() {
                        break;
                    }
                }
            }
        }

        println!("{}", "Goodbye!".green());
        Ok(())
    }

    async fn dispatch(&mut self, choice: MainChoice) -> Result<()> {
        match choice {
            MainChoice::Create => create::create_server(self).await,
            MainChoice::List => servers::browse(self).await,
            MainChoice::Tunneling => tunnel::tunneling_options(self),
            MainChoice::Configuration => settings::configure(self),
            MainChoice::Tutorial => {
                print_playit_tutorial(self.platform);
                prompt::pause()
            }
            MainChoice::Exit => Ok(()),
        }
    }
}

/// Prints a failed action in red and waits for Enter. `Err` only when the user hit Ctrl+C.
fn report(e: &anyhow::Error) -> Result<()> {
    tracing::error!("{:#}", e);
    println!("\n{} {}\n", "Error:".red().bold(), format!("{e:#}").red());
    prompt::pause()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compact_menu_is_shorter() {
        assert_eq!(MainChoice::options(false).len(), 6);
        assert_eq!(
            MainChoice::options(true),
            vec![MainChoice::Create, MainChoice::List, MainChoice::Exit]
        );
        assert_eq!(MainChoice::Tunneling.to_string(), "Tunneling options");
    }

    #[test]
    fn shell_starts_with_corrupt_settings() {
        let dir = tempfile::tempdir().unwrap();
        let home = RedstoneHome::new(dir.path());
        std::fs::write(home.settings_file(), "default_tunnel = [").unwrap();

        let shell = Shell::new(home, Platform::Linux).unwrap();

        assert_eq!(shell.settings, AppSettings::default());
        assert!(dir.path().join("servers").is_dir());
    }
}
