use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;
use strum::{Display, EnumIter, IntoEnumIterator};

use super::{Shell, prompt};
use crate::{
    lifecycle::SessionWrapper,
    platform,
    store::{AppSettings, ServerStore, UuidMode},
    tunnel::TunnelService,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
enum SettingsAction {
    #[strum(to_string = "Show settings")]
    Show,
    #[strum(to_string = "Player UUID mode")]
    UuidMode,
    #[strum(to_string = "Default tunnel")]
    Tunnel,
    #[strum(to_string = "Servers directory")]
    ServersDir,
    #[strum(to_string = "Session wrapper")]
    Wrapper,
    Back,
}

fn rows(settings: &AppSettings, shell: &Shell) -> Vec<(&'static str, String)> {
    let tunnel = match settings.default_tunnel {
        Some(service) => service.to_string(),
        None => format!("{} (recommended)", TunnelService::recommended(shell.platform)),
    };

    vec![
        ("UUID mode", settings.uuid_mode.to_string()),
        ("Tunnel", tunnel),
        ("Servers", shell.store.servers_dir().display().to_string()),
        ("Wrapper", settings.session_wrapper.to_string()),
        ("Home", shell.home.root().display().to_string()),
    ]
}

pub(super) fn configure(shell: &mut Shell) -> Result<()> {
    loop {
        let action = match prompt::select("Configuration:", SettingsAction::iter().collect())? {
            None | Some(SettingsAction::Back) => return Ok(()),
            Some(action) => action,
        };

        match action {
            SettingsAction::Show => {
                let rows = rows(&shell.settings, shell);
                println!("{}", shell.layout().render("Settings", &rows).cyan());
                prompt::pause()?;
            }
            SettingsAction::UuidMode => {
                prompt::hint("offline: UUIDs derived from the name, as offline-mode servers expect");
                prompt::hint("online: UUIDs looked up from Mojang, for online-mode servers");
                let modes = vec![UuidMode::Offline, UuidMode::Online];
                let Some(mode) = prompt::select_from("UUID mode:", modes, &shell.settings.uuid_mode)?
                else {
                    continue;
                };

                shell.settings.uuid_mode = mode;
                shell.save_settings()?;
                prompt::success(&format!("New players use {mode} UUIDs"));
            }
            SettingsAction::Tunnel => {
                let current = shell.settings.tunnel_for(shell.platform);
                let Some(service) =
                    prompt::select_from("Default tunnel:", TunnelService::iter().collect(), &current)?
                else {
                    continue;
                };

                shell.settings.default_tunnel = Some(service);
                shell.save_settings()?;
                prompt::success(&format!("Default tunnel: {service}"));
            }
            SettingsAction::ServersDir => {
                let current = shell.store.servers_dir().display().to_string();
                let Some(input) = prompt::text_with("Servers directory:", Some(current.as_str()), |input| {
                    if input.is_empty() {
                        Err("Path cannot be empty".to_string())
                    } else if platform::is_restricted_path(std::path::Path::new(input)) {
                        Err("System directories cannot hold servers".to_string())
                    } else {
                        Ok(())
                    }
                })?
                else {
                    continue;
                };

                let dir = PathBuf::from(input);
                std::fs::create_dir_all(&dir)
                    .with_context(|| format!("Failed to create {}", dir.display()))?;

                shell.settings.servers_dir = (dir != shell.home.servers_dir()).then(|| dir.clone());
                shell.save_settings()?;
                shell.store = ServerStore::new(&dir);
                prompt::success(&format!("Servers are now kept in {}", dir.display()));
            }
            SettingsAction::Wrapper => {
                prompt::hint("auto picks screen, then tmux, then a plain background process");
                let Some(wrapper) = prompt::select_from(
                    "Session wrapper:",
                    SessionWrapper::iter().collect(),
                    &shell.settings.session_wrapper,
                )?
                else {
                    continue;
                };

                shell.settings.session_wrapper = wrapper;
                shell.save_settings()?;
                prompt::success(&format!("Session wrapper: {wrapper}"));
            }
            SettingsAction::Back => return Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{Platform, RedstoneHome};

    #[test]
    fn rows_show_recommended_tunnel() {
        let dir = tempfile::tempdir().unwrap();
        let shell = Shell::new(RedstoneHome::new(dir.path()), Platform::Linux).unwrap();

        let rows = rows(&shell.settings, &shell);

        assert!(rows.contains(&("UUID mode", "offline".to_string())));
        assert!(rows.contains(&("Tunnel", "Bore (recommended)".to_string())));
        assert!(rows.contains(&("Wrapper", "auto".to_string())));
    }
}
