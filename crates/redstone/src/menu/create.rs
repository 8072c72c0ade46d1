use std::path::PathBuf;

use anyhow::Result;
use colored::Colorize;
use inquire::CustomType;
use strum::IntoEnumIterator;

use super::{
    Shell,
    prompt::{self, answer},
};
use crate::{
    java,
    platform::{self, Platform, SHARED_STORAGE_DIR, StorageLocation},
    provision::{CreateServerRequest, ServerSetupManager},
    store::{ServerType, UuidMode, record::DEFAULT_PORT},
};

const DEFAULT_RAM_GB: u32 = 2;

fn validate_port(port: u16) -> Result<(), String> {
    if port == 0 {
        Err("Enter a port between 1 and 65535".into())
    } else {
        Ok(())
    }
}

pub(super) fn validate_server_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("Name cannot be empty".into());
    }
    if name.starts_with('.') {
        return Err("Name cannot start with a dot".into());
    }
    if name.chars().any(|c| matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|')) {
        return Err("Name cannot contain / \\ : * ? \" < > |".into());
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum LocationChoice {
    Default(PathBuf),
    Shared,
    Custom,
}

impl std::fmt::Display for LocationChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LocationChoice::Default(dir) => write!(f, "Default - {}", dir.display()),
            LocationChoice::Shared => write!(f, "Shared storage - {SHARED_STORAGE_DIR}"),
            LocationChoice::Custom => write!(f, "Custom directory"),
        }
    }
}

fn location_choices(platform: Platform, servers_dir: PathBuf) -> Vec<LocationChoice> {
    let default = LocationChoice::Default(servers_dir);

    if !platform.is_termux() {
        return vec![default, LocationChoice::Custom];
    }

    // Shared storage is only offered first once `termux-setup-storage` has run.
    if std::path::Path::new("/storage/emulated/0").is_dir() {
        vec![LocationChoice::Shared, default, LocationChoice::Custom]
    } else {
        vec![default, LocationChoice::Shared, LocationChoice::Custom]
    }
}

fn ask_location(shell: &Shell, name: &str) -> Result<Option<StorageLocation>> {
    let choices = location_choices(shell.platform, shell.store.servers_dir().to_path_buf());
    let Some(choice) = prompt::select("Server location:", choices)? else {
        return Ok(None);
    };

    let location = match choice {
        LocationChoice::Default(_) => StorageLocation::Default,
        LocationChoice::Shared => StorageLocation::Shared,
        LocationChoice::Custom => {
            let suggestion = platform::default_custom_path(shell.platform, name)
                .to_string_lossy()
                .into_owned();
            let Some(path) = prompt::text_with(
                "Custom directory:",
                Some(suggestion.as_str()),
                |input| {
                    if input.is_empty() {
                        Err("Path cannot be empty".to_string())
                    } else if platform::is_restricted_path(std::path::Path::new(input)) {
                        Err("System directories cannot hold servers".to_string())
                    } else {
                        Ok(())
                    }
                },
            )?
            else {
                return Ok(None);
            };
            StorageLocation::Custom(PathBuf::from(path))
        }
    };

    Ok(Some(location))
}

/// Warns about a missing or too old Java. Returns whether to go on.
async fn java_ok_for(version: &str) -> Result<bool> {
    let required = java::required_java(version);

    match java::detect().await {
        Some(installation) if installation.satisfies(required) => {
            prompt::hint(&format!(
                "Java {} found at {}",
                installation.version,
                installation.path.display()
            ));
            Ok(true)
        }
        Some(installation) => {
            prompt::warn(&format!(
                "Minecraft {version} needs Java {required}, found Java {}",
                installation.major
            ));
            prompt::confirm("Create the server anyway?", false)
        }
        None => {
            prompt::warn(&format!("Java not found. Minecraft {version} needs Java {required}"));
            prompt::confirm("Create the server anyway?", false)
        }
    }
}

pub async fn create_server(shell: &Shell) -> Result<()> {
    prompt::title("Create New Minecraft Server");

    let existing = shell.store.list()?;

    let Some(name) = prompt::text_with("Server name:", Some("my-server"), validate_server_name)?
    else {
        return Ok(());
    };
    if existing.iter().any(|e| e.name.eq_ignore_ascii_case(&name)) {
        prompt::warn(&format!("A server named \"{name}\" already exists"));
        return prompt::pause();
    }

    let Some(server_type) = prompt::select("Server type:", ServerType::iter().collect())? else {
        return Ok(());
    };

    let spinner = shell.printer.spinner(format!("Fetching {server_type} versions..."));
    let versions = shell.provisioner.available_versions(server_type).await;
    spinner.finish_and_clear();

    let Some(version) = prompt::select("Minecraft version:", versions)? else {
        return Ok(());
    };

    let Some(ram_gb) = answer(
        CustomType::<u32>::new("RAM (GB):")
            .with_default(DEFAULT_RAM_GB)
            .with_error_message("Enter a whole number of gigabytes")
            .with_validator(|gb: &u32| {
                Ok(if (1..=64).contains(gb) {
                    inquire::validator::Validation::Valid
                } else {
                    inquire::validator::Validation::Invalid("Between 1 and 64 GB".into())
                })
            })
            .prompt(),
    )?
    else {
        return Ok(());
    };

    let Some(port) = answer(
        CustomType::<u16>::new("Port:")
            .with_default(DEFAULT_PORT)
            .with_error_message("Enter a port between 1 and 65535")
            .with_validator(|port: &u16| {
                Ok(match validate_port(*port) {
                    Ok(()) => inquire::validator::Validation::Valid,
                    Err(message) => inquire::validator::Validation::Invalid(message.into()),
                })
            })
            .prompt(),
    )?
    else {
        return Ok(());
    };

    let Some(location) = ask_location(shell, &name)? else {
        return Ok(());
    };

    if !java_ok_for(&version).await? {
        return Ok(());
    }

    let request = CreateServerRequest {
        name: name.clone(),
        server_type,
        version,
        ram_mb: ram_gb * 1024,
        port,
        location,
        java_path: "java".to_string(),
        online_mode: shell.settings.uuid_mode == UuidMode::Online,
    };

    let mut setup =
        ServerSetupManager::plan(&request, &shell.store, shell.provisioner.clone()).await?;
    let outcome = setup.install().await?;

    println!();
    prompt::success(&format!("Server \"{name}\" created"));

    let rows = [
        ("Type", format!("{} {}", outcome.record.server_type, outcome.record.version)),
        ("RAM", format!("{} GB", ram_gb)),
        ("Port", outcome.record.port.to_string()),
        ("Location", outcome.dir.display().to_string()),
    ];
    println!("{}", shell.layout().render(&name, &rows).cyan());

    if let Some(url) = &outcome.manual_install {
        prompt::warn(&format!(
            "{server_type} has no direct server download. Run its installer and place the server jar at:",
        ));
        println!("    {}", outcome.dir.join(crate::provision::SERVER_JAR).display());
        prompt::hint(&format!("Installer: {url}"));
    }

    if shell.platform.is_termux() {
        prompt::hint(&format!("Access files with: cd \"{}\"", outcome.dir.display()));
    }

    prompt::pause()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_names() {
        assert!(validate_server_name("test1").is_ok());
        assert!(validate_server_name("My Survival").is_ok());
        assert!(validate_server_name("").is_err());
        assert!(validate_server_name("../etc").is_err());
        assert!(validate_server_name(".hidden").is_err());
    }

    #[test]
    fn port_zero_is_refused_at_the_prompt() {
        assert!(validate_port(0).is_err());
        assert!(validate_port(1).is_ok());
        assert!(validate_port(DEFAULT_PORT).is_ok());
        assert!(validate_port(u16::MAX).is_ok());
    }

    #[test]
    fn desktop_locations() {
        let choices = location_choices(Platform::Linux, PathBuf::from("/home/a/.redstone/servers"));

        assert_eq!(choices.len(), 2);
        assert_eq!(
            choices[0].to_string(),
            "Default - /home/a/.redstone/servers"
        );
    }
}
