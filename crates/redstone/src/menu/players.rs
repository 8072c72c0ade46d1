use std::{path::Path, sync::LazyLock};

use anyhow::Result;
use colored::Colorize;
use regex::Regex;
use strum::{Display, EnumIter, IntoEnumIterator};
use uuid::Uuid;

use super::{Shell, prompt};
use crate::store::{PlayerList, ServerProperties, UuidResolver, players::PlayerEntry};

static PLAYER_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]{3,16}$").expect("valid player name regex"));

fn validate_player_name(name: &str) -> Result<(), String> {
    if PLAYER_NAME.is_match(name) {
        Ok(())
    } else {
        Err("3-16 characters: letters, digits and _".into())
    }
}

fn validate_property_key(key: &str) -> Result<(), String> {
    if key.is_empty() {
        Err("Key cannot be empty".into())
    } else if key.contains(['=', ':', '#']) || key.chars().any(char::is_whitespace) {
        Err("Key cannot contain spaces, =, : or #".into())
    } else {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
enum PropertiesAction {
    View,
    #[strum(to_string = "Set a value")]
    Set,
    #[strum(to_string = "Remove a key")]
    Remove,
    Back,
}

pub(super) fn properties(dir: &Path) -> Result<()> {
    loop {
        let mut props = ServerProperties::load(dir)?;

        let action = match prompt::select("server.properties:", PropertiesAction::iter().collect())? {
            None | Some(PropertiesAction::Back) => return Ok(()),
            Some(action) => action,
        };

        match action {
            PropertiesAction::View => {
                prompt::title("server.properties");
                for (key, value) in props.entries() {
                    println!("  {} = {}", key.cyan(), value);
                }
                println!();
                prompt::pause()?;
            }
            PropertiesAction::Set => {
                let Some(key) = prompt::text_with("Key:", None, validate_property_key)? else {
                    continue;
                };
                let current = props.get(&key).map(str::to_string);
                let Some(value) = prompt::text_with("Value:", current.as_deref(), |_| Ok(()))?
                else {
                    continue;
                };

                props.set(&key, value.as_str());
                props.save()?;
                tracing::info!("Set {}={} in {}", key, value, dir.display());
                prompt::success(&format!("{key} = {value}"));
            }
            PropertiesAction::Remove => {
                let keys: Vec<String> = props.entries().map(|(k, _)| k.to_string()).collect();
                let Some(key) = prompt::select("Key to remove:", keys)? else {
                    continue;
                };

                if props.remove(&key) {
                    props.save()?;
                    prompt::success(&format!("Removed {key}"));
                }
            }
            PropertiesAction::Back => return Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
enum ListAction {
    List,
    Add,
    Remove,
    Back,
}

/// List, add and remove entries of `ops.json` or `whitelist.json`.
pub(super) async fn manage<T: PlayerEntry>(
    shell: &Shell,
    dir: &Path,
    title: &str,
    make: fn(Uuid, &str) -> T,
) -> Result<()> {
    let resolver = UuidResolver::new(shell.settings.uuid_mode, shell.provisioner.mojang().clone());

    loop {
        let mut list = PlayerList::<T>::load(dir)?;

        let action = match prompt::select(&format!("{title}:"), ListAction::iter().collect())? {
            None | Some(ListAction::Back) => return Ok(()),
            Some(action) => action,
        };

        match action {
            ListAction::List => {
                prompt::title(title);
                if list.is_empty() {
                    prompt::hint("Nobody yet");
                }
                for entry in list.entries() {
                    println!("  • {}", entry.name());
                }
                println!();
                prompt::pause()?;
            }
            ListAction::Add => {
                let Some(name) = prompt::text_with("Player name:", None, validate_player_name)?
                else {
                    continue;
                };

                let uuid = resolver.resolve(&name).await;
                let replaced = list.add(make(uuid, &name));
                list.save()?;

                tracing::info!("Added {} ({}) to {}", name, uuid, T::FILE_NAME);
                if replaced {
                    prompt::success(&format!("Updated {name}"));
                } else {
                    prompt::success(&format!("Added {name}"));
                }
                prompt::hint(&format!("UUID {uuid} ({} mode)", shell.settings.uuid_mode));
            }
            ListAction::Remove => {
                let names: Vec<String> = list.entries().iter().map(|e| e.name().to_string()).collect();
                if names.is_empty() {
                    prompt::warn("Nobody to remove");
                    continue;
                }

                let Some(name) = prompt::select("Remove:", names)? else {
                    continue;
                };
                if list.remove(&name) {
                    list.save()?;
                    prompt::success(&format!("Removed {name}"));
                }
            }
            ListAction::Back => return Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_names() {
        assert!(validate_player_name("Notch").is_ok());
        assert!(validate_player_name("a_b_c").is_ok());
        assert!(validate_player_name("ab").is_err());
        assert!(validate_player_name("has space").is_err());
        assert!(validate_player_name("seventeen_chars__").is_err());
    }

    #[test]
    fn property_keys() {
        assert!(validate_property_key("max-players").is_ok());
        assert!(validate_property_key("").is_err());
        assert!(validate_property_key("a=b").is_err());
        assert!(validate_property_key("two words").is_err());
    }
}
