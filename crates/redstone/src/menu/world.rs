use std::{fmt, path::Path};

use anyhow::Result;
use colored::Colorize;
use strum::{Display, EnumIter, IntoEnumIterator};

use super::{Shell, prompt};
use crate::{
    store::ServerProperties,
    world::{self, Backup, World},
};

const DEFAULT_LEVEL: &str = "world";

fn active_level(dir: &Path) -> String {
    ServerProperties::load(dir)
        .ok()
        .and_then(|p| p.get("level-name").map(str::to_string))
        .unwrap_or_else(|| DEFAULT_LEVEL.to_string())
}

struct WorldRow<'a> {
    world: World,
    active: &'a str,
}

impl fmt::Display for WorldRow<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}  {}", self.world.name, world::format_bytes(self.world.size))?;
        if self.world.name == self.active {
            write!(f, "  {}", "(active)".green())?;
        }
        Ok(())
    }
}

struct BackupRow(Backup);

impl fmt::Display for BackupRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let backup = &self.0;
        write!(f, "{}  {}  {}", backup.world, backup.stamp, world::format_bytes(backup.size))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
enum WorldAction {
    List,
    Create,
    Switch,
    Delete,
    Back,
}

pub(super) fn worlds(dir: &Path, running: bool) -> Result<()> {
    loop {
        let action = match prompt::select("Worlds:", WorldAction::iter().collect())? {
            None | Some(WorldAction::Back) => return Ok(()),
            Some(action) => action,
        };

        let active = active_level(dir);
        let found = world::list_worlds(dir)?;

        match action {
            WorldAction::List => {
                prompt::title("Worlds");
                if found.is_empty() {
                    prompt::hint("No worlds yet, the server creates one on first start");
                }
                for world in found {
                    println!("  • {}", WorldRow { world, active: &active });
                }
                println!();
                prompt::pause()?;
            }
            WorldAction::Create => {
                let Some(name) = prompt::text_with("World name:", None, |name| {
                    world::validate_name(name).map_err(|e| e.to_string())
                })?
                else {
                    continue;
                };

                world::create_world(dir, &name)?;
                prompt::success(&format!("Created world folder {name}"));
                if prompt::confirm(&format!("Make {name} the active world?"), true)? {
                    world::switch_world(dir, &name)?;
                    prompt::success(&format!("{name} is loaded on next start"));
                }
            }
            WorldAction::Switch => {
                let rows: Vec<WorldRow> = found.into_iter().map(|world| WorldRow { world, active: &active }).collect();
                let Some(row) = prompt::select("Switch to:", rows)? else {
                    continue;
                };

                world::switch_world(dir, &row.world.name)?;
                prompt::success(&format!("{} is loaded on next start", row.world.name));
                if running {
                    prompt::hint("Restart the server to apply");
                }
            }
            WorldAction::Delete => {
                let rows: Vec<WorldRow> = found.into_iter().map(|world| WorldRow { world, active: &active }).collect();
                let Some(row) = prompt::select("Delete:", rows)? else {
                    continue;
                };
                let name = &row.world.name;

                if running && *name == active {
                    prompt::warn("Stop the server before deleting the active world");
                    continue;
                }

                let question = format!("Delete world {name} permanently?");
                if prompt::confirm(&question.red().to_string(), false)? {
                    world::delete_world(dir, name)?;
                    prompt::success(&format!("Deleted {name}"));
                }
            }
            WorldAction::Back => return Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
enum BackupAction {
    Create,
    List,
    Restore,
    Back,
}

pub(super) fn backups(shell: &Shell, dir: &Path) -> Result<()> {
    loop {
        let action = match prompt::select("Backups:", BackupAction::iter().collect())? {
            None | Some(BackupAction::Back) => return Ok(()),
            Some(action) => action,
        };

        match action {
            BackupAction::Create => {
                let worlds = world::list_worlds(dir)?;
                if worlds.is_empty() {
                    prompt::warn("No worlds to back up");
                    continue;
                }

                let active = active_level(dir);
                let rows: Vec<WorldRow> = worlds.into_iter().map(|world| WorldRow { world, active: &active }).collect();
                let Some(row) = prompt::select("World:", rows)? else {
                    continue;
                };

                let spinner = shell.printer.spinner(format!("Backing up {}...", row.world.name));
                let result = world::create_backup(dir, &row.world.name);
                spinner.finish_and_clear();

                let backup = result?;
                prompt::success(&format!(
                    "Saved {} ({})",
                    backup.path.display(),
                    world::format_bytes(backup.size)
                ));
            }
            BackupAction::List => {
                prompt::title("Backups");
                let backups = world::list_backups(dir)?;
                if backups.is_empty() {
                    prompt::hint(&format!("Nothing in {}", world::backups_dir(dir).display()));
                }
                for backup in backups {
                    println!("  • {}", BackupRow(backup));
                }
                println!();
                prompt::pause()?;
            }
            BackupAction::Restore => {
                let rows = world::list_backups(dir)?.into_iter().map(BackupRow).collect();
                let Some(BackupRow(backup)) = prompt::select("Restore:", rows)? else {
                    continue;
                };

                let question = format!("Replace world {} with the {} backup?", backup.world, backup.stamp);
                if !prompt::confirm(&question.red().to_string(), false)? {
                    continue;
                }

                let spinner = shell.printer.spinner(format!("Restoring {}...", backup.world));
                let result = world::restore_backup(dir, &backup);
                spinner.finish_and_clear();

                result?;
                prompt::success(&format!("Restored {}", backup.world));
            }
            BackupAction::Back => return Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_level_defaults_to_world() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(active_level(dir.path()), "world");

        std::fs::write(dir.path().join("server.properties"), "level-name=skyblock\n").unwrap();
        assert_eq!(active_level(dir.path()), "skyblock");
    }

    #[test]
    fn world_rows_mark_the_active_world() {
        colored::control::set_override(false);
        let row = WorldRow {
            world: World {
                name: "world".into(),
                path: "/srv/s/world".into(),
                size: 2048,
            },
            active: "world",
        };

        assert_eq!(row.to_string(), "world  2 KB  (active)");
    }
}
