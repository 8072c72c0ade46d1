use std::{
    fs,
    path::{Path, PathBuf},
    sync::LazyLock,
};

use flate2::{Compression, bufread::GzDecoder, write::GzEncoder};
use regex::Regex;
use tar::{Archive, Builder};

use crate::{
    lifecycle::{PidFile, PidStatus},
    store::{ServerProperties, StoreError},
};

pub const BACKUPS_DIR: &str = "backups";
const LEVEL_DAT: &str = "level.dat";

static WORLD_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid world name regex"));

static BACKUP_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?<world>.+)-(?<stamp>\d{8}-\d{6})\.tar\.gz$").expect("valid backup regex")
});

#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    #[error("World names may only contain letters, numbers, `-` and `_`")]
    InvalidName(String),
    #[error("World `{0}` already exists")]
    AlreadyExists(String),
    #[error("World `{0}` not found")]
    NotFound(String),
    #[error("Backup `{0}` not found")]
    BackupNotFound(PathBuf),
    #[error("Backup `{0}` does not contain the world folder")]
    IncompleteBackup(PathBuf),
    #[error("Stop the server (pid {0}) before restoring a backup")]
    ServerRunning(u32),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Path `{0}`")]
    Io(PathBuf, #[source] std::io::Error),
}

/// A world folder, recognized by its `level.dat`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct World {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backup {
    pub world: String,
    /// `YYYYmmdd-HHMMSS` local time.
    pub stamp: String,
    pub path: PathBuf,
    pub size: u64,
}

pub fn validate_name(name: &str) -> Result<(), WorldError> {
    if WORLD_NAME.is_match(name) {
        Ok(())
    } else {
        Err(WorldError::InvalidName(name.to_string()))
    }
}

pub fn list_worlds(server_dir: &Path) -> Result<Vec<World>, WorldError> {
    let entries =
        fs::read_dir(server_dir).map_err(|e| WorldError::Io(server_dir.to_path_buf(), e))?;

    let mut worlds: Vec<World> = entries
        .flatten()
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_dir()))
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            let path = entry.path();
            (!name.starts_with('.') && path.join(LEVEL_DAT).is_file()).then(|| World {
                size: dir_size(&path),
                name,
                path,
            })
        })
        .collect();

    worlds.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(worlds)
}

/// Creates an empty world folder; the server generates its contents on first start.
pub fn create_world(server_dir: &Path, name: &str) -> Result<PathBuf, WorldError> {
    validate_name(name)?;

    let path = server_dir.join(name);
    if path.exists() {
        return Err(WorldError::AlreadyExists(name.to_string()));
    }

    fs::create_dir_all(&path).map_err(|e| WorldError::Io(path.clone(), e))?;
    tracing::info!("Created world folder {}", path.display());
    Ok(path)
}

/// Points `level-name` at `name`. Takes effect on the next start.
pub fn switch_world(server_dir: &Path, name: &str) -> Result<(), WorldError> {
    validate_name(name)?;

    let mut properties = ServerProperties::load(server_dir)?;
    properties.set("level-name", name);
    properties.save()?;

    Ok(())
}

pub fn delete_world(server_dir: &Path, name: &str) -> Result<(), WorldError> {
    validate_name(name)?;

    let path = server_dir.join(name);
    if !path.is_dir() {
        return Err(WorldError::NotFound(name.to_string()));
    }

    fs::remove_dir_all(&path).map_err(|e| WorldError::Io(path.clone(), e))?;
    tracing::info!("Deleted world {}", path.display());
    Ok(())
}

pub fn dir_size(path: &Path) -> u64 {
    let Ok(entries) = fs::read_dir(path) else {
        return 0;
    };

    entries
        .flatten()
        .map(|entry| match entry.file_type() {
            Ok(t) if t.is_dir() => dir_size(&entry.path()),
            Ok(_) => entry.metadata().map(|m| m.len()).unwrap_or(0),
            Err(_) => 0,
        })
        .sum()
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

    if bytes < 1024 {
        return format!("{bytes} B");
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rendered = format!("{value:.2}");
    let rendered = rendered.trim_end_matches('0').trim_end_matches('.');
    format!("{rendered} {}", UNITS[unit])
}

pub fn backups_dir(server_dir: &Path) -> PathBuf {
    server_dir.join(BACKUPS_DIR)
}

/// Packs `<server>/<world>` into `backups/<world>-<timestamp>.tar.gz`.
#[tracing::instrument(level = "info", skip(server_dir))]
pub fn create_backup(server_dir: &Path, world: &str) -> Result<Backup, WorldError> {
    validate_name(world)?;

    let source = server_dir.join(world);
    if !source.is_dir() {
        return Err(WorldError::NotFound(world.to_string()));
    }

    let dir = backups_dir(server_dir);
    fs::create_dir_all(&dir).map_err(|e| WorldError::Io(dir.clone(), e))?;

    let stamp = jiff::Zoned::now().strftime("%Y%m%d-%H%M%S").to_string();
    let path = dir.join(format!("{world}-{stamp}.tar.gz"));
    let io_err = |e| WorldError::Io(path.clone(), e);

    let file = fs::File::create(&path).map_err(io_err)?;
    let mut builder = Builder::new(GzEncoder::new(file, Compression::default()));
    builder.append_dir_all(world, &source).map_err(io_err)?;
    builder
        .into_inner()
        .and_then(|gz| gz.finish())
        .map_err(io_err)?;

    let size = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
    tracing::info!("Backed up {} to {} ({})", world, path.display(), format_bytes(size));

    Ok(Backup {
        world: world.to_string(),
        stamp,
        path,
        size,
    })
}

/// Backups of this server, newest first.
pub fn list_backups(server_dir: &Path) -> Result<Vec<Backup>, WorldError> {
    let dir = backups_dir(server_dir);
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(WorldError::Io(dir, e)),
    };

    let mut backups: Vec<Backup> = entries
        .flatten()
        .filter_map(|entry| {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let caps = BACKUP_NAME.captures(&file_name)?;

            Some(Backup {
                world: caps["world"].to_string(),
                stamp: caps["stamp"].to_string(),
                size: entry.metadata().map(|m| m.len()).unwrap_or(0),
                path: entry.path(),
            })
        })
        .collect();

    backups.sort_by(|a, b| b.stamp.cmp(&a.stamp).then_with(|| a.world.cmp(&b.world)));
    Ok(backups)
}

/// Replaces the backed-up world folder with the archive's contents.
///
/// The archive is unpacked into a staging folder next to the world first, so
/// a broken archive leaves the current world untouched.
#[tracing::instrument(level = "info", skip_all, fields(backup = %backup.path.display()))]
pub fn restore_backup(server_dir: &Path, backup: &Backup) -> Result<(), WorldError> {
    if let PidStatus::Running(pid) = PidFile::server(server_dir).inspect() {
        return Err(WorldError::ServerRunning(pid));
    }

    if !backup.path.is_file() {
        return Err(WorldError::BackupNotFound(backup.path.clone()));
    }
    validate_name(&backup.world)?;

    let staging = tempfile::Builder::new()
        .prefix(".restore-")
        .tempdir_in(server_dir)
        .map_err(|e| WorldError::Io(server_dir.to_path_buf(), e))?;

    let io_err = |e| WorldError::Io(backup.path.clone(), e);
    let file = fs::File::open(&backup.path).map_err(io_err)?;
    let mut archive = Archive::new(GzDecoder::new(std::io::BufReader::new(file)));
    archive.unpack(staging.path()).map_err(io_err)?;

    let restored = staging.path().join(&backup.world);
    if !restored.is_dir() {
        return Err(WorldError::IncompleteBackup(backup.path.clone()));
    }

    let target = server_dir.join(&backup.world);
    let previous = staging.path().join(".previous");
    let had_world = target.exists();
    if had_world {
        fs::rename(&target, &previous).map_err(|e| WorldError::Io(target.clone(), e))?;
    }

    if let Err(e) = fs::rename(&restored, &target) {
        if had_world {
            let _ = fs::rename(&previous, &target);
        }
        return Err(WorldError::Io(target, e));
    }

    // Dropping the staging dir removes the replaced world.
    drop(staging);

    tracing::info!("Restored {} from {}", backup.world, backup.path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::create_dir_all(path.join("region")).unwrap();
        fs::write(path.join(LEVEL_DAT), vec![1u8; 100]).unwrap();
        fs::write(path.join("region").join("r.0.0.mca"), vec![2u8; 924]).unwrap();
        path
    }

    #[test]
    fn only_folders_with_level_dat_are_worlds() {
        let dir = tempfile::tempdir().unwrap();
        world(dir.path(), "world");
        world(dir.path(), "world_nether");
        fs::create_dir_all(dir.path().join("logs")).unwrap();
        fs::create_dir_all(dir.path().join(".hidden")).unwrap();
        fs::write(dir.path().join(".hidden").join(LEVEL_DAT), b"x").unwrap();

        let worlds = list_worlds(dir.path()).unwrap();

        let names: Vec<_> = worlds.iter().map(|w| w.name.as_str()).collect();
        assert_eq!(names, ["world", "world_nether"]);
        assert_eq!(worlds[0].size, 1024);
    }

    #[test]
    fn create_rejects_bad_and_existing_names() {
        let dir = tempfile::tempdir().unwrap();

        assert!(matches!(
            create_world(dir.path(), "../escape"),
            Err(WorldError::InvalidName(_))
        ));
        create_world(dir.path(), "creative").unwrap();
        assert!(matches!(
            create_world(dir.path(), "creative"),
            Err(WorldError::AlreadyExists(_))
        ));
    }

    #[test]
    fn switch_updates_level_name() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("server.properties"),
            "#Minecraft server properties\nlevel-name=world\nserver-port=25565\n",
        )
        .unwrap();

        switch_world(dir.path(), "creative").unwrap();

        let properties = ServerProperties::load(dir.path()).unwrap();
        assert_eq!(properties.get("level-name"), Some("creative"));
        assert_eq!(properties.port(), Some(25565));
    }

    #[test]
    fn byte_formatting() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5 MB");
    }

    #[test]
    fn backup_and_restore() {
        let dir = tempfile::tempdir().unwrap();
        let path = world(dir.path(), "world");

        let backup = create_backup(dir.path(), "world").unwrap();
        assert!(backup.path.starts_with(dir.path().join(BACKUPS_DIR)));

        let listed = list_backups(dir.path()).unwrap();
        assert_eq!(listed, vec![backup.clone()]);

        fs::remove_file(path.join("region").join("r.0.0.mca")).unwrap();
        fs::write(path.join("griefed.txt"), b"oops").unwrap();

        restore_backup(dir.path(), &backup).unwrap();

        assert!(path.join("region").join("r.0.0.mca").is_file());
        assert!(!path.join("griefed.txt").exists());
    }

    #[test]
    fn corrupt_backup_keeps_the_current_world() {
        let dir = tempfile::tempdir().unwrap();
        let path = world(dir.path(), "world");
        let backups = dir.path().join(BACKUPS_DIR);
        fs::create_dir_all(&backups).unwrap();
        fs::write(backups.join("world-20240101-000000.tar.gz"), b"not a gzip stream").unwrap();

        let backup = list_backups(dir.path()).unwrap().remove(0);
        assert!(restore_backup(dir.path(), &backup).is_err());

        assert!(path.join(LEVEL_DAT).is_file());
        assert!(path.join("region").join("r.0.0.mca").is_file());
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().starts_with(".restore-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn backup_of_another_world_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = world(dir.path(), "world");
        world(dir.path(), "creative");
        let created = create_backup(dir.path(), "creative").unwrap();

        let renamed = backups_dir(dir.path()).join("world-20240101-000000.tar.gz");
        fs::rename(&created.path, &renamed).unwrap();
        let backup = list_backups(dir.path()).unwrap().remove(0);

        assert!(matches!(
            restore_backup(dir.path(), &backup),
            Err(WorldError::IncompleteBackup(_))
        ));
        assert!(path.join(LEVEL_DAT).is_file());
    }

    #[test]
    fn restore_refuses_while_running() {
        let dir = tempfile::tempdir().unwrap();
        world(dir.path(), "world");
        let backup = create_backup(dir.path(), "world").unwrap();

        PidFile::server(dir.path()).write(std::process::id()).unwrap();

        assert!(matches!(
            restore_backup(dir.path(), &backup),
            Err(WorldError::ServerRunning(_))
        ));
    }

    #[test]
    fn no_backups_dir_means_no_backups() {
        let dir = tempfile::tempdir().unwrap();
        assert!(list_backups(dir.path()).unwrap().is_empty());
    }
}
