pub mod players;
pub mod properties;
pub mod record;
pub mod settings;

use std::path::{Path, PathBuf};

use rustc_hash::FxHashSet;

pub use players::{OpEntry, PlayerList, UuidMode, UuidResolver, WhitelistEntry};
pub use properties::ServerProperties;
pub use record::{LegacyConfig, LinkRecord, LocationType, ServerRecord, ServerType};
pub use settings::AppSettings;

use record::{LEGACY_RECORD_FILE, RECORD_FILE};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("`{0}` not found")]
    NotFound(PathBuf),
    #[error("`{path}` is corrupt: {reason}")]
    ConfigCorrupt { path: PathBuf, reason: String },
    #[error("Read path `{0}`")]
    Read(PathBuf, #[source] std::io::Error),
    #[error("Write path `{0}`")]
    Write(PathBuf, #[source] std::io::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntryStatus {
    Ready(Box<ServerRecord>),
    Corrupt(String),
}

/// One row of the server listing.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerEntry {
    pub name: String,
    pub dir: PathBuf,
    pub linked: bool,
    pub status: EntryStatus,
}

impl ServerEntry {
    pub fn record(&self) -> Option<&ServerRecord> {
        match &self.status {
            EntryStatus::Ready(record) => Some(record),
            EntryStatus::Corrupt(_) => None,
        }
    }
}

/// File-backed registry of servers: the servers directory plus its `.link` files.
#[derive(Debug, Clone)]
pub struct ServerStore {
    servers_dir: PathBuf,
}

impl ServerStore {
    pub fn new(servers_dir: impl Into<PathBuf>) -> Self {
        Self {
            servers_dir: servers_dir.into(),
        }
    }

    pub fn servers_dir(&self) -> &Path {
        &self.servers_dir
    }

    pub fn record_path(dir: &Path) -> PathBuf {
        dir.join(RECORD_FILE)
    }

    pub fn has_record(dir: &Path) -> bool {
        dir.join(RECORD_FILE).is_file() || dir.join(LEGACY_RECORD_FILE).is_file()
    }

    /// Reads `redstone.json`, falling back to the legacy `.redstone/config.json`.
    pub fn load(dir: &Path) -> Result<ServerRecord, StoreError> {
        let path = dir.join(RECORD_FILE);

        let mut record = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str::<ServerRecord>(&content).map_err(|e| {
                StoreError::ConfigCorrupt {
                    path: path.clone(),
                    reason: e.to_string(),
                }
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::load_legacy(dir)?,
            Err(e) => return Err(StoreError::Read(path, e)),
        };

        record
            .validate()
            .map_err(|reason| StoreError::ConfigCorrupt { path, reason })?;

        record.path = dir.to_path_buf();

        Ok(record)
    }

    fn load_legacy(dir: &Path) -> Result<ServerRecord, StoreError> {
        let path = dir.join(LEGACY_RECORD_FILE);

        let content = std::fs::read_to_string(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StoreError::NotFound(dir.join(RECORD_FILE)),
            _ => StoreError::Read(path.clone(), e),
        })?;

        let legacy: LegacyConfig =
            serde_json::from_str(&content).map_err(|e| StoreError::ConfigCorrupt {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        tracing::debug!("Converting legacy config at {}", path.display());

        legacy
            .into_record(dir)
            .map_err(|reason| StoreError::ConfigCorrupt { path, reason })
    }

    /// Whole-file rewrite of `redstone.json`.
    pub fn save(dir: &Path, record: &ServerRecord) -> Result<(), StoreError> {
        let path = dir.join(RECORD_FILE);
        let json = serde_json::to_string_pretty(record).map_err(|e| StoreError::ConfigCorrupt {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        std::fs::write(&path, json).map_err(|e| StoreError::Write(path, e))
    }

    pub fn link_path(&self, name: &str) -> PathBuf {
        self.servers_dir.join(LinkRecord::file_name(name))
    }

    fn read_link(path: &Path) -> Result<LinkRecord, StoreError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| StoreError::Read(path.to_path_buf(), e))?;

        serde_json::from_str(&content).map_err(|e| StoreError::ConfigCorrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// A `<name>.link` file wins over a same-named directory.
    pub fn resolve_server_path(&self, name: &str) -> PathBuf {
        let link = self.link_path(name);

        if link.is_file() {
            match Self::read_link(&link) {
                Ok(record) => return record.path,
                Err(e) => tracing::warn!("Ignoring unreadable link {}: {}", link.display(), e),
            }
        }

        self.servers_dir.join(name)
    }

    pub fn register_link(&self, link: &LinkRecord) -> Result<PathBuf, StoreError> {
        std::fs::create_dir_all(&self.servers_dir)
            .map_err(|e| StoreError::Write(self.servers_dir.clone(), e))?;

        let path = self.link_path(&link.name);
        let json = serde_json::to_string_pretty(link).map_err(|e| StoreError::ConfigCorrupt {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        std::fs::write(&path, json).map_err(|e| StoreError::Write(path.clone(), e))?;

        Ok(path)
    }

    /// Servers reachable through links first, then plain directories; each directory once.
    pub fn list(&self) -> Result<Vec<ServerEntry>, StoreError> {
        let read_dir = match std::fs::read_dir(&self.servers_dir) {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::Read(self.servers_dir.clone(), e)),
        };

        let mut links = Vec::new();
        let mut dirs = Vec::new();

        for entry in read_dir.flatten() {
            let path = entry.path();
            let is_link = path.extension().is_some_and(|ext| ext == "link");

            if is_link && path.is_file() {
                links.push(path);
            } else if path.is_dir() {
                dirs.push(path);
            }
        }

        let mut seen = FxHashSet::default();
        let mut entries = Vec::new();

        for path in links {
            let link = match Self::read_link(&path) {
                Ok(link) => link,
                Err(e) => {
                    tracing::warn!("Skipping link {}: {}", path.display(), e);
                    continue;
                }
            };

            if !Self::has_record(&link.path) {
                tracing::warn!(
                    "Skipping orphaned link {} -> {}",
                    path.display(),
                    link.path.display()
                );
                continue;
            }

            if seen.insert(link.path.clone()) {
                entries.push(Self::entry_for(link.name, link.path, true));
            }
        }

        for dir in dirs {
            if !Self::has_record(&dir) || !seen.insert(dir.clone()) {
                continue;
            }

            let name = dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            entries.push(Self::entry_for(name, dir, false));
        }

        entries.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));

        Ok(entries)
    }

    fn entry_for(fallback_name: String, dir: PathBuf, linked: bool) -> ServerEntry {
        match Self::load(&dir) {
            Ok(record) => ServerEntry {
                name: record.name.clone(),
                dir,
                linked,
                status: EntryStatus::Ready(Box::new(record)),
            },
            Err(e) => ServerEntry {
                name: fallback_name,
                dir,
                linked,
                status: EntryStatus::Corrupt(e.to_string()),
            },
        }
    }

    /// Deletes the server directory and any link pointing at it.
    pub fn remove(&self, name: &str, dir: &Path) -> Result<(), StoreError> {
        let link = self.link_path(name);
        if link.is_file() {
            std::fs::remove_file(&link).map_err(|e| StoreError::Write(link.clone(), e))?;
        }

        match std::fs::remove_dir_all(dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Write(dir.to_path_buf(), e)),
        }
    }

    /// Records (or clears) the public tunnel address of the server in `dir`.
    pub fn update_tunnel_url(dir: &Path, url: Option<&str>) -> Result<ServerRecord, StoreError> {
        let mut record = Self::load(dir)?;

        record.tunnel_url = url.map(str::to_string);
        record.last_tunnel_update = url.map(|_| jiff::Timestamp::now());

        Self::save(dir, &record)?;

        Ok(record)
    }
}
