use std::path::{Path, PathBuf};

use compact_str::CompactString;
use md5::{Digest, Md5};
use redstone_meta::MojangClient;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use strum::Display;
use uuid::Uuid;

use super::StoreError;

pub const OPS_FILE: &str = "ops.json";
pub const WHITELIST_FILE: &str = "whitelist.json";

/// Entry of a JSON player array such as `ops.json` or `whitelist.json`.
pub trait PlayerEntry: Serialize + DeserializeOwned + Clone {
    const FILE_NAME: &'static str;

    fn name(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpEntry {
    pub uuid: Uuid,
    pub name: CompactString,
    pub level: u8,
    pub bypasses_player_limit: bool,
}

impl OpEntry {
    pub fn new(uuid: Uuid, name: &str) -> Self {
        Self {
            uuid,
            name: name.into(),
            level: 4,
            bypasses_player_limit: false,
        }
    }
}

impl PlayerEntry for OpEntry {
    const FILE_NAME: &'static str = OPS_FILE;

    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhitelistEntry {
    pub uuid: Uuid,
    pub name: CompactString,
}

impl WhitelistEntry {
    pub fn new(uuid: Uuid, name: &str) -> Self {
        Self {
            uuid,
            name: name.into(),
        }
    }
}

impl PlayerEntry for WhitelistEntry {
    const FILE_NAME: &'static str = WHITELIST_FILE;

    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone)]
pub struct PlayerList<T: PlayerEntry> {
    path: PathBuf,
    entries: Vec<T>,
}

impl<T: PlayerEntry> PlayerList<T> {
    /// Missing file means an empty list.
    pub fn load(server_dir: &Path) -> Result<Self, StoreError> {
        let path = server_dir.join(T::FILE_NAME);

        let entries = match std::fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => Vec::new(),
            Ok(content) => {
                let corrupt = |e: serde_json::Error| StoreError::ConfigCorrupt {
                    path: path.clone(),
                    reason: e.to_string(),
                };

                let mut values: Vec<serde_json::Value> =
                    serde_json::from_str(&content).map_err(corrupt)?;
                for value in &mut values {
                    if let Some(name) = repair_uuid(value) {
                        tracing::warn!(
                            "Replaced placeholder UUID of {} in {} with the offline UUID",
                            name,
                            path.display()
                        );
                    }
                }

                values
                    .into_iter()
                    .map(serde_json::from_value)
                    .collect::<Result<Vec<T>, _>>()
                    .map_err(corrupt)?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(StoreError::Read(path, e)),
        };

        Ok(Self { path, entries })
    }

    pub fn entries(&self) -> &[T] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name().eq_ignore_ascii_case(name))
    }

    /// Adds the entry, replacing one with the same name. Returns true on replacement.
    pub fn add(&mut self, entry: T) -> bool {
        match self
            .entries
            .iter_mut()
            .find(|e| e.name().eq_ignore_ascii_case(entry.name()))
        {
            Some(existing) => {
                *existing = entry;
                true
            }
            None => {
                self.entries.push(entry);
                false
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| !e.name().eq_ignore_ascii_case(name));

        before != self.entries.len()
    }

    pub fn save(&self) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(&self.entries).map_err(|e| {
            StoreError::ConfigCorrupt {
                path: self.path.clone(),
                reason: e.to_string(),
            }
        })?;

        std::fs::write(&self.path, json).map_err(|e| StoreError::Write(self.path.clone(), e))
    }
}

/// Swaps a `uuid` that does not parse (like `offline-uuid-<millis>`) for the
/// name's offline UUID. Returns the player name when the entry was changed.
fn repair_uuid(value: &mut serde_json::Value) -> Option<String> {
    let entry = value.as_object_mut()?;
    let name = entry.get("name")?.as_str()?.to_string();

    let valid = entry
        .get("uuid")
        .and_then(|uuid| uuid.as_str())
        .is_some_and(|uuid| Uuid::parse_str(uuid).is_ok());
    if valid {
        return None;
    }

    entry.insert(
        "uuid".to_string(),
        serde_json::Value::String(offline_uuid(&name).to_string()),
    );
    Some(name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum UuidMode {
    #[default]
    Offline,
    Online,
}

/// UUID an offline-mode server derives for `name`.
pub fn offline_uuid(name: &str) -> Uuid {
    let mut digest = [0u8; 16];
    digest.copy_from_slice(&Md5::digest(format!("OfflinePlayer:{name}").as_bytes()));

    uuid::Builder::from_md5_bytes(digest).into_uuid()
}

#[derive(Debug, Clone)]
pub struct UuidResolver {
    mode: UuidMode,
    mojang: MojangClient,
}

impl UuidResolver {
    pub fn new(mode: UuidMode, mojang: MojangClient) -> Self {
        Self { mode, mojang }
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn resolve(&self, name: &str) -> Uuid {
        match self.mode {
            UuidMode::Offline => offline_uuid(name),
            UuidMode::Online => match self.mojang.lookup_profile(name).await {
                Ok(Some(profile)) => match Uuid::parse_str(&profile.id) {
                    Ok(uuid) => uuid,
                    Err(e) => {
                        tracing::warn!("Mojang returned malformed id `{}`: {}", profile.id, e);
                        offline_uuid(name)
                    }
                },
                Ok(None) => {
                    tracing::warn!("No Mojang account named {name}, using offline UUID");
                    offline_uuid(name)
                }
                Err(e) => {
                    tracing::warn!("Mojang lookup for {name} failed: {e}, using offline UUID");
                    offline_uuid(name)
                }
            },
        }
    }
}
