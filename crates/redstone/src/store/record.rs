use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

pub const RECORD_FILE: &str = "redstone.json";
pub const LEGACY_RECORD_FILE: &str = ".redstone/config.json";
pub const CURRENT_SCHEMA: u32 = 1;
pub const DEFAULT_PORT: u16 = 25565;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
pub enum ServerType {
    #[serde(alias = "vanilla")]
    Vanilla,
    #[serde(alias = "paper", alias = "papermc")]
    Paper,
    #[serde(alias = "fabric")]
    Fabric,
    #[serde(alias = "forge")]
    Forge,
    #[serde(alias = "spigot")]
    Spigot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LocationType {
    #[default]
    Default,
    Shared,
    Custom,
}

/// Per-server metadata persisted as `redstone.json` inside the server directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerRecord {
    #[serde(default = "legacy_schema")]
    pub schema: u32,
    pub name: String,
    #[serde(rename = "type")]
    pub server_type: ServerType,
    #[serde(alias = "minecraftVersion")]
    pub version: String,
    /// Heap size in MiB.
    pub ram: u32,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_java")]
    pub java_path: String,
    #[serde(default)]
    pub path: PathBuf,
    #[serde(default)]
    pub location_type: LocationType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tunnel_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_tunnel_update: Option<jiff::Timestamp>,
    #[serde(alias = "created")]
    pub created_at: jiff::Timestamp,
}

fn legacy_schema() -> u32 {
    CURRENT_SCHEMA
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_java() -> String {
    "java".to_string()
}

impl ServerRecord {
    pub fn new(
        name: impl Into<String>,
        server_type: ServerType,
        version: impl Into<String>,
        ram_mb: u32,
        path: &Path,
    ) -> Self {
        Self {
            schema: CURRENT_SCHEMA,
            name: name.into(),
            server_type,
            version: version.into(),
            ram: ram_mb,
            port: DEFAULT_PORT,
            java_path: default_java(),
            path: path.to_path_buf(),
            location_type: LocationType::Default,
            tunnel_url: None,
            last_tunnel_update: None,
            created_at: jiff::Timestamp::now(),
        }
    }

    /// Returns the reason the record is unusable, if any.
    pub fn validate(&self) -> Result<(), String> {
        if self.schema != CURRENT_SCHEMA {
            return Err(format!("unsupported schema version {}", self.schema));
        }
        if self.name.trim().is_empty() {
            return Err("server name is empty".to_string());
        }
        if self.version.trim().is_empty() {
            return Err("minecraft version is empty".to_string());
        }
        if self.port == 0 {
            return Err("port must not be zero".to_string());
        }
        if self.ram == 0 {
            return Err("ram allocation must not be zero".to_string());
        }

        Ok(())
    }
}

/// Record format written by older releases under `.redstone/config.json`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyConfig {
    pub server_name: String,
    pub server_type: ServerType,
    pub minecraft_version: String,
    #[serde(default)]
    pub java_path: Option<String>,
    pub ram_allocation: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub created_at: jiff::Timestamp,
}

impl LegacyConfig {
    pub fn into_record(self, dir: &Path) -> Result<ServerRecord, String> {
        let ram = parse_ram(&self.ram_allocation)
            .ok_or_else(|| format!("invalid ram allocation `{}`", self.ram_allocation))?;

        Ok(ServerRecord {
            schema: CURRENT_SCHEMA,
            name: self.server_name,
            server_type: self.server_type,
            version: self.minecraft_version,
            ram,
            port: self.port,
            java_path: self.java_path.unwrap_or_else(default_java),
            path: dir.to_path_buf(),
            location_type: LocationType::Default,
            tunnel_url: None,
            last_tunnel_update: None,
            created_at: self.created_at,
        })
    }
}

/// Parses JVM-style sizes (`4G`, `512M`, `2048`) into MiB. Bare numbers are MiB.
pub fn parse_ram(value: &str) -> Option<u32> {
    let value = value.trim();
    let (digits, factor) = match value.chars().last()? {
        'G' | 'g' => (&value[..value.len() - 1], 1024),
        'M' | 'm' => (&value[..value.len() - 1], 1),
        _ => (value, 1),
    };

    digits
        .trim()
        .parse::<u32>()
        .ok()
        .and_then(|n| n.checked_mul(factor))
        .filter(|n| *n > 0)
}

/// Redirects a server name to a directory outside the servers directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub name: String,
    pub path: PathBuf,
    pub created: jiff::Timestamp,
}

impl LinkRecord {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            created: jiff::Timestamp::now(),
        }
    }

    pub fn file_name(name: &str) -> String {
        format!("{name}.link")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ram_sizes() {
        assert_eq!(parse_ram("4G"), Some(4096));
        assert_eq!(parse_ram("512M"), Some(512));
        assert_eq!(parse_ram("2048"), Some(2048));
        assert_eq!(parse_ram("0G"), None);
        assert_eq!(parse_ram("lots"), None);
    }

    #[test]
    fn reads_current_record() {
        let json = r#"{
            "name": "test1",
            "type": "Vanilla",
            "version": "1.20.1",
            "ram": 2048,
            "path": "/srv/test1",
            "locationType": "default",
            "isCustomLocation": false,
            "created": "2024-05-01T10:00:00Z"
        }"#;

        let record: ServerRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.schema, CURRENT_SCHEMA);
        assert_eq!(record.server_type, ServerType::Vanilla);
        assert_eq!(record.version, "1.20.1");
        assert_eq!(record.port, DEFAULT_PORT);
        assert_eq!(record.java_path, "java");
        assert!(record.validate().is_ok());
    }

    #[test]
    fn writes_type_and_version_keys() {
        let record = ServerRecord::new(
            "test1",
            ServerType::Paper,
            "1.20.4",
            4096,
            Path::new("/srv/test1"),
        );
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["type"], "Paper");
        assert_eq!(value["version"], "1.20.4");
        assert_eq!(value["ram"], 4096);
        assert_eq!(value["javaPath"], "java");
        assert!(value.get("tunnelUrl").is_none());
    }

    #[test]
    fn converts_legacy_config() {
        let json = r#"{
            "serverName": "old",
            "serverType": "papermc",
            "minecraftVersion": "1.19.4",
            "javaPath": "/usr/bin/java",
            "ramAllocation": "4G",
            "port": 25570,
            "autoBackup": false,
            "createdAt": "2023-01-01T00:00:00Z"
        }"#;

        let legacy: LegacyConfig = serde_json::from_str(json).unwrap();
        let record = legacy.into_record(Path::new("/srv/old")).unwrap();

        assert_eq!(record.server_type, ServerType::Paper);
        assert_eq!(record.ram, 4096);
        assert_eq!(record.port, 25570);
        assert_eq!(record.path, PathBuf::from("/srv/old"));
    }

    #[test]
    fn rejects_invalid_records() {
        let mut record =
            ServerRecord::new("x", ServerType::Vanilla, "1.20.1", 1024, Path::new("/x"));
        record.ram = 0;
        assert!(record.validate().is_err());

        record.ram = 1024;
        record.schema = 7;
        assert!(record.validate().is_err());

        record.schema = CURRENT_SCHEMA;
        record.name = "  ".into();
        assert!(record.validate().is_err());
    }
}
