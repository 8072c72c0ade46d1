use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{StoreError, players::UuidMode};
use crate::{lifecycle::SessionWrapper, platform::Platform, tunnel::TunnelService};

/// User preferences persisted as `settings.toml` in the redstone home.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub default_tunnel: Option<TunnelService>,
    pub uuid_mode: UuidMode,
    pub servers_dir: Option<PathBuf>,
    pub session_wrapper: SessionWrapper,
}

impl AppSettings {
    /// Missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(StoreError::Read(path.to_path_buf(), e)),
        };

        toml::from_str(&content).map_err(|e| StoreError::ConfigCorrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let content = toml::to_string_pretty(self).map_err(|e| StoreError::ConfigCorrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Write(parent.to_path_buf(), e))?;
        }

        std::fs::write(path, content).map_err(|e| StoreError::Write(path.to_path_buf(), e))
    }

    pub fn tunnel_for(&self, platform: Platform) -> TunnelService {
        self.default_tunnel
            .unwrap_or_else(|| TunnelService::recommended(platform))
    }
}
