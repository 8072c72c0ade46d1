use serde::{Deserialize, Serialize};
use versions::Versioning;

use crate::{MetaError, Result, default_client, get_json};

pub const BASE_FABRIC_URL: &str = "https://meta.fabricmc.net/v2";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallerVersion {
    #[serde(deserialize_with = "Versioning::deserialize_pretty")]
    pub version: Versioning,
    pub url: String,
    pub stable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderVersion {
    #[serde(deserialize_with = "Versioning::deserialize_pretty")]
    pub version: Versioning,
    #[serde(default)]
    pub build: u32,
    pub stable: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GameVersion {
    pub version: String,
    pub stable: bool,
}

#[derive(Debug, Clone)]
pub struct FabricClient {
    client: reqwest::Client,
}

impl Default for FabricClient {
    fn default() -> Self {
        Self {
            client: default_client(),
        }
    }
}

impl FabricClient {
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub async fn get_installer_versions(&self) -> Result<Vec<InstallerVersion>> {
        let url = format!("{BASE_FABRIC_URL}/versions/installer");

        log::debug!("Getting installer versions from {}", url);

        get_json(&self.client, &url).await
    }

    pub async fn get_loader_versions(&self) -> Result<Vec<LoaderVersion>> {
        let url = format!("{BASE_FABRIC_URL}/versions/loader");

        log::debug!("Getting loader versions from {}", url);

        get_json(&self.client, &url).await
    }

    pub async fn get_game_versions(&self) -> Result<Vec<GameVersion>> {
        let url = format!("{BASE_FABRIC_URL}/versions/game");

        get_json(&self.client, &url).await
    }

    /// Resolves the launcher jar URL for `minecraft_version` using the newest stable
    /// loader and installer.
    pub async fn resolve_server_jar_url(&self, minecraft_version: &str) -> Result<String> {
        let games = self.get_game_versions().await?;
        if !games.iter().any(|g| g.version == minecraft_version) {
            return Err(MetaError::UnknownVersion(minecraft_version.to_string()));
        }

        let loaders = self.get_loader_versions().await?;
        let loader = pick_stable(&loaders, |l| l.stable)
            .ok_or_else(|| MetaError::MissingArtifact(format!("fabric loader for {minecraft_version}")))?;

        let installers = self.get_installer_versions().await?;
        let installer = pick_stable(&installers, |i| i.stable)
            .ok_or_else(|| MetaError::MissingArtifact(format!("fabric installer for {minecraft_version}")))?;

        Ok(server_jar_url(
            minecraft_version,
            &loader.version,
            &installer.version,
        ))
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

/// First stable entry, or the first entry when nothing is flagged stable.
fn pick_stable<T>(entries: &[T], is_stable: impl Fn(&T) -> bool) -> Option<&T> {
    entries.iter().find(|e| is_stable(e)).or_else(|| entries.first())
}

pub fn server_jar_url(
    minecraft_version: &str,
    loader_version: &Versioning,
    installer_version: &Versioning,
) -> String {
    format!(
        "{BASE_FABRIC_URL}/versions/loader/{minecraft_version}/{loader_version}/{installer_version}/server/jar"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_launcher_url() {
        let loader = Versioning::new("0.16.10").unwrap();
        let installer = Versioning::new("1.0.1").unwrap();

        assert_eq!(
            server_jar_url("1.20.1", &loader, &installer),
            "https://meta.fabricmc.net/v2/versions/loader/1.20.1/0.16.10/1.0.1/server/jar"
        );
    }

    #[test]
    fn prefers_stable_loader() {
        let body = r#"[
            {"separator": ".", "build": 11, "maven": "x", "version": "0.17.0-beta.1", "stable": false},
            {"separator": ".", "build": 10, "maven": "x", "version": "0.16.10", "stable": true}
        ]"#;
        let loaders: Vec<LoaderVersion> = serde_json::from_str(body).unwrap();

        let picked = pick_stable(&loaders, |l| l.stable).unwrap();
        assert_eq!(picked.version.to_string(), "0.16.10");
    }

    #[test]
    fn falls_back_to_first_when_nothing_stable() {
        let body = r#"[{"url": "u", "maven": "m", "version": "1.1.0", "stable": false}]"#;
        let installers: Vec<InstallerVersion> = serde_json::from_str(body).unwrap();

        let picked = pick_stable(&installers, |i| i.stable).unwrap();
        assert_eq!(picked.version.to_string(), "1.1.0");
    }
}
