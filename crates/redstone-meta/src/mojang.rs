use serde::Deserialize;

use crate::{MetaError, Result, default_client, get_checked, get_json};

pub const VERSION_MANIFEST_URL: &str =
    "https://piston-meta.mojang.com/mc/game/version_manifest_v2.json";
pub const PROFILE_LOOKUP_URL: &str = "https://api.mojang.com/users/profiles/minecraft";

#[derive(Debug, Deserialize)]
pub struct VersionManifest {
    pub latest: LatestVersions,
    pub versions: Vec<ManifestEntry>,
}

#[derive(Debug, Deserialize)]
pub struct LatestVersions {
    pub release: String,
    pub snapshot: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionType {
    Release,
    Snapshot,
    OldAlpha,
    OldBeta,
}

#[derive(Debug, Deserialize)]
pub struct ManifestEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub version_type: VersionType,
    pub url: String,
    #[serde(default)]
    pub sha1: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VersionDetails {
    pub id: String,
    pub downloads: VersionDownloads,
}

#[derive(Debug, Deserialize)]
pub struct VersionDownloads {
    #[serde(default)]
    pub server: Option<Artifact>,
}

#[derive(Debug, Deserialize)]
pub struct Artifact {
    pub url: String,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlayerProfile {
    /// Undashed UUID as returned by the profile API.
    pub id: String,
    pub name: String,
}

impl VersionManifest {
    pub fn find(&self, id: &str) -> Option<&ManifestEntry> {
        self.versions.iter().find(|v| v.id == id)
    }

    /// Release ids, newest first, as listed by the manifest.
    pub fn releases(&self) -> impl Iterator<Item = &str> {
        self.versions
            .iter()
            .filter(|v| v.version_type == VersionType::Release)
            .map(|v| v.id.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct MojangClient {
    client: reqwest::Client,
}

impl Default for MojangClient {
    fn default() -> Self {
        Self {
            client: default_client(),
        }
    }
}

impl MojangClient {
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub async fn get_manifest(&self) -> Result<VersionManifest> {
        get_json(&self.client, VERSION_MANIFEST_URL).await
    }

    /// Follows manifest -> per-version document -> server artifact.
    pub async fn resolve_server_jar_url(&self, version: &str) -> Result<String> {
        let manifest = self.get_manifest().await?;
        let entry = manifest
            .find(version)
            .ok_or_else(|| MetaError::UnknownVersion(version.to_string()))?;

        let details: VersionDetails = get_json(&self.client, &entry.url).await?;

        details
            .downloads
            .server
            .map(|artifact| artifact.url)
            .ok_or_else(|| MetaError::MissingArtifact(version.to_string()))
    }

    /// Looks up a premium account. `Ok(None)` when the name is not registered.
    pub async fn lookup_profile(&self, name: &str) -> Result<Option<PlayerProfile>> {
        let url = format!("{PROFILE_LOOKUP_URL}/{name}");

        match get_checked(&self.client, &url).await {
            Ok(response) => {
                let profile = response
                    .json::<PlayerProfile>()
                    .await
                    .map_err(|source| MetaError::Http { url, source })?;
                Ok(Some(profile))
            }
            Err(MetaError::Status { status: 204 | 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"{
        "latest": {"release": "1.21.4", "snapshot": "25w02a"},
        "versions": [
            {"id": "25w02a", "type": "snapshot", "url": "https://example/25w02a.json", "sha1": "a"},
            {"id": "1.21.4", "type": "release", "url": "https://example/1.21.4.json", "sha1": "b"},
            {"id": "1.20.1", "type": "release", "url": "https://example/1.20.1.json", "sha1": "c"},
            {"id": "b1.7.3", "type": "old_beta", "url": "https://example/b1.7.3.json", "sha1": "d"}
        ]
    }"#;

    #[test]
    fn finds_version_entry() {
        let manifest: VersionManifest = serde_json::from_str(MANIFEST).unwrap();

        let entry = manifest.find("1.20.1").unwrap();
        assert_eq!(entry.url, "https://example/1.20.1.json");
        assert!(manifest.find("1.99").is_none());
    }

    #[test]
    fn lists_only_releases() {
        let manifest: VersionManifest = serde_json::from_str(MANIFEST).unwrap();

        let releases: Vec<&str> = manifest.releases().collect();
        assert_eq!(releases, vec!["1.21.4", "1.20.1"]);
    }

    #[test]
    fn old_versions_may_lack_server_jar() {
        let body = r#"{"id": "b1.7.3", "downloads": {"client": {"url": "x"}}}"#;
        let details: VersionDetails = serde_json::from_str(body).unwrap();

        assert!(details.downloads.server.is_none());
    }
}
