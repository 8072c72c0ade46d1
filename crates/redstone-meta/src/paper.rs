use serde::Deserialize;

use crate::{MetaError, Result, default_client, get_json};

pub const BASE_PAPER_URL: &str = "https://api.papermc.io/v2/projects/paper";

#[derive(Debug, Deserialize)]
pub struct Project {
    pub versions: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct VersionBuilds {
    pub builds: Vec<u32>,
}

#[derive(Debug, Deserialize)]
pub struct Build {
    pub build: u32,
    pub downloads: BuildDownloads,
}

#[derive(Debug, Deserialize)]
pub struct BuildDownloads {
    pub application: BuildArtifact,
}

#[derive(Debug, Deserialize)]
pub struct BuildArtifact {
    pub name: String,
    #[serde(default)]
    pub sha256: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PaperClient {
    client: reqwest::Client,
}

impl Default for PaperClient {
    fn default() -> Self {
        Self {
            client: default_client(),
        }
    }
}

impl PaperClient {
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub async fn get_versions(&self) -> Result<Vec<String>> {
        let project: Project = get_json(&self.client, BASE_PAPER_URL).await?;

        Ok(project.versions)
    }

    pub async fn get_latest_build(&self, version: &str) -> Result<u32> {
        let url = format!("{BASE_PAPER_URL}/versions/{version}");
        let builds: VersionBuilds = get_json(&self.client, &url).await?;

        builds
            .builds
            .last()
            .copied()
            .ok_or_else(|| MetaError::MissingArtifact(format!("paper {version}")))
    }

    /// Resolves the download URL of the newest build for `version`.
    pub async fn resolve_server_jar_url(&self, version: &str) -> Result<String> {
        let versions = self.get_versions().await?;
        if !versions.iter().any(|v| v == version) {
            log::debug!(
                "Paper {} not found, latest available: {:?}",
                version,
                versions.iter().rev().take(5).collect::<Vec<_>>()
            );
            return Err(MetaError::UnknownVersion(version.to_string()));
        }

        let build = self.get_latest_build(version).await?;
        let url = format!("{BASE_PAPER_URL}/versions/{version}/builds/{build}");
        let details: Build = get_json(&self.client, &url).await?;

        Ok(download_url(version, details.build, &details.downloads.application.name))
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

pub fn download_url(version: &str, build: u32, file_name: &str) -> String {
    format!("{BASE_PAPER_URL}/versions/{version}/builds/{build}/downloads/{file_name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_build_details() {
        let body = r#"{
            "project_id": "paper",
            "version": "1.20.1",
            "build": 196,
            "channel": "default",
            "downloads": {
                "application": {"name": "paper-1.20.1-196.jar", "sha256": "abc"}
            }
        }"#;
        let build: Build = serde_json::from_str(body).unwrap();

        assert_eq!(
            download_url("1.20.1", build.build, &build.downloads.application.name),
            "https://api.papermc.io/v2/projects/paper/versions/1.20.1/builds/196/downloads/paper-1.20.1-196.jar"
        );
    }
}
