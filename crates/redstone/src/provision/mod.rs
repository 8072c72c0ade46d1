mod plan;

use std::path::{Path, PathBuf};

use redstone_meta::{FabricClient, MetaError, MojangClient, PaperClient};

pub use plan::{CreateServerRequest, ServerSetupManager, SetupOutcome};

use crate::{cli::printer::Printer, store::ServerType};

pub const SERVER_JAR: &str = "server.jar";

/// Versions offered when the upstream APIs cannot be reached.
pub const FALLBACK_VERSIONS: &[&str] = &[
    "1.21.4", "1.21.3", "1.21.1", "1.21", "1.20.6", "1.20.4", "1.20.2", "1.20.1", "1.19.4",
    "1.19.2", "1.18.2", "1.17.1", "1.16.5", "1.12.2", "1.8.9",
];

const VERSION_LIST_LEN: usize = 20;

#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("Download failed: {reason}")]
    DownloadFailed {
        reason: String,
        #[source]
        source: Option<MetaError>,
    },
    #[error("{server_type} {version} has no single-file server download, get the installer from {url}")]
    ManualInstallationRequired {
        server_type: ServerType,
        version: String,
        url: String,
    },
}

impl From<MetaError> for ProvisionError {
    fn from(source: MetaError) -> Self {
        let reason = match &source {
            MetaError::UnknownVersion(v) => format!("version {v} is not published upstream"),
            MetaError::MissingArtifact(v) => format!("version {v} has no server download"),
            MetaError::Status { status, .. } => format!("upstream answered HTTP {status}"),
            MetaError::Http { .. } => "network error, check your internet connection".to_string(),
            MetaError::Schema { .. } => "upstream metadata had an unexpected format".to_string(),
            MetaError::Write(path, _) => format!("could not write {}", path.display()),
        };

        ProvisionError::DownloadFailed {
            reason,
            source: Some(source),
        }
    }
}

/// Somewhere a runnable server jar can be fetched from.
#[async_trait::async_trait]
pub trait ServerJarSource: Send + Sync + std::fmt::Debug {
    /// Stores `server.jar` in `dest_dir` and returns its path.
    async fn fetch(
        &self,
        server_type: ServerType,
        version: &str,
        dest_dir: &Path,
    ) -> Result<PathBuf, ProvisionError>;
}

/// Page listing the installer for types without a direct server download.
pub fn manual_install_url(server_type: ServerType, version: &str) -> Option<String> {
    match server_type {
        ServerType::Forge => Some(format!(
            "https://files.minecraftforge.net/net/minecraftforge/forge/index_{version}.html"
        )),
        ServerType::Spigot => Some("https://www.spigotmc.org/wiki/buildtools/".to_string()),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct Provisioner {
    mojang: MojangClient,
    paper: PaperClient,
    fabric: FabricClient,
    printer: Printer,
}

impl Provisioner {
    pub fn new(client: reqwest::Client, printer: Printer) -> Self {
        Self {
            mojang: MojangClient::with_client(client.clone()),
            paper: PaperClient::with_client(client.clone()),
            fabric: FabricClient::with_client(client),
            printer,
        }
    }

    pub fn mojang(&self) -> &MojangClient {
        &self.mojang
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn resolve_url(
        &self,
        server_type: ServerType,
        version: &str,
    ) -> Result<String, ProvisionError> {
        let url = match server_type {
            ServerType::Vanilla => self.mojang.resolve_server_jar_url(version).await?,
            ServerType::Paper => self.paper.resolve_server_jar_url(version).await?,
            ServerType::Fabric => self.fabric.resolve_server_jar_url(version).await?,
            ServerType::Forge | ServerType::Spigot => {
                return Err(ProvisionError::ManualInstallationRequired {
                    server_type,
                    version: version.to_string(),
                    url: manual_install_url(server_type, version).unwrap_or_default(),
                });
            }
        };

        Ok(url)
    }

    /// Downloads the server binary for `server_type`/`version` into `dest_dir/server.jar`.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn download(
        &self,
        server_type: ServerType,
        version: &str,
        dest_dir: &Path,
    ) -> Result<PathBuf, ProvisionError> {
        let url = self.resolve_url(server_type, version).await?;
        let destination = dest_dir.join(SERVER_JAR);

        tracing::info!("Downloading {} {} from {}", server_type, version, url);

        let bar = self
            .printer
            .download_bar(format!("Downloading {server_type} {version}"));

        let written = redstone_meta::download_to_file(
            self.mojang.client(),
            &url,
            &destination,
            |done, total| {
                if let Some(total) = total {
                    bar.set_length(total);
                }
                bar.set_position(done);
            },
        )
        .await;

        bar.finish_and_clear();

        let written = written?;
        if written == 0 {
            return Err(ProvisionError::DownloadFailed {
                reason: format!("{url} returned an empty body"),
                source: None,
            });
        }

        tracing::info!("Downloaded {} bytes to {}", written, destination.display());

        Ok(destination)
    }

    /// Latest versions for the picker, or the built-in list when offline.
    pub async fn available_versions(&self, server_type: ServerType) -> Vec<String> {
        let fetched = match server_type {
            ServerType::Paper => self.paper.get_versions().await.map(|mut versions| {
                versions.reverse();
                versions
            }),
            ServerType::Fabric => self.fabric.get_game_versions().await.map(|versions| {
                versions
                    .into_iter()
                    .filter(|v| v.stable)
                    .map(|v| v.version)
                    .collect()
            }),
            _ => self
                .mojang
                .get_manifest()
                .await
                .map(|manifest| manifest.releases().map(str::to_string).collect()),
        };

        match fetched {
            Ok(versions) if !versions.is_empty() => {
                versions.into_iter().take(VERSION_LIST_LEN).collect()
            }
            Ok(_) => fallback_versions(),
            Err(e) => {
                tracing::warn!("Could not fetch {} versions: {}", server_type, e);
                fallback_versions()
            }
        }
    }
}

fn fallback_versions() -> Vec<String> {
    FALLBACK_VERSIONS.iter().map(|v| v.to_string()).collect()
}

#[async_trait::async_trait]
impl ServerJarSource for Provisioner {
    async fn fetch(
        &self,
        server_type: ServerType,
        version: &str,
        dest_dir: &Path,
    ) -> Result<PathBuf, ProvisionError> {
        self.download(server_type, version, dest_dir).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forge_and_spigot_need_manual_install() {
        assert!(
            manual_install_url(ServerType::Forge, "1.20.1")
                .unwrap()
                .ends_with("index_1.20.1.html")
        );
        assert!(manual_install_url(ServerType::Spigot, "1.20.1").is_some());
        assert!(manual_install_url(ServerType::Vanilla, "1.20.1").is_none());
        assert!(manual_install_url(ServerType::Paper, "1.20.1").is_none());
    }

    #[tokio::test]
    async fn resolve_url_signals_manual_install_without_network() {
        let provisioner = Provisioner::new(reqwest::Client::new(), Printer::Quiet);

        let err = provisioner
            .resolve_url(ServerType::Forge, "1.20.1")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ProvisionError::ManualInstallationRequired { .. }
        ));
    }

    #[test]
    fn meta_errors_become_download_failures() {
        let err: ProvisionError = MetaError::UnknownVersion("9.9".into()).into();

        match err {
            ProvisionError::DownloadFailed { reason, source } => {
                assert!(reason.contains("9.9"));
                assert!(source.is_some());
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
