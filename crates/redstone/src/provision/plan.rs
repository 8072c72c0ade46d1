use std::{path::PathBuf, sync::Arc};

use crate::{
    action::{
        Action, ActionErrorKind, StatefulAction,
        base::{CreateDirectory, CreateFile, CreateLink, DownloadServerJar, WriteServerRecord},
    },
    config::ConfigGenerator,
    platform::StorageLocation,
    store::{LinkRecord, LocationType, ServerRecord, ServerStore, ServerType},
};

use super::{ServerJarSource, manual_install_url};

#[derive(Debug, Clone)]
pub struct CreateServerRequest {
    pub name: String,
    pub server_type: ServerType,
    pub version: String,
    pub ram_mb: u32,
    pub port: u16,
    pub location: StorageLocation,
    pub java_path: String,
    pub online_mode: bool,
}

#[derive(Debug, Clone)]
pub struct SetupOutcome {
    pub dir: PathBuf,
    pub record: ServerRecord,
    /// Installer page when the server type has no direct jar download.
    pub manual_install: Option<String>,
}

#[derive(Debug)]
pub struct ServerSetupManager {
    actions: Vec<StatefulAction<Box<dyn Action>>>,
    dir: PathBuf,
    record: ServerRecord,
    manual_install: Option<String>,
}

impl ServerSetupManager {
    #[tracing::instrument(level = "debug", skip(store, source))]
    pub async fn plan(
        request: &CreateServerRequest,
        store: &ServerStore,
        source: Arc<dyn ServerJarSource>,
    ) -> Result<Self, ActionErrorKind> {
        let dir = request
            .location
            .server_dir(store.servers_dir(), &request.name);

        let mut record = ServerRecord::new(
            &request.name,
            request.server_type,
            &request.version,
            request.ram_mb,
            &dir,
        );
        record.port = request.port;
        record.java_path = request.java_path.clone();
        record.location_type = match request.location {
            StorageLocation::Default => LocationType::Default,
            StorageLocation::Shared => LocationType::Shared,
            StorageLocation::Custom(_) => LocationType::Custom,
        };

        let generator = ConfigGenerator::new(&dir);
        let manual_install = manual_install_url(request.server_type, &request.version);

        let mut actions: Vec<StatefulAction<Box<dyn Action>>> = Vec::new();

        actions.push(CreateDirectory::plan(&dir).await?.boxed());

        if manual_install.is_none() {
            actions.push(
                DownloadServerJar::plan(source, request.server_type, &request.version, &dir)
                    .await?
                    .boxed(),
            );
        }

        actions.push(
            CreateFile::plan(generator.eula_path(), ConfigGenerator::eula_content())
                .await?
                .boxed(),
        );
        actions.push(
            CreateFile::plan(
                generator.properties_path(),
                ConfigGenerator::server_properties(request.port, request.online_mode, &request.name),
            )
            .await?
            .boxed(),
        );
        actions.push(WriteServerRecord::plan(record.clone()).await?.boxed());

        if request.location.is_custom() {
            actions.push(
                CreateLink::plan(store.clone(), LinkRecord::new(&request.name, &dir))
                    .await?
                    .boxed(),
            );
        }

        Ok(Self {
            actions,
            dir,
            record,
            manual_install,
        })
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    #[tracing::instrument(level = "info", skip_all, fields(name = %self.record.name))]
    pub async fn install(&mut self) -> Result<SetupOutcome, ActionErrorKind> {
        tracing::info!("Starting server setup process...");

        let actions_len = self.actions.len();

        for (index, action_state) in self.actions.iter_mut().enumerate() {
            let action_description = format!("{:?}", action_state.inner_ref());
            tracing::info!(
                "Executing action {}/{}: {}",
                index + 1,
                actions_len,
                action_description
            );
            match action_state.try_execute().await {
                Ok(_) => {
                    tracing::info!(
                        "Action {}/{} completed successfully.",
                        index + 1,
                        actions_len
                    );
                }
                Err(e) => {
                    tracing::error!(
                        "Error executing action {}/{}: {}. Attempting to revert...",
                        index + 1,
                        actions_len,
                        action_description,
                    );
                    self.revert_up_to(index).await;
                    return Err(e);
                }
            }
        }
        tracing::info!("Server setup process completed successfully.");

        Ok(SetupOutcome {
            dir: self.dir.clone(),
            record: self.record.clone(),
            manual_install: self.manual_install.clone(),
        })
    }

    async fn revert_up_to(&mut self, up_to_index: usize) {
        tracing::info!("Reverting actions up to index {}...", up_to_index);

        for i in (0..=up_to_index).rev() {
            if let Some(action_state) = self.actions.get_mut(i) {
                let action_description = format!("{:?}", action_state.inner_ref());
                tracing::info!("Reverting action (index {}): {}", i, action_description);
                if let Err(revert_err) = action_state.try_revert().await {
                    tracing::error!(
                        "Error reverting action (index {}): {}. Error: {}. Continuing rollback...",
                        i,
                        action_description,
                        revert_err
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::provision::{ProvisionError, SERVER_JAR};

    #[derive(Debug)]
    struct FakeJar;

    #[async_trait::async_trait]
    impl ServerJarSource for FakeJar {
        async fn fetch(
            &self,
            _server_type: ServerType,
            _version: &str,
            dest_dir: &Path,
        ) -> Result<PathBuf, ProvisionError> {
            let jar = dest_dir.join(SERVER_JAR);
            std::fs::write(&jar, b"PK fake jar").unwrap();
            Ok(jar)
        }
    }

    #[derive(Debug)]
    struct FailingJar;

    #[async_trait::async_trait]
    impl ServerJarSource for FailingJar {
        async fn fetch(
            &self,
            _server_type: ServerType,
            _version: &str,
            dest_dir: &Path,
        ) -> Result<PathBuf, ProvisionError> {
            std::fs::write(dest_dir.join(SERVER_JAR), b"PK trunc").unwrap();
            Err(ProvisionError::DownloadFailed {
                reason: "connection reset".into(),
                source: None,
            })
        }
    }

    fn request(name: &str, server_type: ServerType, location: StorageLocation) -> CreateServerRequest {
        CreateServerRequest {
            name: name.into(),
            server_type,
            version: "1.20.1".into(),
            ram_mb: 2 * 1024,
            port: 25565,
            location,
            java_path: "java".into(),
            online_mode: false,
        }
    }

    #[tokio::test]
    async fn creates_vanilla_server_layout() {
        let root = tempfile::tempdir().unwrap();
        let store = ServerStore::new(root.path().join("servers"));

        let mut manager = ServerSetupManager::plan(
            &request("test1", ServerType::Vanilla, StorageLocation::Default),
            &store,
            Arc::new(FakeJar),
        )
        .await
        .unwrap();
        let outcome = manager.install().await.unwrap();

        let dir = store.servers_dir().join("test1");
        assert_eq!(outcome.dir, dir);
        assert_eq!(std::fs::read_to_string(dir.join("eula.txt")).unwrap(), "eula=true");
        assert!(
            std::fs::read_to_string(dir.join("server.properties"))
                .unwrap()
                .contains("server-port=25565")
        );
        assert!(dir.join(SERVER_JAR).is_file());

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.join("redstone.json")).unwrap())
                .unwrap();
        assert_eq!(json["type"], "Vanilla");
        assert_eq!(json["version"], "1.20.1");
        assert_eq!(json["ram"], 2048);
    }

    #[tokio::test]
    async fn failed_download_removes_server_directory() {
        let root = tempfile::tempdir().unwrap();
        let store = ServerStore::new(root.path().join("servers"));

        let mut manager = ServerSetupManager::plan(
            &request("broken", ServerType::Paper, StorageLocation::Default),
            &store,
            Arc::new(FailingJar),
        )
        .await
        .unwrap();

        let err = manager.install().await.unwrap_err();

        assert!(matches!(
            err,
            ActionErrorKind::Provision(ProvisionError::DownloadFailed { .. })
        ));
        assert!(!store.servers_dir().join("broken").exists());
    }

    #[tokio::test]
    async fn forge_is_created_without_download() {
        let root = tempfile::tempdir().unwrap();
        let store = ServerStore::new(root.path().join("servers"));

        let mut manager = ServerSetupManager::plan(
            &request("modded", ServerType::Forge, StorageLocation::Default),
            &store,
            Arc::new(FailingJar),
        )
        .await
        .unwrap();
        let outcome = manager.install().await.unwrap();

        assert!(outcome.manual_install.is_some());
        assert!(outcome.dir.join("redstone.json").is_file());
        assert!(!outcome.dir.join(SERVER_JAR).exists());
    }

    #[tokio::test]
    async fn custom_location_registers_link() {
        let root = tempfile::tempdir().unwrap();
        let store = ServerStore::new(root.path().join("servers"));
        let custom = root.path().join("desktop").join("mc");

        let mut manager = ServerSetupManager::plan(
            &request("away", ServerType::Vanilla, StorageLocation::Custom(custom.clone())),
            &store,
            Arc::new(FakeJar),
        )
        .await
        .unwrap();
        manager.install().await.unwrap();

        assert_eq!(store.resolve_server_path("away"), custom);
        assert_eq!(store.list().unwrap().len(), 1);
    }
}
