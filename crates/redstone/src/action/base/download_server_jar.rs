use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{
    action::{
        Action, ActionErrorKind, StatefulAction,
        lib::{OnMissing, remove_file},
    },
    provision::{SERVER_JAR, ServerJarSource},
    store::ServerType,
};

#[derive(Debug, Clone)]
pub struct DownloadServerJar {
    source: Arc<dyn ServerJarSource>,
    server_type: ServerType,
    version: String,
    dir: PathBuf,
}

impl DownloadServerJar {
    #[tracing::instrument(level = "debug", skip(source))]
    pub async fn plan(
        source: Arc<dyn ServerJarSource>,
        server_type: ServerType,
        version: &str,
        dir: &Path,
    ) -> Result<StatefulAction<Self>, ActionErrorKind> {
        Ok(StatefulAction::uncompleted(Self {
            source,
            server_type,
            version: version.to_string(),
            dir: dir.to_path_buf(),
        }))
    }
}

#[async_trait::async_trait]
impl Action for DownloadServerJar {
    #[tracing::instrument(level = "debug", skip_all, fields(kind = %self.server_type, version = %self.version))]
    async fn execute(&self) -> Result<(), ActionErrorKind> {
        let jar = self
            .source
            .fetch(self.server_type, &self.version, &self.dir)
            .await?;

        tracing::info!("Server jar stored at {}", jar.display());

        Ok(())
    }

    #[tracing::instrument(level = "debug", skip_all)]
    async fn revert(&self) -> Result<(), ActionErrorKind> {
        let jar = self.dir.join(SERVER_JAR);

        remove_file(&jar, OnMissing::Ignore)
            .await
            .map_err(|e| ActionErrorKind::Remove(jar, e))
    }
}
