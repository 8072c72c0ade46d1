use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use crate::action::{
    Action, ActionErrorKind, StatefulAction,
    lib::{OnMissing, remove_file},
};

#[derive(Debug, Clone)]
pub struct CreateFile {
    path: PathBuf,
    content: String,
    mode: Option<u32>,
}

impl CreateFile {
    pub async fn plan<P: AsRef<Path>>(
        path: P,
        content: impl Into<String>,
    ) -> Result<StatefulAction<Self>, ActionErrorKind> {
        Self::plan_with_mode(path, content, None).await
    }

    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn plan_with_mode<P: AsRef<Path>>(
        path: P,
        content: impl Into<String>,
        mode: Option<u32>,
    ) -> Result<StatefulAction<Self>, ActionErrorKind> {
        let this = Self {
            path: path.as_ref().to_path_buf(),
            content: content.into(),
            mode,
        };

        if let Ok(metadata) = tokio::fs::metadata(&this.path).await {
            if metadata.is_dir() {
                return Err(anyhow::anyhow!(
                    "Cannot create file at {}: path exists and is a directory.",
                    this.path.display()
                )
                .into());
            }
        }

        Ok(StatefulAction::uncompleted(this))
    }
}

#[async_trait::async_trait]
impl Action for CreateFile {
    #[tracing::instrument(level = "debug", skip_all, fields(path = %self.path.display()))]
    async fn execute(&self) -> Result<(), ActionErrorKind> {
        let write = async {
            let mut file = tokio::fs::File::create(&self.path).await?;
            file.write_all(self.content.as_bytes()).await?;
            file.sync_all().await
        };
        write
            .await
            .map_err(|e| ActionErrorKind::Write(self.path.clone(), e))?;

        #[cfg(unix)]
        if let Some(mode) = self.mode {
            use std::os::unix::fs::PermissionsExt;

            tokio::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(mode)).await?;
        }

        Ok(())
    }

    #[tracing::instrument(level = "debug", skip_all, fields(path = %self.path.display()))]
    async fn revert(&self) -> Result<(), ActionErrorKind> {
        remove_file(&self.path, OnMissing::Ignore)
            .await
            .map_err(|e| ActionErrorKind::Remove(self.path.clone(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_and_removes_file() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("eula.txt");

        let action = CreateFile::plan(&path, "eula=true").await.unwrap();
        action.inner_ref().execute().await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "eula=true");

        action.inner_ref().revert().await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn refuses_directory_target() {
        let root = tempfile::tempdir().unwrap();

        assert!(CreateFile::plan(root.path(), "x").await.is_err());
    }
}
