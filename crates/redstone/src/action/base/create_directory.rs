use std::path::{Path, PathBuf};

use crate::{
    action::{
        Action, ActionErrorKind, StatefulAction,
        lib::{OnMissing, remove_dir_all},
    },
    platform::is_restricted_path,
};

/// Creates the server directory. Reverting removes it with everything inside.
#[derive(Debug, Clone)]
pub struct CreateDirectory {
    path: PathBuf,
}

impl CreateDirectory {
    #[tracing::instrument(level = "debug", skip_all, fields(path = %path.as_ref().display()))]
    pub async fn plan<P: AsRef<Path>>(path: P) -> Result<StatefulAction<Self>, ActionErrorKind> {
        let this = Self {
            path: path.as_ref().to_path_buf(),
        };

        if is_restricted_path(&this.path) {
            return Err(ActionErrorKind::RestrictedPath(this.path));
        }

        if tokio::fs::try_exists(&this.path).await? {
            let mut entries = tokio::fs::read_dir(&this.path)
                .await
                .map_err(|_| ActionErrorKind::AlreadyExists(this.path.clone()))?;

            // An empty directory picked as a custom location is fine to reuse.
            if entries.next_entry().await?.is_some() {
                return Err(ActionErrorKind::AlreadyExists(this.path));
            }
        }

        Ok(StatefulAction::uncompleted(this))
    }
}

#[async_trait::async_trait]
impl Action for CreateDirectory {
    #[tracing::instrument(level = "debug", skip_all, fields(path = %self.path.display()))]
    async fn execute(&self) -> Result<(), ActionErrorKind> {
        tokio::fs::create_dir_all(&self.path)
            .await
            .map_err(|e| ActionErrorKind::CreateDirectory(self.path.clone(), e))
    }

    #[tracing::instrument(level = "debug", skip_all, fields(path = %self.path.display()))]
    async fn revert(&self) -> Result<(), ActionErrorKind> {
        remove_dir_all(&self.path, OnMissing::Ignore)
            .await
            .map_err(|e| ActionErrorKind::Remove(self.path.clone(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn refuses_non_empty_directory() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("server.jar"), b"jar").unwrap();

        assert!(matches!(
            CreateDirectory::plan(root.path()).await,
            Err(ActionErrorKind::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn execute_then_revert() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("a").join("b");

        let action = CreateDirectory::plan(&path).await.unwrap();
        action.inner_ref().execute().await.unwrap();
        assert!(path.is_dir());

        action.inner_ref().revert().await.unwrap();
        assert!(!path.exists());
    }
}
