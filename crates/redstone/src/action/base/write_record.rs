use std::path::PathBuf;

use crate::{
    action::{
        Action, ActionErrorKind, StatefulAction,
        lib::{OnMissing, remove_file},
    },
    store::{LinkRecord, ServerRecord, ServerStore},
};

/// Writes `redstone.json` into the server directory.
#[derive(Debug, Clone)]
pub struct WriteServerRecord {
    record: ServerRecord,
}

impl WriteServerRecord {
    pub async fn plan(record: ServerRecord) -> Result<StatefulAction<Self>, ActionErrorKind> {
        record
            .validate()
            .map_err(|reason| anyhow::anyhow!("Refusing to write server record: {reason}"))?;

        Ok(StatefulAction::uncompleted(Self { record }))
    }
}

#[async_trait::async_trait]
impl Action for WriteServerRecord {
    #[tracing::instrument(level = "debug", skip_all, fields(name = %self.record.name))]
    async fn execute(&self) -> Result<(), ActionErrorKind> {
        ServerStore::save(&self.record.path, &self.record)?;
        Ok(())
    }

    async fn revert(&self) -> Result<(), ActionErrorKind> {
        let path = ServerStore::record_path(&self.record.path);

        remove_file(&path, OnMissing::Ignore)
            .await
            .map_err(|e| ActionErrorKind::Remove(path, e))
    }
}

/// Registers a `<name>.link` file for servers stored outside the servers directory.
#[derive(Debug, Clone)]
pub struct CreateLink {
    store: ServerStore,
    link: LinkRecord,
}

impl CreateLink {
    pub async fn plan(
        store: ServerStore,
        link: LinkRecord,
    ) -> Result<StatefulAction<Self>, ActionErrorKind> {
        let existing: PathBuf = store.link_path(&link.name);
        if existing.exists() {
            return Err(ActionErrorKind::AlreadyExists(existing));
        }

        Ok(StatefulAction::uncompleted(Self { store, link }))
    }
}

#[async_trait::async_trait]
impl Action for CreateLink {
    #[tracing::instrument(level = "debug", skip_all, fields(name = %self.link.name))]
    async fn execute(&self) -> Result<(), ActionErrorKind> {
        self.store.register_link(&self.link)?;
        Ok(())
    }

    async fn revert(&self) -> Result<(), ActionErrorKind> {
        let path = self.store.link_path(&self.link.name);

        remove_file(&path, OnMissing::Error)
            .await
            .map_err(|e| ActionErrorKind::Remove(path, e))
    }
}
