use std::path::PathBuf;

use crate::{action::Action, provision::ProvisionError, store::StoreError};

#[derive(Debug, Clone)]
pub struct StatefulAction<A>
where
    A: Action,
{
    action: A,
    state: ActionState,
}

impl<A> From<A> for StatefulAction<A>
where
    A: Action,
{
    fn from(action: A) -> Self {
        Self {
            action,
            state: ActionState::Progress,
        }
    }
}

impl<A> StatefulAction<A>
where
    A: Action,
{
    pub fn boxed(self) -> StatefulAction<Box<dyn Action>>
    where
        Self: 'static,
    {
        StatefulAction {
            action: Box::new(self.action),
            state: self.state,
        }
    }

    #[inline]
    pub fn inner_ref(&self) -> &A {
        &self.action
    }

    pub fn uncompleted(action: A) -> Self {
        Self {
            action,
            state: ActionState::Uncompleted,
        }
    }
}

impl StatefulAction<Box<dyn Action>> {
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn try_execute(&mut self) -> Result<(), ActionErrorKind> {
        match self.state {
            ActionState::Completed => {}
            _ => {
                self.state = ActionState::Progress;
                tracing::debug!("Executing action: {:?}", self.action);
                self.action.execute().await?;
                tracing::debug!("Action completed: {:?}", self.action);
                self.state = ActionState::Completed;
            }
        }

        Ok(())
    }

    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn try_revert(&mut self) -> Result<(), ActionErrorKind> {
        match self.state {
            ActionState::Uncompleted => {}
            _ => {
                tracing::debug!("Reverting action: {:?}", self.action);
                self.action.revert().await?;
                tracing::debug!("Action reverted: {:?}", self.action);
                self.state = ActionState::Uncompleted;
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActionState {
    Completed,
    Progress,
    Uncompleted,
}

#[non_exhaustive]
#[derive(Debug, thiserror::Error, strum::IntoStaticStr)]
pub enum ActionErrorKind {
    #[error(transparent)]
    Other(#[from] anyhow::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Provision(#[from] ProvisionError),
    #[error("`{0}` already exists, pick another server name or location")]
    AlreadyExists(PathBuf),
    #[error("`{0}` is a protected system location")]
    RestrictedPath(PathBuf),
    #[error("Create directory `{0}`")]
    CreateDirectory(PathBuf, #[source] std::io::Error),
    #[error("Write path `{0}`")]
    Write(PathBuf, #[source] std::io::Error),
    #[error("Remove path `{0}`")]
    Remove(PathBuf, #[source] std::io::Error),
}
