pub mod base;
pub(crate) mod lib;
pub(crate) mod stateful;

pub use stateful::{ActionErrorKind, StatefulAction};

/// A reversible provisioning step.
#[async_trait::async_trait]
pub trait Action: Send + Sync + std::fmt::Debug + dyn_clone::DynClone {
    async fn execute(&self) -> Result<(), ActionErrorKind>;
    async fn revert(&self) -> Result<(), ActionErrorKind>;
}

dyn_clone::clone_trait_object!(Action);

#[async_trait::async_trait]
impl Action for Box<dyn Action + 'static> {
    async fn execute(&self) -> Result<(), ActionErrorKind> {
        self.as_ref().execute().await
    }

    async fn revert(&self) -> Result<(), ActionErrorKind> {
        self.as_ref().revert().await
    }
}
