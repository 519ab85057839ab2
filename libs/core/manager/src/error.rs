//! Error taxonomy for the manager crate.

use job::ConfigureError;
use thiserror::Error;

/// Failure resolving a type tag to a registered factory, or applying
/// settings to the instance it produces. Fatal at configure time.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unknown type tag: {0}")]
    UnknownType(String),
    #[error("configure failed: {0}")]
    Configure(#[from] ConfigureError),
}

/// Aggregates every failure that can surface while bringing a manager up.
/// Once running, provider/worker/confirm failures are logged at their
/// point of occurrence rather than propagated here.
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("provider error: {0}")]
    Provider(#[from] job::ProviderError),
}
