//! Error taxonomy for the job data model.
//!
//! Each variant corresponds to a fate in the error handling table: most are
//! logged by the caller and never propagate past the manager, a few
//! (configure-time) are fatal.

use thiserror::Error;

/// Failure acknowledging a job back to its provider. Always logged, never
/// surfaced further up the call chain.
#[derive(Debug, Error)]
pub enum ConfirmError {
    #[error("transient I/O confirming job: {0}")]
    Transient(String),
    #[error("confirm target no longer exists")]
    NotFound,
}

/// Failure requesting or closing a provider batch.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("transient I/O: {0}")]
    Transient(String),
    #[error("job decode failure: {0}")]
    Decode(String),
    #[error("provider closed")]
    Closed,
}

/// Failure performing or killing a unit of work.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("worker failed: {0}")]
    Failed(String),
    #[error("kill signal could not be delivered")]
    KillUndeliverable,
}

/// Failure applying typed configuration to a plugin. Fatal at configure time.
#[derive(Debug, Error)]
pub enum ConfigureError {
    #[error("invalid settings: {0}")]
    InvalidSettings(#[from] serde_json::Error),
    #[error("configure failed: {0}")]
    Failed(String),
}
