//! Error taxonomy for the disk worker.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiskWorkerError {
    #[error("database error: {0}")]
    Database(#[from] database::DatabaseError),
    #[error("bad work parameters: {0}")]
    BadParams(#[from] serde_json::Error),
}
