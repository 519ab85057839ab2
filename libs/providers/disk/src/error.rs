//! Error taxonomy for the disk provider.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiskProviderError {
    #[error("database error: {0}")]
    Database(#[from] database::DatabaseError),
    #[error("job decode failure: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("confirm target no longer held a lock")]
    NotLocked,
}
