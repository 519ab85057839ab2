//! Error taxonomy for the redis provider.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RedisProviderError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("job decode failure: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("memory limit string could not be parsed: {0}")]
    MemLimit(String),
    #[error("provider closed")]
    Closed,
}

impl RedisProviderError {
    pub fn is_connection_error(&self) -> bool {
        match self {
            Self::Redis(e) => {
                let msg = e.to_string().to_lowercase();
                msg.contains("connection") || msg.contains("disconnected") || msg.contains("refused") || msg.contains("eof")
            }
            _ => false,
        }
    }
}
