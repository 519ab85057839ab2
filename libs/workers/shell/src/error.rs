use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShellWorkerError {
    #[error("bad command parameters: {0}")]
    BadParams(#[from] serde_json::Error),
    #[error("failed to spawn process: {0}")]
    Spawn(#[from] std::io::Error),
}
