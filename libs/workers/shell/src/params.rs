use serde::{Deserialize, Serialize};

/// The `params` payload a job of type `cli` carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellParams {
    pub command: String,
    #[serde(default)]
    pub params: Vec<String>,
}
