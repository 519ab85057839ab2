//! Typed settings for the disk worker, decoded from the `workers` array
//! entry whose type tag is `disk`.

use job::ConfigField;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskWorkerConfig {
    /// Path to the shared embedded database file.
    #[serde(default = "default_db_name")]
    pub db_name: String,
    /// Bucket (sled tree) to write scheduled jobs into.
    pub bucket: String,
    /// Ready-pool size for this worker type.
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_db_name() -> String {
    "my.db".to_string()
}

fn default_workers() -> usize {
    20
}

impl Default for DiskWorkerConfig {
    fn default() -> Self {
        Self {
            db_name: default_db_name(),
            bucket: "job_list".to_string(),
            workers: default_workers(),
        }
    }
}

pub const SCHEMA: &[ConfigField] = &[
    ConfigField {
        name: "db_name",
        type_tag: "string",
        required: false,
        default: Some("my.db"),
        description: "Path to the shared embedded database file",
    },
    ConfigField {
        name: "bucket",
        type_tag: "string",
        required: true,
        default: None,
        description: "Bucket to write scheduled jobs into",
    },
    ConfigField {
        name: "workers",
        type_tag: "number",
        required: false,
        default: Some("20"),
        description: "Size of this worker type's ready pool",
    },
];
