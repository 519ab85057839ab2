//! Typed settings for the disk provider, decoded from the `providers`
//! array entry whose type tag is `disk`.

use job::ConfigField;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskProviderConfig {
    /// This provider's name, used to bucket statistics (`disk_<bucket>` if
    /// left unset).
    #[serde(default)]
    pub name: String,
    /// Desired jobs-per-second from this source, read by the admission
    /// controller.
    #[serde(default = "default_target")]
    pub target: f64,
    /// Path to the shared embedded database file.
    #[serde(default = "default_db_name")]
    pub db_name: String,
    /// Bucket (sled tree) holding scheduled jobs. Required.
    pub bucket: String,
}

fn default_target() -> f64 {
    20.0
}

fn default_db_name() -> String {
    "my.db".to_string()
}

impl Default for DiskProviderConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            target: default_target(),
            db_name: default_db_name(),
            bucket: "job_list".to_string(),
        }
    }
}

pub const SCHEMA: &[ConfigField] = &[
    ConfigField {
        name: "name",
        type_tag: "string",
        required: false,
        default: Some(""),
        description: "Name used to bucket statistics for this provider",
    },
    ConfigField {
        name: "target",
        type_tag: "number",
        required: false,
        default: Some("20"),
        description: "Target jobs per second for this job_list",
    },
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
        description: "Bucket to pull scheduled jobs from",
    },
];
