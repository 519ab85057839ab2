//! Typed settings for the redis provider, decoded from the `providers`
//! array entry whose type tag is `redis`.

use job::ConfigField;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisProviderConfig {
    pub host: String,
    pub port: String,
    #[serde(default = "default_job_list")]
    pub job_list: String,
    #[serde(default)]
    pub dump_on_limit: bool,
    /// Human memory size (`"512mb"`, `"2gb"`, or a plain byte count).
    /// Parsed with [`parse_memory`]. Has no effect unless `dump_on_limit`
    /// is set.
    #[serde(default)]
    pub memory_limit: Option<String>,
    #[serde(default)]
    pub target: f64,
    #[serde(default = "default_tmp_prefix")]
    pub tmp_prefix: String,
}

fn default_job_list() -> String {
    "job_list".to_string()
}

fn default_tmp_prefix() -> String {
    "tmp_job:".to_string()
}

impl Default for RedisProviderConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: "6379".to_string(),
            job_list: default_job_list(),
            dump_on_limit: false,
            memory_limit: None,
            target: 0.0,
            tmp_prefix: default_tmp_prefix(),
        }
    }
}

pub const SCHEMA: &[ConfigField] = &[
    ConfigField {
        name: "host",
        type_tag: "string",
        required: true,
        default: None,
        description: "The host of the redis server to connect to",
    },
    ConfigField {
        name: "port",
        type_tag: "string",
        required: true,
        default: None,
        description: "Port of the redis server to connect to",
    },
    ConfigField {
        name: "job_list",
        type_tag: "string",
        required: true,
        default: Some("job_list"),
        description: "The list in redis to pull jobs from",
    },
    ConfigField {
        name: "dump_on_limit",
        type_tag: "bool",
        required: false,
        default: Some("false"),
        description: "When the redis server reaches memory_limit, start dumping the job list to disk via the disk worker",
    },
    ConfigField {
        name: "memory_limit",
        type_tag: "string",
        required: false,
        default: None,
        description: "Used-memory level at which to start draining the job list to disk; has no effect unless dump_on_limit is set",
    },
    ConfigField {
        name: "target",
        type_tag: "number",
        required: false,
        default: Some("0"),
        description: "Target jobs per second for this job_list",
    },
];

/// Parse a human memory size (`"512mb"`, `"2gb"`, `"1024"`) into a byte
/// count. Mirrors the `memString.ParseMemory` helper the original source
/// leans on for `RedisConfig.MemLimit`.
pub fn parse_memory(input: &str) -> Result<i64, String> {
    let trimmed = input.trim();
    let lower = trimmed.to_lowercase();
    let (digits, multiplier) = if let Some(n) = lower.strip_suffix("gb") {
        (n, 1024 * 1024 * 1024)
    } else if let Some(n) = lower.strip_suffix("mb") {
        (n, 1024 * 1024)
    } else if let Some(n) = lower.strip_suffix("kb") {
        (n, 1024)
    } else if let Some(n) = lower.strip_suffix('b') {
        (n, 1)
    } else {
        (lower.as_str(), 1)
    };
    digits
        .trim()
        .parse::<f64>()
        .map(|n| (n * multiplier as f64) as i64)
        .map_err(|e| format!("invalid memory size {input:?}: {e}"))
}
