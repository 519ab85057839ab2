//! The in-process configuration shape the manager is brought up with.
//! Mirrors `original_source/config/config.go`'s `AppConfig`; loading this
//! from a JSON file via a CLI-specified path is out of scope (no file I/O,
//! no argument parsing here — a demonstration binary may do that itself).

use serde::{Deserialize, Serialize};

/// One entry of a provider/worker/failure-handler list: the type tag used
/// to look the factory up in a [`crate::registry::Registry`], plus its
/// settings as an opaque JSON value decoded by that plugin's own
/// `Configer` implementation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigPair {
    #[serde(rename = "type")]
    pub type_tag: String,
    pub config: serde_json::Value,
}

fn default_stats_port() -> String {
    ":9090".to_string()
}

/// Everything needed to bring a manager up: which providers and workers
/// to instantiate, optional failure handlers, and the port the stats
/// endpoint listens on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub providers: Vec<ConfigPair>,
    #[serde(default)]
    pub workers: Vec<ConfigPair>,
    #[serde(default)]
    pub failure_handlers: Vec<ConfigPair>,
    #[serde(default = "default_stats_port")]
    pub stats_port: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
            workers: Vec::new(),
            failure_handlers: Vec::new(),
            stats_port: default_stats_port(),
        }
    }
}

/// Default ready-pool size for a worker type whose config omits
/// `"workers"`, matching the original's `DEFAULT_MAX_WORKERS`.
pub const DEFAULT_WORKER_COUNT: u64 = 20;

/// Peek at a worker's raw settings for its pool size without decoding the
/// rest of the (plugin-specific) config. Matches `populateWorkers`'
/// `json.Unmarshal` into an anonymous `{workers int}` struct.
pub fn worker_count(config: &serde_json::Value) -> usize {
    config
        .get("workers")
        .and_then(serde_json::Value::as_u64)
        .unwrap_or(DEFAULT_WORKER_COUNT) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_count_defaults_when_absent() {
        assert_eq!(worker_count(&serde_json::json!({})), DEFAULT_WORKER_COUNT as usize);
    }

    #[test]
    fn worker_count_reads_explicit_value() {
        assert_eq!(worker_count(&serde_json::json!({ "workers": 5 })), 5);
    }

    #[test]
    fn app_config_parses_minimal_json() {
        let conf: AppConfig = serde_json::from_str(r#"{"providers":[{"type":"redis","config":{}}]}"#).unwrap();
        assert_eq!(conf.providers.len(), 1);
        assert_eq!(conf.stats_port, ":9090");
    }
}
