//! Declarative self-description of a plugin's settings, replacing the
//! original's reflection-driven inspection of struct tags.

use crate::error::ConfigureError;
use async_trait::async_trait;
use serde_json::Value;

/// One field of a plugin's settings record, as it would be reflected from
/// `json:"..."`/`required:"..."`/`description:"..."` struct tags in the
/// original. Returned by `Configer::schema` so an operator-facing "list all
/// options" view never has to special-case a plugin.
#[derive(Debug, Clone, Copy)]
pub struct ConfigField {
    pub name: &'static str,
    pub type_tag: &'static str,
    pub required: bool,
    pub default: Option<&'static str>,
    pub description: &'static str,
}

/// A component that can describe its own settings and be configured from
/// them. Implemented by every provider and worker.
#[async_trait]
pub trait Configer: Send + Sync {
    /// Default settings, as JSON, merged under whatever the caller supplies.
    fn default_config(&self) -> Value;

    /// Declarative schema for every settings field.
    fn schema(&self) -> &'static [ConfigField];

    /// Finish configuring this instance from a decoded settings object.
    /// Fatal at process-configure time if it fails.
    async fn configure(&mut self, settings: Value) -> Result<(), ConfigureError>;
}
