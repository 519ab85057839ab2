//! Named-factory registries for providers and workers, resolved from a
//! configuration type tag. Per the "plugin registry with process-wide
//! lifetime" redesign flag, these are explicit values built at startup and
//! threaded into [`crate::Manager::configure`] rather than a global
//! `OnceLock`-backed inventory.

use crate::error::RegistryError;
use job::{Configer, Provider, Worker};
use std::collections::HashMap;

/// A registry of `T` factories, keyed by the lowercase type tag the
/// factory's product is configured under.
pub struct Registry<T: ?Sized> {
    factories: HashMap<String, Box<dyn Fn() -> Box<T> + Send + Sync>>,
}

impl<T: ?Sized> Default for Registry<T> {
    fn default() -> Self {
        Self { factories: HashMap::new() }
    }
}

impl<T: ?Sized> Registry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `type_tag`. A later registration for the
    /// same tag replaces the earlier one.
    pub fn register(&mut self, type_tag: impl Into<String>, factory: impl Fn() -> Box<T> + Send + Sync + 'static) {
        self.factories.insert(type_tag.into(), Box::new(factory));
    }

    pub fn contains(&self, type_tag: &str) -> bool {
        self.factories.contains_key(type_tag)
    }
}

impl Registry<dyn Provider> {
    /// Construct and configure a provider of `type_tag` from `settings`.
    pub async fn create(&self, type_tag: &str, settings: serde_json::Value) -> Result<Box<dyn Provider>, RegistryError> {
        let factory = self.factories.get(type_tag).ok_or_else(|| RegistryError::UnknownType(type_tag.to_string()))?;
        let mut instance = factory();
        Configer::configure(&mut *instance, settings).await?;
        Ok(instance)
    }
}

impl Registry<dyn Worker> {
    /// Construct and configure a worker of `type_tag` from `settings`.
    pub async fn create(&self, type_tag: &str, settings: serde_json::Value) -> Result<Box<dyn Worker>, RegistryError> {
        let factory = self.factories.get(type_tag).ok_or_else(|| RegistryError::UnknownType(type_tag.to_string()))?;
        let mut instance = factory();
        Configer::configure(&mut *instance, settings).await?;
        Ok(instance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use job::{ConfigField, ConfigureError, Job, JobConfirmer};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc::Sender;

    struct StubProvider;

    #[async_trait]
    impl JobConfirmer for StubProvider {
        async fn confirm_job(&self, _job: &dyn Job) -> Result<(), job::ConfirmError> {
            Ok(())
        }
    }

    #[async_trait]
    impl Configer for StubProvider {
        fn default_config(&self) -> serde_json::Value {
            serde_json::json!({})
        }
        fn schema(&self) -> &'static [ConfigField] {
            &[]
        }
        async fn configure(&mut self, _settings: serde_json::Value) -> Result<(), ConfigureError> {
            Ok(())
        }
    }

    #[async_trait]
    impl Provider for StubProvider {
        async fn request_work(&self, _n: usize, _confirmer: Arc<dyn JobConfirmer>, _out: Sender<Box<dyn Job>>) -> Result<(), job::ProviderError> {
            Ok(())
        }
        fn wait_time(&self, _target: f64) -> Duration {
            Duration::from_secs(5)
        }
        fn target(&self) -> f64 {
            0.0
        }
        fn name(&self) -> &str {
            "stub"
        }
        async fn close(&self) -> Result<(), job::ProviderError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn unknown_type_tag_errors() {
        let registry: Registry<dyn Provider> = Registry::new();
        let err = registry.create("nope", serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, RegistryError::UnknownType(t) if t == "nope"));
    }

    #[tokio::test]
    async fn registered_factory_is_constructed_and_configured() {
        let mut registry: Registry<dyn Provider> = Registry::new();
        registry.register("stub", || Box::new(StubProvider));
        let provider = registry.create("stub", serde_json::json!({})).await.unwrap();
        assert_eq!(provider.name(), "stub");
    }
}
