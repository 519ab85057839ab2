//! The disk provider: a scheduled persistent queue read out of the main
//! bucket of an embedded KV store, in ascending execution-time order.

use crate::config::{DiskProviderConfig, SCHEMA};
use crate::error::DiskProviderError;
use crate::job::DiskJob;
use async_trait::async_trait;
use chrono::Utc;
use database::timekey;
use job::{ConfigField, ConfigureError, Configer, Job, JobConfig, JobConfirmer};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::Sender;

const WAIT_TIME: Duration = Duration::from_secs(5);

/// Scheduled persistent queue over a `sled` database shared with the
/// matching disk worker.
pub struct DiskProvider {
    handle: Option<database::Handle>,
    bucket: String,
    tmp_bucket: String,
    name: String,
    target: f64,
}

impl DiskProvider {
    pub fn new() -> Self {
        Self {
            handle: None,
            bucket: "job_list".to_string(),
            tmp_bucket: "tmp_job_list".to_string(),
            name: String::new(),
            target: 20.0,
        }
    }

    fn db(&self) -> &database::Handle {
        self.handle.as_ref().expect("disk provider used before configure")
    }

    /// Pop the entry at `key`/`value` from the main bucket into the tmp
    /// bucket and return the job it decodes to, pointed back at this
    /// provider. Crash between the tmp write and the main delete is safe:
    /// the job is recovered from the tmp bucket on next startup.
    fn pop_and_lock(&self, key: &[u8], value: &[u8], confirmer: Arc<dyn JobConfirmer>) -> Result<Box<dyn Job>, DiskProviderError> {
        let db = self.db();
        database::write_job(&db.db, &self.tmp_bucket, key, value)?;
        let tree = db.db.open_tree(&self.bucket)?;
        tree.remove(key)?;

        let config: JobConfig = serde_json::from_slice(value)?;
        Ok(Box::new(DiskJob::new(config, confirmer, key.to_vec())))
    }
}

impl Default for DiskProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobConfirmer for DiskProvider {
    async fn confirm_job(&self, job: &dyn Job) -> Result<(), job::ConfirmError> {
        let disk_job = job
            .as_any()
            .downcast_ref::<DiskJob>()
            .ok_or_else(|| job::ConfirmError::Transient("not a disk job".to_string()))?;

        let tree = self
            .db()
            .db
            .open_tree(&self.tmp_bucket)
            .map_err(|e| job::ConfirmError::Transient(e.to_string()))?;
        tree.remove(&disk_job.key).map_err(|e| job::ConfirmError::Transient(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl Configer for DiskProvider {
    fn default_config(&self) -> Value {
        serde_json::to_value(DiskProviderConfig::default()).unwrap()
    }

    fn schema(&self) -> &'static [ConfigField] {
        SCHEMA
    }

    async fn configure(&mut self, settings: Value) -> Result<(), ConfigureError> {
        let conf: DiskProviderConfig = serde_json::from_value(settings)?;
        let handle = database::open(&conf.db_name).map_err(|e| ConfigureError::Failed(e.to_string()))?;

        handle
            .db
            .open_tree(&conf.bucket)
            .map_err(|e| ConfigureError::Failed(e.to_string()))?;
        handle
            .db
            .open_tree(format!("tmp_{}", conf.bucket))
            .map_err(|e| ConfigureError::Failed(e.to_string()))?;

        self.tmp_bucket = format!("tmp_{}", conf.bucket);
        self.bucket = conf.bucket;
        self.name = if conf.name.is_empty() {
            format!("disk_{}", self.bucket)
        } else {
            conf.name
        };
        self.target = conf.target;
        self.handle = Some(handle);
        Ok(())
    }
}

#[async_trait]
impl job::Provider for DiskProvider {
    async fn request_work(
        &self,
        n: usize,
        confirmer: Arc<dyn JobConfirmer>,
        out: Sender<Box<dyn Job>>,
    ) -> Result<(), job::ProviderError> {
        let now = Utc::now();
        let bound = timekey::prefix_bound(now);
        let tree = self
            .db()
            .db
            .open_tree(&self.bucket)
            .map_err(|e| job::ProviderError::Transient(e.to_string()))?;

        let mut emitted = 0usize;
        for item in tree.iter() {
            if emitted >= n {
                break;
            }
            let (key, value) = item.map_err(|e| job::ProviderError::Transient(e.to_string()))?;
            let (ts, _) = match timekey::split(&key) {
                Some(split) => split,
                None => {
                    tracing::warn!(key = ?key, "disk provider: key missing timestamp separator, skipping");
                    continue;
                }
            };
            if ts > bound.as_slice() {
                break;
            }

            match self.pop_and_lock(&key, &value, confirmer.clone()) {
                Ok(job) => {
                    if out.send(job).await.is_err() {
                        break;
                    }
                    emitted += 1;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "disk provider: failed to decode job, skipping");
                }
            }
        }
        Ok(())
    }

    fn wait_time(&self, _target: f64) -> Duration {
        WAIT_TIME
    }

    fn target(&self) -> f64 {
        self.target
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn close(&self) -> Result<(), job::ProviderError> {
        if let Some(handle) = &self.handle {
            database::close(handle).map_err(|e| job::ProviderError::Transient(e.to_string()))?;
        }
        Ok(())
    }
}
