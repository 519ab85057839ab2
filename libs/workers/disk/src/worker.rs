//! The disk worker: writes a job to the shared embedded database under a
//! key derived from its intended execution time.

use crate::config::{DiskWorkerConfig, SCHEMA};
use crate::params::DiskParams;
use async_trait::async_trait;
use database::timekey;
use job::{ConfigField, ConfigureError, Configer, Job, JobStats, JobStatus, WorkerError};
use serde_json::Value;
use sha1::{Digest, Sha1};

pub struct DiskWorker {
    handle: Option<database::Handle>,
    bucket: String,
    hasher: Sha1,
}

impl DiskWorker {
    pub fn new() -> Self {
        Self {
            handle: None,
            bucket: "job_list".to_string(),
            hasher: Sha1::new(),
        }
    }

    fn db(&self) -> &database::Handle {
        self.handle.as_ref().expect("disk worker used before configure")
    }

    /// The write cannot be interrupted once started; success is
    /// unconditional once the transaction commits.
    fn write_job(&mut self, job: &dyn Job) -> Result<(), crate::error::DiskWorkerError> {
        let params: DiskParams = serde_json::from_str(job.config().params.get())?;
        self.hasher.update(params.raw_job.get().as_bytes());
        let suffix = hex::encode(self.hasher.clone().finalize());
        let key = timekey::encode(params.execution_time, &suffix);
        database::write_job(&self.db().db, &self.bucket, &key, params.raw_job.get().as_bytes())?;
        Ok(())
    }
}

impl Default for DiskWorker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Configer for DiskWorker {
    fn default_config(&self) -> Value {
        serde_json::to_value(DiskWorkerConfig::default()).unwrap()
    }

    fn schema(&self) -> &'static [ConfigField] {
        SCHEMA
    }

    async fn configure(&mut self, settings: Value) -> Result<(), ConfigureError> {
        let conf: DiskWorkerConfig = serde_json::from_value(settings)?;
        let handle = database::open(&conf.db_name).map_err(|e| ConfigureError::Failed(e.to_string()))?;
        handle
            .db
            .open_tree(&conf.bucket)
            .map_err(|e| ConfigureError::Failed(e.to_string()))?;
        self.bucket = conf.bucket;
        self.handle = Some(handle);
        Ok(())
    }
}

#[async_trait]
impl job::Worker for DiskWorker {
    async fn work(&mut self, job: &dyn Job) -> JobStats {
        let mut stats = JobStats::new();
        stats.mark_started();
        match self.write_job(job) {
            Ok(()) => stats.end(JobStatus::Success),
            Err(e) => {
                tracing::warn!(error = %e, "disk worker: failed to write job");
                stats.end(JobStatus::Failure);
            }
        }
        stats
    }

    fn recycle(&mut self) {
        Digest::reset(&mut self.hasher);
    }

    /// The write transaction cannot be interrupted once started.
    async fn kill(&mut self) -> Result<(), WorkerError> {
        Ok(())
    }
}
