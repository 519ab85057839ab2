//! Worker half of the scheduled persistent queue: writes jobs into the
//! embedded KV store that `disk-provider` later reads back out in
//! execution-time order.

pub mod config;
pub mod error;
pub mod params;
pub mod worker;

pub use config::DiskWorkerConfig;
pub use error::DiskWorkerError;
pub use params::DiskParams;
pub use worker::DiskWorker;

#[cfg(test)]
mod tests {
    use super::*;
    use ::job::{Job, JobConfig, JobConfirmer, Worker};
    use serde_json::value::RawValue;
    use sha1::Digest;
    use std::any::Any;
    use std::sync::Arc;

    struct NoopConfirmer;

    #[async_trait::async_trait]
    impl JobConfirmer for NoopConfirmer {
        async fn confirm_job(&self, _job: &dyn Job) -> Result<(), ::job::ConfirmError> {
            Ok(())
        }
    }

    struct PlainJob(JobConfig, Arc<dyn JobConfirmer>);

    impl Job for PlainJob {
        fn config(&self) -> &JobConfig {
            &self.0
        }
        fn config_mut(&mut self) -> &mut JobConfig {
            &mut self.0
        }
        fn confirmer(&self) -> &Arc<dyn JobConfirmer> {
            &self.1
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn raw(s: &str) -> Box<RawValue> {
        RawValue::from_string(s.to_string()).unwrap()
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("jobs.db");

        let mut worker = DiskWorker::new();
        <DiskWorker as ::job::Configer>::configure(
            &mut worker,
            serde_json::json!({ "db_name": db_path.to_string_lossy(), "bucket": "job_list" }),
        )
        .await
        .unwrap();

        let inner = JobConfig::new("x", "cli", raw(r#"{"command":"/bin/true"}"#));
        let when = chrono::Utc::now();
        let params = DiskParams::new(when, raw(inner_json(&inner).as_str()));
        let outer_params = raw(serde_json::to_string(&params).unwrap().as_str());
        let outer = JobConfig::new("write-job", "disk", outer_params);
        let job = PlainJob(outer, Arc::new(NoopConfirmer));

        let stats = worker.work(&job).await;
        assert_eq!(stats.status, ::job::JobStatus::Success);

        let handle = database::open(&db_path).unwrap();
        let suffix = hex::encode(sha1::Sha1::digest(params.raw_job.get().as_bytes()));
        let key = database::timekey::encode(when, &suffix);
        let stored = database::read_job(&handle.db, "job_list", &key).unwrap();
        assert_eq!(stored.as_deref(), Some(params.raw_job.get().as_bytes()));
        database::close(&handle).unwrap();
    }

    #[tokio::test]
    async fn recycle_resets_hash_state_between_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("jobs.db");

        let mut worker = DiskWorker::new();
        <DiskWorker as ::job::Configer>::configure(
            &mut worker,
            serde_json::json!({ "db_name": db_path.to_string_lossy(), "bucket": "job_list" }),
        )
        .await
        .unwrap();

        let when = chrono::Utc::now();
        for name in ["one", "two"] {
            let inner = JobConfig::new(name, "cli", raw(r#"{"command":"/bin/true"}"#));
            let params = DiskParams::new(when, raw(inner_json(&inner).as_str()));
            let outer_params = raw(serde_json::to_string(&params).unwrap().as_str());
            let outer = JobConfig::new(name, "disk", outer_params);
            let job = PlainJob(outer, Arc::new(NoopConfirmer));
            worker.work(&job).await;
            worker.recycle();
        }

        let handle = database::open(&db_path).unwrap();
        let tree = handle.db.open_tree("job_list").unwrap();
        assert_eq!(tree.len(), 2);
        database::close(&handle).unwrap();
    }

    fn inner_json(config: &JobConfig) -> String {
        serde_json::to_string(config).unwrap()
    }
}
