//! Scheduled persistent job queue: the disk provider reads jobs back out of
//! an embedded KV store in execution-time order. Pairs with `disk-worker`,
//! which writes the jobs this provider later serves.

pub mod config;
pub mod error;
pub mod job;
pub mod provider;

pub use config::DiskProviderConfig;
pub use error::DiskProviderError;
pub use job::DiskJob;
pub use provider::DiskProvider;

#[cfg(test)]
mod tests {
    use super::*;
    use ::job::{Job, JobConfig, JobConfirmer, Provider, ProviderConfirmer};
    use chrono::Utc;
    use serde_json::value::RawValue;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn raw(s: &str) -> Box<RawValue> {
        RawValue::from_string(s.to_string()).unwrap()
    }

    struct NoopConfirmer;

    #[async_trait::async_trait]
    impl JobConfirmer for NoopConfirmer {
        async fn confirm_job(&self, _job: &dyn Job) -> Result<(), ::job::ConfirmError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn scheduled_delivery_respects_execution_time() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("jobs.db");
        let bucket = "job_list";

        let mut provider = DiskProvider::new();
        <DiskProvider as ::job::Configer>::configure(
            &mut provider,
            serde_json::json!({ "db_name": db_path.to_string_lossy(), "bucket": bucket, "target": 10.0 }),
        )
        .await
        .unwrap();

        let handle = database::open(&db_path).unwrap();
        let past = Utc::now() - chrono::Duration::seconds(5);
        let future = Utc::now() + chrono::Duration::seconds(600);

        for (when, name) in [(past, "past-job"), (future, "future-job")] {
            let config = JobConfig::new(name, "cli", raw(r#"{"command":"/bin/true"}"#));
            let value = serde_json::to_vec(&config).unwrap();
            let key = database::timekey::encode(when, name);
            database::write_job(&handle.db, bucket, &key, &value).unwrap();
        }
        database::close(&handle).unwrap();

        let confirmer: Arc<dyn JobConfirmer> = Arc::new(ProviderConfirmer(Arc::new(NoopConfirmer)));
        let (tx, mut rx) = mpsc::channel(8);
        provider.request_work(5, confirmer, tx).await.unwrap();
        drop(provider);

        let mut names = vec![];
        while let Ok(job) = rx.try_recv() {
            names.push(job.config().name.clone());
        }
        assert_eq!(names, vec!["past-job"]);
    }

    #[tokio::test]
    async fn confirm_removes_tmp_entry() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("jobs.db");
        let bucket = "job_list";

        let mut provider = DiskProvider::new();
        <DiskProvider as ::job::Configer>::configure(
            &mut provider,
            serde_json::json!({ "db_name": db_path.to_string_lossy(), "bucket": bucket, "target": 10.0 }),
        )
        .await
        .unwrap();

        let handle = database::open(&db_path).unwrap();
        let when = Utc::now() - chrono::Duration::seconds(1);
        let config = JobConfig::new("job", "cli", raw(r#"{"command":"/bin/true"}"#));
        let value = serde_json::to_vec(&config).unwrap();
        let key = database::timekey::encode(when, "job");
        database::write_job(&handle.db, bucket, &key, &value).unwrap();
        database::close(&handle).unwrap();

        let confirmer: Arc<dyn JobConfirmer> = Arc::new(ProviderConfirmer(Arc::new(NoopConfirmer)));
        let (tx, mut rx) = mpsc::channel(8);
        provider.request_work(5, confirmer, tx).await.unwrap();
        let popped = rx.try_recv().unwrap();

        provider.confirm_job(popped.as_ref()).await.unwrap();

        let handle = database::open(&db_path).unwrap();
        let tmp = database::read_job(&handle.db, "tmp_job_list", &key).unwrap();
        assert!(tmp.is_none());
        database::close(&handle).unwrap();
    }
}
