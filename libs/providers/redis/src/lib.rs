//! A remote job queue over a plain redis list, with lock-based
//! at-least-once delivery (pop-lock-keepalive-confirm) and an optional
//! drain-to-disk path for memory pressure.

pub mod config;
pub mod error;
pub mod job;
pub mod keepalive;
pub mod provider;
pub mod scripts;

pub use config::RedisProviderConfig;
pub use error::RedisProviderError;
pub use job::{DrainedJob, RedisJob};
pub use provider::RedisProvider;
pub use scripts::ScriptCatalog;

#[cfg(test)]
mod tests {
    use super::*;
    use ::job::{Configer, Job, JobConfig, JobConfirmer, Provider, ProviderConfirmer};
    use redis::AsyncCommands;
    use serde_json::value::RawValue;
    use std::sync::Arc;
    use std::time::Duration;
    use testcontainers::runners::AsyncRunner;
    use testcontainers_modules::redis::Redis;
    use tokio::sync::mpsc;

    fn raw(s: &str) -> Box<RawValue> {
        RawValue::from_string(s.to_string()).unwrap()
    }

    async fn configured(host: &str, port: u16) -> RedisProvider {
        let mut provider = RedisProvider::new();
        provider
            .configure(serde_json::json!({
                "host": host,
                "port": port.to_string(),
                "job_list": "jobs_test",
            }))
            .await
            .unwrap();
        provider
    }

    #[tokio::test]
    async fn pop_lock_confirm_round_trip() {
        let node = Redis::default().start().await.unwrap();
        let port = node.get_host_port_ipv4(6379).await.unwrap();

        let client = redis::Client::open(format!("redis://127.0.0.1:{port}")).unwrap();
        let mut conn = client.get_multiplexed_async_connection().await.unwrap();
        let config = JobConfig::new("echo", "cli", raw(r#"{"command":"/bin/true"}"#));
        let payload = serde_json::to_string(&config).unwrap();
        let _: () = redis::cmd("LPUSH").arg("jobs_test").arg(&payload).query_async(&mut conn).await.unwrap();

        let provider = Arc::new(configured("127.0.0.1", port).await);
        let confirmer: Arc<dyn JobConfirmer> = Arc::new(ProviderConfirmer(provider.clone()));

        let (tx, mut rx) = mpsc::channel(4);
        provider.request_work(1, confirmer, tx).await.unwrap();
        let job = rx.recv().await.expect("job delivered");
        assert_eq!(job.config().job_type, "cli");

        let redis_job = job.as_any().downcast_ref::<RedisJob>().unwrap();
        let tmp_key = format!("tmp_job:{}", redis_job.hash);
        let lock_key = format!("lock:tmp_job:{}", redis_job.hash);

        let exists: bool = conn.exists(&tmp_key).await.unwrap();
        assert!(exists, "popped job should be stashed under a tmp key");
        let locked: bool = conn.exists(&lock_key).await.unwrap();
        assert!(locked, "popped job should hold a lock");

        job.confirmer().confirm_job(job.as_ref()).await.unwrap();

        let exists: bool = conn.exists(&tmp_key).await.unwrap();
        assert!(!exists, "confirm should remove the tmp entry");
        let locked: bool = conn.exists(&lock_key).await.unwrap();
        assert!(!locked, "confirm should release the lock");
    }

    #[tokio::test]
    async fn orphaned_tmp_entries_are_recovered_without_a_lock() {
        let node = Redis::default().start().await.unwrap();
        let port = node.get_host_port_ipv4(6379).await.unwrap();

        let client = redis::Client::open(format!("redis://127.0.0.1:{port}")).unwrap();
        let mut conn = client.get_multiplexed_async_connection().await.unwrap();

        // Simulate a worker that popped a job, crashed before confirming,
        // and whose lock has since expired: a tmp entry with no lock.
        let config = JobConfig::new("orphan", "cli", raw(r#"{"command":"/bin/true"}"#));
        let payload = serde_json::to_string(&config).unwrap();
        let hash = "deadbeef";
        let _: () = redis::cmd("SET").arg(format!("tmp_job:{hash}")).arg(&payload).query_async(&mut conn).await.unwrap();

        let provider = Arc::new(configured("127.0.0.1", port).await);
        let confirmer: Arc<dyn JobConfirmer> = Arc::new(ProviderConfirmer(provider.clone()));

        let (tx, mut rx) = mpsc::channel(4);
        provider.request_work(1, confirmer, tx).await.unwrap();
        let job = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("orphan recovery should not hang")
            .expect("orphaned job delivered");
        assert_eq!(job.config().name, "orphan");

        let locked: bool = conn.exists(format!("lock:tmp_job:{hash}")).await.unwrap();
        assert!(locked, "orphan recovery should re-lock the entry for its new owner");
    }

    /// A malformed entry on the list must not reach the manager as a job,
    /// must not take a keepalive, and must leave its lock to expire
    /// naturally so orphan recovery can reclaim it later — it must not be
    /// stranded forever under a keepalive that renews a lock nothing will
    /// ever confirm.
    #[tokio::test]
    async fn undecodable_entry_yields_no_job_and_no_keepalive() {
        let node = Redis::default().start().await.unwrap();
        let port = node.get_host_port_ipv4(6379).await.unwrap();

        let client = redis::Client::open(format!("redis://127.0.0.1:{port}")).unwrap();
        let mut conn = client.get_multiplexed_async_connection().await.unwrap();
        let _: () = redis::cmd("LPUSH").arg("jobs_test").arg("not valid json").query_async(&mut conn).await.unwrap();

        let provider = Arc::new(configured("127.0.0.1", port).await);
        let confirmer: Arc<dyn JobConfirmer> = Arc::new(ProviderConfirmer(provider.clone()));

        let (tx, mut rx) = mpsc::channel(4);
        provider.request_work(1, confirmer, tx).await.unwrap();
        assert!(rx.try_recv().is_err(), "an undecodable entry must never be presented as a job");

        let hash = redis::cmd("KEYS")
            .arg("tmp_job:*")
            .query_async::<Vec<String>>(&mut conn)
            .await
            .unwrap()
            .into_iter()
            .find(|k| !k.starts_with("tmp_job:lock:") && !k.starts_with("lock:"))
            .expect("popped entry should still be stashed under its tmp key");
        let hash = hash.strip_prefix("tmp_job:").unwrap();

        let locked: bool = conn.exists(format!("lock:tmp_job:{hash}")).await.unwrap();
        assert!(locked, "the lock taken at pop time should still be set immediately after");

        tokio::time::sleep(Duration::from_secs(31)).await;
        let locked: bool = conn.exists(format!("lock:tmp_job:{hash}")).await.unwrap();
        assert!(!locked, "with no keepalive running, the lock must expire rather than be renewed forever");
    }
}
