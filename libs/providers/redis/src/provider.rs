//! The redis provider: a remote job queue with lock-based at-least-once
//! delivery over a plain redis list (pop-lock-keepalive-confirm).

use crate::config::{parse_memory, RedisProviderConfig, SCHEMA};
use crate::error::RedisProviderError;
use crate::job::{DrainedJob, RedisJob};
use crate::keepalive::Keepalive;
use crate::scripts::ScriptCatalog;
use async_trait::async_trait;
use chrono::Utc;
use disk_worker::DiskParams;
use job::{ConfigField, ConfigureError, Configer, Job, JobConfig, JobConfirmer};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde_json::value::RawValue;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc::Sender, Mutex};
use tokio::task::JoinHandle;

const LOCK_TTL_SECS: u64 = 30;
const WAIT_TIME: Duration = Duration::from_secs(10);
const MEMORY_POLL_INTERVAL: Duration = Duration::from_secs(10);

pub struct RedisProvider {
    conn: Option<Arc<Mutex<ConnectionManager>>>,
    scripts: Arc<ScriptCatalog>,
    job_list: String,
    tmp_prefix: String,
    lock_prefix: String,
    name: String,
    target: f64,
    memory_limit: Option<i64>,
    dump_on_limit: bool,
    keepalives: Arc<Mutex<HashMap<String, Keepalive>>>,
    last_out: Arc<Mutex<Option<Sender<Box<dyn Job>>>>>,
    monitor_task: Option<JoinHandle<()>>,
}

impl RedisProvider {
    pub fn new() -> Self {
        Self {
            conn: None,
            scripts: Arc::new(ScriptCatalog::load()),
            job_list: "job_list".to_string(),
            tmp_prefix: "tmp_job:".to_string(),
            lock_prefix: "tmp_job:lock:".to_string(),
            name: String::new(),
            target: 0.0,
            memory_limit: None,
            dump_on_limit: false,
            keepalives: Arc::new(Mutex::new(HashMap::new())),
            last_out: Arc::new(Mutex::new(None)),
            monitor_task: None,
        }
    }

    fn conn(&self) -> Arc<Mutex<ConnectionManager>> {
        self.conn.clone().expect("redis provider used before configure")
    }

    /// Pop and lock a single job via the atomic `popAndLock` script,
    /// starting its keepalive and registering it in the in-flight map.
    /// Returns `None` once the list is empty.
    async fn pop_one(&self, confirmer: Arc<dyn JobConfirmer>) -> Result<Option<RedisJob>, RedisProviderError> {
        let mut guard = self.conn().lock().await;
        let result: Option<(String, String)> = self
            .scripts
            .pop_and_lock
            .key(&self.job_list)
            .arg(LOCK_TTL_SECS)
            .arg(&self.tmp_prefix)
            .arg(&self.lock_prefix)
            .invoke_async(&mut *guard)
            .await?;
        drop(guard);

        let Some((raw, hash)) = result else {
            return Ok(None);
        };
        Ok(self.wrap_popped(raw, hash, confirmer).await)
    }

    /// Fetch up to `max` orphaned (lock-expired) entries, re-locking each
    /// for this process.
    async fn pop_orphans(&self, max: usize, confirmer: Arc<dyn JobConfirmer>) -> Result<Vec<RedisJob>, RedisProviderError> {
        if max == 0 {
            return Ok(vec![]);
        }
        let mut guard = self.conn().lock().await;
        let flat: Vec<String> = self
            .scripts
            .get_orphan
            .arg(&self.tmp_prefix)
            .arg(&self.lock_prefix)
            .arg(max)
            .arg(LOCK_TTL_SECS)
            .invoke_async(&mut *guard)
            .await?;
        drop(guard);

        let mut jobs = Vec::with_capacity(flat.len() / 2);
        let mut iter = flat.into_iter();
        while let (Some(raw), Some(hash)) = (iter.next(), iter.next()) {
            if let Some(job) = self.wrap_popped(raw, hash, confirmer.clone()).await {
                jobs.push(job);
            }
        }
        Ok(jobs)
    }

    /// Decode `raw` into a `JobConfig` and, only on success, start its
    /// keepalive and register it in the in-flight map. A decode failure is
    /// logged and the entry is left exactly as popped — tmp entry present,
    /// lock present, no keepalive — so no job is ever presented to the
    /// manager for it (nothing to confirm) and the lock simply expires in
    /// `LOCK_TTL_SECS`, at which point `getOrphan` reclaims it like any
    /// other orphan. Mirrors the original `tmpSet.go`'s `PopAndLock`,
    /// which parses before spawning `keep.KeepAlive` and returns `(nil,
    /// err)` on parse failure so `popJob` drops it without enqueueing.
    async fn wrap_popped(&self, raw: String, hash: String, confirmer: Arc<dyn JobConfirmer>) -> Option<RedisJob> {
        let config = match serde_json::from_str::<JobConfig>(&raw) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(error = %e, hash = %hash, "redis provider: job decode failure, leaving lock to expire for orphan recovery");
                return None;
            }
        };

        let keepalive = Keepalive::spawn(self.conn(), self.scripts.clone(), self.lock_prefix.clone(), hash.clone(), LOCK_TTL_SECS);
        self.keepalives.lock().await.insert(hash.clone(), keepalive);

        Some(RedisJob::new(config, confirmer, hash))
    }

    async fn list_len(&self) -> Result<u64, RedisProviderError> {
        let mut guard = self.conn().lock().await;
        Ok(guard.llen(&self.job_list).await?)
    }

}

impl Default for RedisProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobConfirmer for RedisProvider {
    async fn confirm_job(&self, job: &dyn Job) -> Result<(), job::ConfirmError> {
        let redis_job = job
            .as_any()
            .downcast_ref::<RedisJob>()
            .ok_or_else(|| job::ConfirmError::Transient("not a redis job".to_string()))?;

        if let Some(keepalive) = self.keepalives.lock().await.remove(&redis_job.hash) {
            keepalive.stop();
        }

        let conn = self.conn();
        let mut guard = conn.lock().await;
        let _: i64 = self
            .scripts
            .confirm
            .arg(&redis_job.hash)
            .arg(&self.tmp_prefix)
            .arg(&self.lock_prefix)
            .invoke_async(&mut *guard)
            .await
            .map_err(|e| job::ConfirmError::Transient(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl Configer for RedisProvider {
    fn default_config(&self) -> serde_json::Value {
        serde_json::to_value(RedisProviderConfig::default()).unwrap()
    }

    fn schema(&self) -> &'static [ConfigField] {
        SCHEMA
    }

    async fn configure(&mut self, settings: serde_json::Value) -> Result<(), ConfigureError> {
        let conf: RedisProviderConfig = serde_json::from_value(settings)?;

        let url = format!("redis://{}:{}", conf.host, conf.port);
        let client = redis::Client::open(url).map_err(|e| ConfigureError::Failed(e.to_string()))?;
        let manager = client
            .get_connection_manager()
            .await
            .map_err(|e| ConfigureError::Failed(e.to_string()))?;

        self.conn = Some(Arc::new(Mutex::new(manager)));
        self.job_list = conf.job_list;
        self.tmp_prefix = conf.tmp_prefix.clone();
        // Deliberately NOT nested under tmp_prefix: getOrphan's KEYS scan
        // globs on tmp_prefix, and a lock_prefix starting with tmp_prefix
        // would make lock keys themselves show up as orphan candidates.
        self.lock_prefix = format!("lock:{}", conf.tmp_prefix);
        self.name = format!("redis_{}", self.job_list);
        self.target = conf.target;
        self.dump_on_limit = conf.dump_on_limit;

        self.memory_limit = match &conf.memory_limit {
            Some(s) => Some(parse_memory(s).map_err(ConfigureError::Failed)?),
            None => None,
        };

        if self.dump_on_limit {
            if let Some(limit) = self.memory_limit {
                let conn = self.conn();
                let scripts = self.scripts.clone();
                let keepalives = self.keepalives.clone();
                let last_out = self.last_out.clone();
                let job_list = self.job_list.clone();
                let tmp_prefix = self.tmp_prefix.clone();
                let lock_prefix = self.lock_prefix.clone();

                self.monitor_task = Some(tokio::spawn(async move {
                    let monitor = MonitorState {
                        conn,
                        scripts,
                        keepalives,
                        last_out,
                        job_list,
                        tmp_prefix,
                        lock_prefix,
                    };
                    monitor.run(limit).await;
                }));
            } else {
                tracing::warn!("redis provider: dump_on_limit set with no memory_limit, drain disabled");
            }
        }

        Ok(())
    }
}

/// Standalone copy of the state the background memory monitor needs,
/// since it outlives any borrow of `&self` once spawned.
struct MonitorState {
    conn: Arc<Mutex<ConnectionManager>>,
    scripts: Arc<ScriptCatalog>,
    keepalives: Arc<Mutex<HashMap<String, Keepalive>>>,
    last_out: Arc<Mutex<Option<Sender<Box<dyn Job>>>>>,
    job_list: String,
    tmp_prefix: String,
    lock_prefix: String,
}

impl MonitorState {
    async fn used_memory(&self) -> Result<i64, RedisProviderError> {
        let mut guard = self.conn.lock().await;
        let info: String = redis::cmd("INFO").arg("memory").query_async(&mut *guard).await?;
        drop(guard);
        for line in info.lines() {
            if let Some(rest) = line.strip_prefix("used_memory:") {
                return rest.trim().parse::<i64>().map_err(|_| RedisProviderError::MemLimit(line.to_string()));
            }
        }
        Err(RedisProviderError::MemLimit("used_memory not present in INFO response".to_string()))
    }

    async fn drain_once(&self) -> Result<bool, RedisProviderError> {
        let out = self.last_out.lock().await.clone();
        let Some(out) = out else {
            return Ok(false);
        };

        let mut guard = self.conn.lock().await;
        let result: Option<(String, String)> = self
            .scripts
            .pop_and_lock
            .key(&self.job_list)
            .arg(LOCK_TTL_SECS)
            .arg(&self.tmp_prefix)
            .arg(&self.lock_prefix)
            .invoke_async(&mut *guard)
            .await?;
        drop(guard);

        let Some((raw, hash)) = result else {
            return Ok(false);
        };

        // Release immediately; the job's durability moves to the disk
        // bucket it's about to be spooled into.
        {
            let mut guard = self.conn.lock().await;
            let _: redis::RedisResult<i64> = self
                .scripts
                .confirm
                .arg(&hash)
                .arg(&self.tmp_prefix)
                .arg(&self.lock_prefix)
                .invoke_async(&mut *guard)
                .await;
        }
        self.keepalives.lock().await.remove(&hash);

        let config: JobConfig = match serde_json::from_str(&raw) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = %e, "redis provider: drain could not decode job, dropping");
                return Ok(true);
            }
        };

        let execution_time = Utc::now();
        let raw_job = RawValue::from_string(serde_json::to_string(&config).unwrap()).unwrap();
        let disk_params = DiskParams::new(execution_time, raw_job);
        let disk_params_raw = RawValue::from_string(serde_json::to_string(&disk_params).unwrap()).unwrap();
        let mut disk_config = JobConfig::new(config.name.clone(), "disk", disk_params_raw);
        disk_config.retries = config.retries;

        let _ = out.send(Box::new(DrainedJob::new(disk_config))).await;
        Ok(true)
    }

    async fn run(self, limit: i64) {
        loop {
            tokio::time::sleep(MEMORY_POLL_INTERVAL).await;
            let over_limit = match self.used_memory().await {
                Ok(used) => used > limit,
                Err(e) => {
                    tracing::warn!(error = %e, "redis provider: memory check failed");
                    false
                }
            };
            if !over_limit {
                continue;
            }
            tracing::info!(limit, "redis provider: memory limit reached, draining job list to disk");
            loop {
                match self.drain_once().await {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => {
                        tracing::warn!(error = %e, "redis provider: drain iteration failed");
                        break;
                    }
                }
                match self.used_memory().await {
                    Ok(used) if used <= limit => break,
                    Err(_) => break,
                    _ => {}
                }
            }
        }
    }
}

#[async_trait]
impl job::Provider for RedisProvider {
    async fn request_work(
        &self,
        n: usize,
        confirmer: Arc<dyn JobConfirmer>,
        out: Sender<Box<dyn Job>>,
    ) -> Result<(), job::ProviderError> {
        *self.last_out.lock().await = Some(out.clone());

        let orphans = self
            .pop_orphans(n, confirmer.clone())
            .await
            .map_err(|e| job::ProviderError::Transient(e.to_string()))?;
        let remaining = n.saturating_sub(orphans.len());

        for job in orphans {
            if out.send(Box::new(job)).await.is_err() {
                return Ok(());
            }
        }

        let list_len = self
            .list_len()
            .await
            .map_err(|e| job::ProviderError::Transient(e.to_string()))? as usize;
        let to_pop = remaining.min(list_len);

        for _ in 0..to_pop {
            match self.pop_one(confirmer.clone()).await {
                Ok(Some(job)) => {
                    if out.send(Box::new(job)).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "redis provider: transient error requesting work");
                    return Err(job::ProviderError::Transient(e.to_string()));
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
        if let Some(handle) = &self.monitor_task {
            handle.abort();
        }
        Ok(())
    }
}
