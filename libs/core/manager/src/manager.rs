//! The manager pipeline: pull loops per provider feed a bounded inbound
//! queue, a single dispatch loop hands jobs to per-type worker pools, and
//! a post-execution path confirms, retries, or hands off to failure
//! handlers. Mirrors `original_source/manager/manager.go`'s `Manage`/
//! `runJob`/`handleFailure`.

use crate::config::{worker_count, AppConfig};
use crate::error::ManagerError;
use crate::registry::Registry;
use crate::stats::{ChannelStats, ManagerStats};
use async_trait::async_trait;
use job::{ConfirmError, Job, JobConfirmer, JobStatus, Provider, Worker};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};

/// Jobs initially probed from each provider for load analysis before the
/// adaptive rate takes over, matching the original's hardcoded `10`.
const PROBE_BATCH: usize = 10;
const PROBE_SETTLE: Duration = Duration::from_secs(5);

/// A checked-out-or-idle worker slot. `tx` is cloned into every spawned
/// job task so a worker can be returned after `recycle`; `rx` is held
/// exclusively by the dispatch loop.
struct ReadyPool {
    tx: mpsc::Sender<Box<dyn Worker>>,
    rx: mpsc::Receiver<Box<dyn Worker>>,
    capacity: usize,
}

/// A job and the name of the provider that produced it, carried together
/// on the inbound queue so per-provider statistics don't require widening
/// the `Job` trait with a back-reference to the producing provider's name.
type QueuedJob = (String, Box<dyn Job>);

/// Delegates confirmation to a type-erased `Arc<dyn Provider>`. A plain
/// wrapper rather than [`job::ProviderConfirmer`], since that generic
/// requires its parameter to implement `JobConfirmer` directly, which a
/// `dyn Provider` trait object cannot be coerced to without relying on
/// trait upcasting; calling a supertrait method through the vtable, as
/// here, needs no such coercion.
struct PullConfirmer(Arc<dyn Provider>);

#[async_trait]
impl JobConfirmer for PullConfirmer {
    async fn confirm_job(&self, job: &dyn Job) -> Result<(), ConfirmError> {
        self.0.confirm_job(job).await
    }
}

/// A cheaply-cloneable handle to a manager whose `run` has already
/// consumed the owning `Manager`. Carries just what the stats HTTP
/// surface needs: live counters and enough of each channel's sender half
/// to read back capacity/occupancy without touching the dispatch loop's
/// exclusive receiver halves.
#[derive(Clone)]
pub struct ManagerHandle {
    stats: Arc<ManagerStats>,
    shutdown_tx: watch::Sender<bool>,
    job_tx: mpsc::Sender<QueuedJob>,
    job_capacity: usize,
    worker_senders: HashMap<String, (mpsc::Sender<Box<dyn Worker>>, usize)>,
}

impl ManagerHandle {
    pub fn stats(&self) -> &Arc<ManagerStats> {
        &self.stats
    }

    /// Signal the running manager to stop. Idempotent.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Current ready-pool occupancy and inbound-queue depth, read from
    /// each channel's sender half (`capacity() - remaining` gives the
    /// number of items currently queued, since a bounded `mpsc` channel's
    /// `capacity()` reports the number of free slots).
    pub fn channel_stats(&self) -> HashMap<String, ChannelStats> {
        let mut channels = HashMap::new();
        channels.insert(
            "job_channel".to_string(),
            ChannelStats {
                capacity: self.job_capacity,
                queue: self.job_capacity.saturating_sub(self.job_tx.capacity()),
            },
        );
        for (job_type, (tx, capacity)) in &self.worker_senders {
            channels.insert(
                format!("worker_{job_type}"),
                ChannelStats {
                    capacity: *capacity,
                    queue: capacity.saturating_sub(tx.capacity()),
                },
            );
        }
        channels
    }

    /// The full stats report, as served at `GET /manager/stats`.
    pub fn report(&self) -> crate::stats::ManagerStatsReport {
        self.stats.report(self.channel_stats())
    }
}

pub struct Manager {
    providers: HashMap<String, Arc<dyn Provider>>,
    ready: HashMap<String, ReadyPool>,
    failure_handlers: Arc<Vec<Mutex<Box<dyn Worker>>>>,
    job_tx: mpsc::Sender<QueuedJob>,
    job_rx: mpsc::Receiver<QueuedJob>,
    stats: Arc<ManagerStats>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Manager {
    /// Build and configure a manager: construct every provider and worker
    /// named in `conf` from the given registries, size each worker type's
    /// ready pool to its configured (or default) worker count. Unknown
    /// type tags or configure failures are fatal.
    pub async fn configure(conf: AppConfig, providers: &Registry<dyn Provider>, workers: &Registry<dyn Worker>) -> Result<Self, ManagerError> {
        let mut built_providers = HashMap::new();
        for pair in &conf.providers {
            let provider = providers.create(&pair.type_tag, pair.config.clone()).await?;
            let provider: Arc<dyn Provider> = Arc::from(provider);
            built_providers.insert(provider.name().to_string(), provider);
        }

        let mut ready = HashMap::new();
        for pair in &conf.workers {
            let count = worker_count(&pair.config);
            let (tx, rx) = mpsc::channel(count.max(1));
            for _ in 0..count {
                let worker = workers.create(&pair.type_tag, pair.config.clone()).await?;
                tx.send(worker).await.expect("freshly created channel");
            }
            tracing::info!(count, job_type = %pair.type_tag, "manager: created ready pool");
            ready.insert(pair.type_tag.clone(), ReadyPool { tx, rx, capacity: count });
        }

        let mut failure_handlers = Vec::new();
        for pair in &conf.failure_handlers {
            let worker = workers.create(&pair.type_tag, pair.config.clone()).await?;
            failure_handlers.push(Mutex::new(worker));
            tracing::info!(job_type = %pair.type_tag, "manager: created failure handler");
        }

        let (job_tx, job_rx) = mpsc::channel(10);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            providers: built_providers,
            ready,
            failure_handlers: Arc::new(failure_handlers),
            job_tx,
            job_rx,
            stats: Arc::new(ManagerStats::new()),
            shutdown_tx,
            shutdown_rx,
        })
    }

    pub fn stats(&self) -> Arc<ManagerStats> {
        self.stats.clone()
    }

    /// Signal every pull loop and the dispatch loop to stop, and kill
    /// every in-flight-capable worker. Idempotent.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// A cheaply-cloneable handle exposing stats and shutdown to callers
    /// (such as the HTTP surface) that must outlive `run`'s consumption of
    /// `self`. Take this before calling `run`.
    pub fn handle(&self) -> ManagerHandle {
        ManagerHandle {
            stats: self.stats.clone(),
            shutdown_tx: self.shutdown_tx.clone(),
            job_tx: self.job_tx.clone(),
            job_capacity: 10,
            worker_senders: self.ready.iter().map(|(job_type, pool)| (job_type.clone(), (pool.tx.clone(), pool.capacity))).collect(),
        }
    }

    /// Total configured worker count across every type, the denominator
    /// the admission controller's `capacity_by_provider` uses — not
    /// narrowed to the provider's own job type, since a slot freed by one
    /// provider's job can pick up work from any provider.
    fn total_worker_count(&self) -> usize {
        self.ready.values().map(|pool| pool.capacity).sum()
    }

    /// Run the pull loops and the dispatch loop until shutdown. Consumes
    /// `self` since the dispatch loop needs exclusive access to the ready
    /// pools' receive halves for its whole lifetime.
    pub async fn run(mut self) {
        let total_workers = self.total_worker_count();
        for provider in self.providers.values().cloned() {
            let job_tx = self.job_tx.clone();
            let mut shutdown_rx = self.shutdown_rx.clone();
            let stats = self.stats.clone();
            tokio::spawn(async move {
                pull_loop(provider, job_tx, stats, total_workers, &mut shutdown_rx).await;
            });
        }

        loop {
            tokio::select! {
                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        self.kill_all().await;
                        return;
                    }
                }
                job = self.job_rx.recv() => {
                    match job {
                        Some((provider_name, job)) => self.dispatch(provider_name, job).await,
                        None => return,
                    }
                }
            }
        }
    }

    async fn kill_all(&mut self) {
        for pool in self.ready.values_mut() {
            while let Ok(mut worker) = pool.rx.try_recv() {
                if let Err(e) = worker.kill().await {
                    tracing::warn!(error = %e, "manager: worker kill failed during shutdown");
                }
            }
        }
        for provider in self.providers.values() {
            if let Err(e) = provider.close().await {
                tracing::warn!(error = %e, provider = provider.name(), "manager: provider close failed during shutdown");
            }
        }
    }

    /// Check a worker out of its type's ready pool and hand the job off
    /// to a spawned task. Blocks only on the checkout, never on the work
    /// itself, so one slow job can't stall dispatch for every other type.
    async fn dispatch(&mut self, provider_name: String, job: Box<dyn Job>) {
        let job_type = job.config().job_type.clone();
        let Some(pool) = self.ready.get_mut(&job_type) else {
            tracing::warn!(job_type = %job_type, job = %job.config().name, "manager: unknown job type, dropping without confirm");
            return;
        };

        let Some(mut worker) = pool.rx.recv().await else {
            tracing::warn!(job_type = %job_type, "manager: ready pool closed");
            return;
        };
        observability::JobMetrics::set_ready_pool_depth(&job_type, pool.capacity.saturating_sub(pool.tx.capacity()));
        let return_tx = pool.tx.clone();
        let return_capacity = pool.capacity;
        let stats = self.stats.clone();
        let job_tx = self.job_tx.clone();
        let failure_handlers = self.failure_handlers.clone();
        let depth_job_type = job_type.clone();

        tokio::spawn(async move {
            tracing::info!(job = %job.config().name, job_type = %job_type, provider = %provider_name, "manager: dispatching job");
            let result = worker.work(job.as_ref()).await;
            worker.recycle();
            let _ = return_tx.send(worker).await;
            observability::JobMetrics::set_ready_pool_depth(&depth_job_type, return_capacity.saturating_sub(return_tx.capacity()));

            match result.status {
                JobStatus::Success => {
                    if let Err(e) = job.confirmer().confirm_job(job.as_ref()).await {
                        tracing::warn!(error = %e, job = %job.config().name, "manager: confirm failed");
                    }
                    stats.consume(&job_type, &provider_name, &result);
                }
                _ => {
                    handle_failure(job, result, &provider_name, &stats, &job_tx, &failure_handlers).await;
                }
            }
        });
    }

    /// Current ready-pool occupancy and inbound-queue depth, for the
    /// stats HTTP surface.
    pub fn channel_stats(&self) -> HashMap<String, ChannelStats> {
        let mut channels = HashMap::new();
        channels.insert(
            "job_channel".to_string(),
            ChannelStats {
                capacity: 10,
                queue: 10usize.saturating_sub(self.job_tx.capacity()),
            },
        );
        for (job_type, pool) in &self.ready {
            channels.insert(
                format!("worker_{job_type}"),
                ChannelStats {
                    capacity: pool.capacity,
                    queue: pool.capacity.saturating_sub(pool.tx.capacity()),
                },
            );
        }
        channels
    }
}

/// One provider's pull loop: probe with a small batch to gauge latency,
/// settle, then repeatedly request an adaptively-sized batch and wait the
/// provider's own cooperative interval. Stops on shutdown.
async fn pull_loop(provider: Arc<dyn Provider>, job_tx: mpsc::Sender<QueuedJob>, stats: Arc<ManagerStats>, total_workers: usize, shutdown_rx: &mut watch::Receiver<bool>) {
    tracing::info!(provider = provider.name(), "manager: requesting initial probe batch");
    if let Err(e) = request_work(&provider, PROBE_BATCH, &job_tx).await {
        tracing::warn!(provider = provider.name(), error = %e, "manager: probe batch failed");
    }

    tokio::select! {
        _ = tokio::time::sleep(PROBE_SETTLE) => {}
        _ = shutdown_rx.changed() => { if *shutdown_rx.borrow() { return; } }
    }

    loop {
        if *shutdown_rx.borrow() {
            return;
        }
        let wait = provider.wait_time(0.0);
        let count = num_jobs_to_request(&provider, wait, &stats, total_workers);
        if count > 0 {
            if let Err(e) = request_work(&provider, count, &job_tx).await {
                tracing::warn!(provider = provider.name(), error = %e, "manager: transient error requesting work");
            }
        }
        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = shutdown_rx.changed() => { if *shutdown_rx.borrow() { return; } }
        }
    }
}

/// `count = min(target × wait, capacity_by_provider × wait)`, where
/// `capacity_by_provider = total_workers × (1s / average_duration_for_this_provider)`.
/// `total_workers` is the configured count across every type, not just
/// the types this provider feeds, since any freed worker slot can pick up
/// any provider's work. `average_duration_for_this_provider` comes from
/// [`ManagerStats::average_duration_by_provider`], which floors its job
/// count at one so a provider with no completions yet reads as "one unit"
/// of duration rather than dividing by zero.
fn num_jobs_to_request(provider: &Arc<dyn Provider>, wait: Duration, stats: &ManagerStats, total_workers: usize) -> usize {
    let wait_secs = wait.as_secs_f64();
    let target_count = provider.target() * wait_secs;

    let avg = stats.average_duration_by_provider(provider.name());
    let capacity_by_provider = total_workers as f64 * (1.0 / avg.as_secs_f64());
    let capacity_count = capacity_by_provider * wait_secs;

    target_count.min(capacity_count).max(0.0) as usize
}


async fn request_work(provider: &Arc<dyn Provider>, count: usize, job_tx: &mpsc::Sender<QueuedJob>) -> Result<(), job::ProviderError> {
    let confirmer: Arc<dyn JobConfirmer> = Arc::new(PullConfirmer(provider.clone()));
    let (tx, mut rx) = mpsc::channel(count.max(1));
    let provider_for_request = provider.clone();
    let provider_name = provider.name().to_string();
    let request = tokio::spawn(async move { provider_for_request.request_work(count, confirmer, tx).await });

    while let Some(job) = rx.recv().await {
        if job_tx.send((provider_name.clone(), job)).await.is_err() {
            break;
        }
    }

    request.await.unwrap_or(Ok(()))
}

/// Decrement the retry budget; re-enqueue to the tail if budget remains,
/// else serialize through failure handlers in registration order.
/// Confirms unconditionally at the end either way, matching the literal
/// upstream `handleFailure` — including confirming a job whose retry copy
/// has already been handed back to the queue, which releases its external
/// durability hold while the in-process retry is the only remaining copy
/// of the work.
async fn handle_failure(
    mut job: Box<dyn Job>,
    mut stats: job::JobStats,
    provider_name: &str,
    manager_stats: &ManagerStats,
    job_tx: &mpsc::Sender<QueuedJob>,
    failure_handlers: &[Mutex<Box<dyn Worker>>],
) {
    job.config_mut().decrement_retries();
    let job_type = job.config().job_type.clone();
    let out_of_retries = job.config().retries == 0;

    if out_of_retries {
        stats.end(JobStatus::Failure);
        manager_stats.consume(&job_type, provider_name, &stats);

        for handler in failure_handlers {
            let mut handler = handler.lock().await;
            let failure_stats = handler.work(job.as_ref()).await;
            handler.recycle();
            tracing::info!(
                job = %job.config().name,
                status = ?failure_stats.status,
                "manager: failure handler completed"
            );
        }

        if let Err(e) = job.confirmer().confirm_job(job.as_ref()).await {
            tracing::warn!(error = %e, job = %job.config().name, "manager: confirm failed");
        }
    } else {
        stats.end(JobStatus::Retry);
        manager_stats.consume(&job_type, provider_name, &stats);

        if let Err(e) = job.confirmer().confirm_job(job.as_ref()).await {
            tracing::warn!(error = %e, job = %job.config().name, "manager: confirm failed before retry re-enqueue");
        }
        if job_tx.send((provider_name.to_string(), job)).await.is_err() {
            tracing::warn!("manager: inbound queue closed, dropping retry");
        }
    }
}
