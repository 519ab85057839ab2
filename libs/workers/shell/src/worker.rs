//! A thin worker that execs a job's params as a child process. A
//! side-effect shell over `tokio::process`, not a scheduling abstraction.

use crate::error::ShellWorkerError;
use crate::params::ShellParams;
use async_trait::async_trait;
use job::{ConfigField, ConfigureError, Configer, Job, JobStats, JobStatus, WorkerError};
use serde_json::Value;
use tokio::process::Command;
use tokio::sync::oneshot;

const SCHEMA: &[ConfigField] = &[];

pub struct ShellWorker {
    kill: Option<oneshot::Sender<()>>,
}

impl ShellWorker {
    pub fn new() -> Self {
        Self { kill: None }
    }

    fn spawn(&self, params: &ShellParams) -> Result<tokio::process::Child, ShellWorkerError> {
        Ok(Command::new(&params.command).args(&params.params).kill_on_drop(true).spawn()?)
    }
}

impl Default for ShellWorker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Configer for ShellWorker {
    fn default_config(&self) -> Value {
        Value::Object(Default::default())
    }

    fn schema(&self) -> &'static [ConfigField] {
        SCHEMA
    }

    async fn configure(&mut self, _settings: Value) -> Result<(), ConfigureError> {
        Ok(())
    }
}

#[async_trait]
impl job::Worker for ShellWorker {
    async fn work(&mut self, job: &dyn Job) -> JobStats {
        let mut stats = JobStats::new();
        stats.mark_started();

        let params: ShellParams = match serde_json::from_str(job.config().params.get()) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, "shell worker: bad params");
                stats.end(JobStatus::Failure);
                return stats;
            }
        };

        let mut child = match self.spawn(&params) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = %e, "shell worker: failed to spawn");
                stats.end(JobStatus::Failure);
                return stats;
            }
        };

        let (tx, rx) = oneshot::channel();
        self.kill = Some(tx);

        tokio::select! {
            _ = rx => {
                let _ = child.kill().await;
                tracing::info!(job = %job.config().name, "shell worker: killed in-flight job");
                stats.end(JobStatus::Failure);
            }
            status = child.wait() => {
                match status {
                    Ok(status) if status.success() => stats.end(JobStatus::Success),
                    _ => stats.end(JobStatus::Failure),
                }
            }
        }
        stats
    }

    fn recycle(&mut self) {
        self.kill = None;
    }

    async fn kill(&mut self) -> Result<(), WorkerError> {
        if let Some(tx) = self.kill.take() {
            let _ = tx.send(());
        }
        Ok(())
    }
}
