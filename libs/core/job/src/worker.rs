//! The worker trait: a pluggable executor of one job type.

use crate::configer::Configer;
use crate::error::WorkerError;
use crate::job::Job;
use crate::stats::JobStats;
use async_trait::async_trait;

/// Performs a job's side effect. Belongs to exactly one type pool for its
/// whole process lifetime; is either idle in that pool or servicing
/// exactly one job at a time, never both.
#[async_trait]
pub trait Worker: Send + Sync + Configer {
    /// Perform the job, returning a finalized stats record. Never panics on
    /// job-level failure — failure is reported through `JobStats::status`,
    /// not a distinct error channel.
    async fn work(&mut self, job: &dyn Job) -> JobStats;

    /// Reset any per-job scratch state before returning to the ready pool.
    fn recycle(&mut self);

    /// Preempt in-flight work, if this worker kind supports it (CLI,
    /// HTTP-egress). A no-op for workers whose work cannot be interrupted
    /// (e.g. the disk worker, once the write transaction has started).
    async fn kill(&mut self) -> Result<(), WorkerError>;
}
