//! The job trait and the non-owning back-pointer to its confirming provider.

use crate::config::JobConfig;
use crate::error::ConfirmError;
use async_trait::async_trait;
use std::any::Any;
use std::sync::Arc;

/// Acknowledgement sink for a job. Implemented by providers. Modeled as a
/// non-owning reference from `Job` back to its producer: the provider
/// outlives every job it produces, which shutdown order enforces (workers
/// are stopped before providers are closed).
#[async_trait]
pub trait JobConfirmer: Send + Sync {
    /// Release whatever durability hold (lock, tmp-bucket entry) this job
    /// represents. Errors are logged by the caller, never propagated.
    async fn confirm_job(&self, job: &dyn Job) -> Result<(), ConfirmError>;
}

/// A job in flight: its descriptor plus a handle back to whoever must
/// acknowledge it.
pub trait Job: Send + Sync {
    /// The immutable descriptor, carried verbatim from the provider.
    fn config(&self) -> &JobConfig;

    /// Mutable access to the descriptor, used only by the manager's retry
    /// path to decrement the retry budget before re-enqueueing the same
    /// job to the tail of the queue.
    fn config_mut(&mut self) -> &mut JobConfig;

    /// The provider that produced this job.
    fn confirmer(&self) -> &Arc<dyn JobConfirmer>;

    /// Downcast hook so a provider can recover its own concrete job type
    /// (e.g. to read back an in-memory key it stashed at pop time) when all
    /// it's handed is `&dyn Job`.
    fn as_any(&self) -> &dyn Any;
}

/// Adapts a shared `Arc<dyn Provider>` (or any `JobConfirmer`) so it can be
/// cloned cheaply into every job it produces, without the provider having
/// to construct an `Arc` pointing back at itself from inside `&self`
/// methods. The manager builds one of these per registered provider and
/// hands it to `Provider::request_work` on every pull.
pub struct ProviderConfirmer<P: ?Sized>(pub Arc<P>);

#[async_trait]
impl<P> JobConfirmer for ProviderConfirmer<P>
where
    P: JobConfirmer + ?Sized,
{
    async fn confirm_job(&self, job: &dyn Job) -> Result<(), ConfirmError> {
        self.0.confirm_job(job).await
    }
}

/// A minimal `Job` impl for providers with no extra per-job state beyond
/// the descriptor and the confirming provider, which covers the redis and
/// disk providers.
pub struct SimpleJob {
    config: JobConfig,
    confirmer: Arc<dyn JobConfirmer>,
}

impl SimpleJob {
    pub fn new(config: JobConfig, confirmer: Arc<dyn JobConfirmer>) -> Self {
        Self { config, confirmer }
    }
}

impl Job for SimpleJob {
    fn config(&self) -> &JobConfig {
        &self.config
    }

    fn config_mut(&mut self) -> &mut JobConfig {
        &mut self.config
    }

    fn confirmer(&self) -> &Arc<dyn JobConfirmer> {
        &self.confirmer
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
