//! The provider trait: a pluggable source of jobs, authoritative for their
//! acknowledgement.

use crate::configer::Configer;
use crate::error::ProviderError;
use crate::job::{Job, JobConfirmer};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::Sender;

/// A source of jobs. Every provider is also a `JobConfirmer`: it is the
/// authority for acknowledging the jobs it produces.
#[async_trait]
pub trait Provider: JobConfirmer + Configer {
    /// Request up to `n` jobs, sending each onto `out` as it becomes
    /// available. Returns once the batch is exhausted. A provider that is
    /// temporarily unable to serve part of a batch returns the partial
    /// batch and a transient error rather than blocking indefinitely.
    ///
    /// `confirmer` is the non-owning back-pointer every produced `Job`
    /// should carry (the manager builds this once per registered provider,
    /// wrapping the same `Arc` the manager holds, since a provider cannot
    /// cheaply construct an `Arc` pointing at itself from `&self`).
    async fn request_work(
        &self,
        n: usize,
        confirmer: Arc<dyn JobConfirmer>,
        out: Sender<Box<dyn Job>>,
    ) -> Result<(), ProviderError>;

    /// Cooperative poll interval between batches, given the currently
    /// computed target batch size in jobs/sec.
    fn wait_time(&self, target: f64) -> Duration;

    /// Desired jobs-per-second from this source, used by the admission
    /// controller.
    fn target(&self) -> f64;

    /// This provider's name, used to bucket statistics.
    fn name(&self) -> &str;

    /// Release any held resources. Called once at shutdown; providers are
    /// otherwise abandoned when the process exits, never killed mid-batch.
    async fn close(&self) -> Result<(), ProviderError>;
}
