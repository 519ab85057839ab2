//! Core data model shared by the manager and every provider/worker plugin:
//! the job descriptor, its mutable per-attempt stats, and the traits a
//! plugin implements to participate in the pipeline.

pub mod config;
pub mod configer;
pub mod error;
pub mod job;
pub mod provider;
pub mod stats;
pub mod worker;

pub use config::JobConfig;
pub use configer::{ConfigField, Configer};
pub use error::{ConfigureError, ConfirmError, ProviderError, WorkerError};
pub use job::{Job, JobConfirmer, ProviderConfirmer, SimpleJob};
pub use provider::Provider;
pub use stats::{JobStats, JobStatus};
pub use worker::Worker;
