//! Jobs produced by the redis provider.

use job::{Job, JobConfig, JobConfirmer};
use std::any::Any;
use std::sync::Arc;

/// A job popped (or recovered as an orphan) from the redis list, carrying
/// the sha1 hash its tmp/lock keys are derived from.
pub struct RedisJob {
    config: JobConfig,
    confirmer: Arc<dyn JobConfirmer>,
    pub hash: String,
}

impl RedisJob {
    pub fn new(config: JobConfig, confirmer: Arc<dyn JobConfirmer>, hash: String) -> Self {
        Self { config, confirmer, hash }
    }
}

impl Job for RedisJob {
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

/// A job rewritten from the redis list onto local disk during a
/// memory-pressure drain. The drain pops via the same `popAndLock` script
/// as the normal path (tmp entry stashed, lock set), then immediately
/// releases both via `confirm` before handing the decoded job off to the
/// disk worker — so by the time this wraps it, its redis-side durability
/// hold is already gone and the disk bucket it's about to land in is the
/// new one. Its confirmer is a no-op, purely so the manager's
/// unconditional post-execution confirm has something harmless to call.
pub struct DrainedJob {
    config: JobConfig,
    confirmer: Arc<dyn JobConfirmer>,
}

impl DrainedJob {
    pub fn new(config: JobConfig) -> Self {
        Self {
            config,
            confirmer: Arc::new(NoopConfirmer),
        }
    }
}

impl Job for DrainedJob {
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

struct NoopConfirmer;

#[async_trait::async_trait]
impl JobConfirmer for NoopConfirmer {
    async fn confirm_job(&self, _job: &dyn Job) -> Result<(), job::ConfirmError> {
        Ok(())
    }
}
