//! A job popped from the main bucket, carrying the key it was stored
//! under so confirmation can find it again in the tmp bucket.

use job::{Job, JobConfig, JobConfirmer};
use std::any::Any;
use std::sync::Arc;

pub struct DiskJob {
    config: JobConfig,
    confirmer: Arc<dyn JobConfirmer>,
    /// The original main-bucket key, copied into the tmp bucket at pop
    /// time and needed again to delete it on confirm.
    pub key: Vec<u8>,
}

impl DiskJob {
    pub fn new(config: JobConfig, confirmer: Arc<dyn JobConfirmer>, key: Vec<u8>) -> Self {
        Self { config, confirmer, key }
    }
}

impl Job for DiskJob {
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
