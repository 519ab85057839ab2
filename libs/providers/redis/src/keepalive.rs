//! The background renewal loop that keeps a job's lock alive while it is
//! in flight. One runs per popped/recovered job; `confirm` stops it.

use crate::scripts::ScriptCatalog;
use redis::aio::ConnectionManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};

pub struct Keepalive {
    pub kill: oneshot::Sender<()>,
}

impl Keepalive {
    /// Spawn the renewal loop for `hash`'s lock, extending it back to
    /// `ttl` every `ttl / 2`. Runs until `kill` fires or a renewal fails.
    pub fn spawn(
        conn: Arc<Mutex<ConnectionManager>>,
        scripts: Arc<ScriptCatalog>,
        lock_prefix: String,
        hash: String,
        ttl: u64,
    ) -> Self {
        let (tx, mut rx) = oneshot::channel();
        let interval = Duration::from_secs((ttl / 2).max(1));

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut rx => {
                        tracing::debug!(hash = %hash, "keepalive: job confirmed, stopping renewal");
                        return;
                    }
                    _ = tokio::time::sleep(interval) => {
                        let mut guard = conn.lock().await;
                        let result: redis::RedisResult<i64> = scripts
                            .keep_alive
                            .arg(&hash)
                            .arg(ttl)
                            .arg(&lock_prefix)
                            .invoke_async(&mut *guard)
                            .await;
                        drop(guard);
                        if let Err(e) = result {
                            tracing::warn!(hash = %hash, error = %e, "keepalive: renewal failed");
                            return;
                        }
                    }
                }
            }
        });

        Self { kill: tx }
    }

    pub fn stop(self) {
        let _ = self.kill.send(());
    }
}
