//! Manager pipeline metrics: job outcomes, durations, and ready-pool depth.

use metrics::{counter, gauge, histogram};

/// Job pipeline metrics recorder.
pub struct JobMetrics;

impl JobMetrics {
    /// Record one completed attempt (success, failure, or retry).
    pub fn record_job(job_type: &str, provider: &str, status: &str) {
        counter!(
            "manager_jobs_total",
            "job_type" => job_type.to_string(),
            "provider" => provider.to_string(),
            "status" => status.to_string()
        )
        .increment(1);
    }

    /// Record a completed attempt's duration.
    pub fn record_duration(job_type: &str, provider: &str, duration_secs: f64) {
        histogram!(
            "manager_job_duration_seconds",
            "job_type" => job_type.to_string(),
            "provider" => provider.to_string()
        )
        .record(duration_secs);
    }

    /// Set a ready pool's current depth (checked-in, idle workers).
    pub fn set_ready_pool_depth(job_type: &str, depth: usize) {
        gauge!("manager_ready_pool_depth", "job_type" => job_type.to_string()).set(depth as f64);
    }
}
