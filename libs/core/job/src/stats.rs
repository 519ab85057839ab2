//! Per-attempt timing and status, mutable across a job's lifetime.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The lifecycle status of one attempt at a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    New,
    Started,
    Success,
    Failure,
    Retry,
}

/// Start/end timestamps, retry counter, and current status for one
/// attempt. Created when a worker accepts a job; finalized when it
/// returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStats {
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub retry_count: u32,
    pub status: JobStatus,
}

impl JobStats {
    /// Start a new stats record for a job about to be handed to a worker.
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            ended_at: None,
            retry_count: 0,
            status: JobStatus::New,
        }
    }

    pub fn mark_started(&mut self) {
        self.status = JobStatus::Started;
    }

    /// Finalize the record with a terminal or retry status.
    pub fn end(&mut self, status: JobStatus) {
        self.ended_at = Some(Utc::now());
        self.status = status;
    }

    /// Wall-clock duration of the attempt, once ended.
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.ended_at.map(|end| end - self.started_at)
    }
}

impl Default for JobStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_stats_start_in_new_status() {
        let stats = JobStats::new();
        assert_eq!(stats.status, JobStatus::New);
        assert!(stats.ended_at.is_none());
    }

    #[test]
    fn end_sets_terminal_status_and_timestamp() {
        let mut stats = JobStats::new();
        stats.mark_started();
        stats.end(JobStatus::Success);
        assert_eq!(stats.status, JobStatus::Success);
        assert!(stats.ended_at.is_some());
        assert!(stats.duration().is_some());
    }
}
