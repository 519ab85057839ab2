//! The work parameters a disk worker expects as a job's `params` payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

/// `{execution_time_unix, raw_job}`: when to release the job and the raw
/// bytes to store under the computed key. Produced by anything that wants
/// to schedule a job for later delivery through the disk provider —
/// notably the redis provider's drain-on-memory-pressure path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskParams {
    #[serde(with = "chrono::serde::ts_seconds", rename = "execution_time")]
    pub execution_time: DateTime<Utc>,
    #[serde(rename = "job")]
    pub raw_job: Box<RawValue>,
}

impl DiskParams {
    pub fn new(execution_time: DateTime<Utc>, raw_job: Box<RawValue>) -> Self {
        Self { execution_time, raw_job }
    }
}
