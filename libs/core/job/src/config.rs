//! The immutable job descriptor.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

/// An immutable descriptor of work to perform.
///
/// `params` is kept as a raw, unparsed JSON value so any provider can
/// re-serialize a job without information loss, and so type-specific
/// decoding happens only inside the worker that understands the type tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// Human-readable name, not used for dispatch.
    pub name: String,

    /// Type tag used to route this job to a worker pool. Matched against
    /// the lowercase name workers register under.
    #[serde(rename = "type")]
    pub job_type: String,

    /// Opaque, type-specific parameters. Preserved verbatim.
    pub params: Box<RawValue>,

    /// Remaining retry budget. Decremented on each failed attempt; a job
    /// that fails with budget already at 0 goes straight to the failure
    /// handlers (if any) and is confirmed.
    #[serde(default)]
    pub retries: u32,

    /// Whether the worker should capture and report output (CLI/HTTP-egress
    /// workers only; irrelevant to the redis/disk providers).
    #[serde(default)]
    pub capture_output: bool,

    /// Where captured output is written, when `capture_output` is set. A
    /// sink identifier rather than an open handle, since `JobConfig` must
    /// stay `Serialize`/`Deserialize` and re-enqueueable as raw bytes.
    #[serde(default)]
    pub output_sink: Option<String>,
}

impl JobConfig {
    /// A job descriptor with one retry remaining disabled.
    pub fn new(name: impl Into<String>, job_type: impl Into<String>, params: Box<RawValue>) -> Self {
        Self {
            name: name.into(),
            job_type: job_type.into(),
            params,
            retries: 0,
            capture_output: false,
            output_sink: None,
        }
    }

    /// Decrement the retry budget by one, saturating at zero.
    pub fn decrement_retries(&mut self) {
        self.retries = self.retries.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let raw = RawValue::from_string(r#"{"command":"/bin/true"}"#.to_string()).unwrap();
        let conf = JobConfig::new("x", "cli", raw);
        let encoded = serde_json::to_string(&conf).unwrap();
        let decoded: JobConfig = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.name, "x");
        assert_eq!(decoded.job_type, "cli");
        assert_eq!(decoded.params.get(), r#"{"command":"/bin/true"}"#);
    }

    #[test]
    fn decrement_saturates_at_zero() {
        let raw = RawValue::from_string("{}".to_string()).unwrap();
        let mut conf = JobConfig::new("x", "cli", raw);
        conf.retries = 0;
        conf.decrement_retries();
        assert_eq!(conf.retries, 0);
    }
}
