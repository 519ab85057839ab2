//! Rolling counters feeding the admission controller and the stats HTTP
//! surface. Mirrors `original_source/manager/managerStats.go`'s
//! `Counter`/`DurationCounter`/`ManagerStats` split, with atomics standing
//! in for the Go version's mutex-guarded `uint64`s.

use chrono::{DateTime, Utc};
use job::JobStats;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// An atomically-incremented count.
#[derive(Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn val(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    pub fn set(&self, v: u64) {
        self.0.store(v, Ordering::SeqCst);
    }
}

/// A running total of durations plus how many were added, so an average
/// can be produced without a second pass.
#[derive(Default)]
struct DurationAccumulator {
    total: Duration,
    count: u64,
}

impl DurationAccumulator {
    fn add(&mut self, d: Duration) {
        self.total += d;
        self.count += 1;
    }

    /// Cumulative duration divided by job count, count floored at one.
    /// Used the same way for both the by-type and by-provider breakdowns,
    /// in place of the upstream Go `AverageDurationByProvider`'s
    /// divide-by-a-rate formula.
    fn avg(&self) -> Duration {
        self.total / (self.count.max(1) as u32)
    }
}

/// Per-bucket job count, cumulative duration, and the snapshot state
/// `jobs_per_second_*` needs to compute a rate since it was last queried.
#[derive(Default)]
struct Bucket {
    count: u64,
    duration: DurationAccumulator,
    last_count: u64,
    last_checked_at: Option<DateTime<Utc>>,
}

impl Bucket {
    fn record(&mut self, duration: Duration) {
        self.count += 1;
        self.duration.add(duration);
    }

    /// Jobs added since the last call to this method, divided by the
    /// elapsed wall-clock time, snapshotting state as a side effect.
    fn jobs_per_second_since_last_query(&mut self, now: DateTime<Utc>) -> f64 {
        let since = self.last_checked_at.unwrap_or(now);
        let elapsed = (now - since).num_milliseconds().max(1) as f64 / 1000.0;
        let delta = self.count.saturating_sub(self.last_count);
        self.last_count = self.count;
        self.last_checked_at = Some(now);
        delta as f64 / elapsed
    }
}

/// One channel's capacity and current depth, for the stats report's
/// channel occupancy section.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct ChannelStats {
    pub capacity: usize,
    pub queue: usize,
}

/// JSON shape served at `GET /manager/stats`. Field names match
/// `original_source/manager/managerStats.go`'s `ManagerStatsReport` tags.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ManagerStatsReport {
    pub uptime: u64,
    #[serde(rename = "job_per_second_cumulative")]
    pub jobs_per_second: f64,
    #[serde(rename = "job_per_second_by_type")]
    pub jobs_per_second_by_type: HashMap<String, f64>,
    #[serde(rename = "job_persecond_by_provider")]
    pub jobs_per_second_by_provider: HashMap<String, f64>,
    #[serde(rename = "total_job")]
    pub total_jobs: u64,
    #[serde(rename = "total_job_by_type")]
    pub total_jobs_by_type: HashMap<String, u64>,
    #[serde(rename = "total_job_by_provider")]
    pub total_jobs_by_provider: HashMap<String, u64>,
    pub total_average: f64,
    pub total_average_by_type: HashMap<String, f64>,
    pub total_average_by_provider: HashMap<String, f64>,
    pub channel_stats: HashMap<String, ChannelStats>,
    #[serde(with = "duration_millis")]
    pub average_duration: Duration,
    #[serde(with = "duration_millis_map")]
    pub average_duration_by_type: HashMap<String, Duration>,
    #[serde(with = "duration_millis_map")]
    pub average_duration_by_provider: HashMap<String, Duration>,
    #[serde(with = "duration_millis_map")]
    pub total_duration_by_type: HashMap<String, Duration>,
    #[serde(with = "duration_millis_map")]
    pub total_duration_by_provider: HashMap<String, Duration>,
}

mod duration_millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_i64(d.as_millis() as i64)
    }
}

mod duration_millis_map {
    use serde::{Serialize, Serializer};
    use std::collections::HashMap;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(m: &HashMap<String, Duration>, s: S) -> Result<S::Ok, S::Error> {
        let as_millis: HashMap<&String, i64> = m.iter().map(|(k, v)| (k, v.as_millis() as i64)).collect();
        as_millis.serialize(s)
    }
}

/// Rolling statistics for one manager instance. Bucketed totals are
/// guarded individually so a slow reader of one bucket never blocks
/// writers to another.
pub struct ManagerStats {
    start_time: DateTime<Utc>,
    total: Mutex<Bucket>,
    by_type: Mutex<HashMap<String, Bucket>>,
    by_provider: Mutex<HashMap<String, Bucket>>,
}

impl ManagerStats {
    pub fn new() -> Self {
        Self {
            start_time: Utc::now(),
            total: Mutex::new(Bucket::default()),
            by_type: Mutex::new(HashMap::new()),
            by_provider: Mutex::new(HashMap::new()),
        }
    }

    /// Record one completed attempt (success, failure, or retry) against
    /// the total, its job type, and its originating provider, and mirror
    /// it to the Prometheus recorder.
    pub fn consume(&self, job_type: &str, provider: &str, stats: &JobStats) {
        let duration = stats.duration().and_then(|d| d.to_std().ok()).unwrap_or_default();

        self.total.lock().unwrap().record(duration);
        self.by_type.lock().unwrap().entry(job_type.to_string()).or_default().record(duration);
        self.by_provider.lock().unwrap().entry(provider.to_string()).or_default().record(duration);

        let status = match stats.status {
            job::JobStatus::Success => "success",
            job::JobStatus::Failure => "failure",
            job::JobStatus::Retry => "retry",
            job::JobStatus::New | job::JobStatus::Started => "in_progress",
        };
        observability::JobMetrics::record_job(job_type, provider, status);
        observability::JobMetrics::record_duration(job_type, provider, duration.as_secs_f64());
    }

    pub fn uptime(&self) -> Duration {
        (Utc::now() - self.start_time).to_std().unwrap_or_default()
    }

    pub fn total_jobs(&self) -> u64 {
        self.total.lock().unwrap().count
    }

    /// Average per-job duration for `provider`, the only statistic the
    /// admission controller reads. Special-cases a provider with no
    /// completions yet to one millisecond rather than zero, so
    /// `capacity_by_provider`'s `1s / average` division stays finite
    /// before any job of this provider's has finished.
    pub fn average_duration_by_provider(&self, provider: &str) -> Duration {
        let by_provider = self.by_provider.lock().unwrap();
        match by_provider.get(provider) {
            Some(bucket) if bucket.count > 0 => bucket.duration.avg(),
            _ => Duration::from_millis(1),
        }
    }

    fn total_average(&self) -> f64 {
        let secs = self.uptime().as_secs_f64().max(1.0 / 1000.0);
        self.total_jobs() as f64 / secs
    }

    fn average_by<'a>(map: &'a HashMap<String, Bucket>, uptime_secs: f64) -> HashMap<String, f64> {
        map.iter().map(|(k, b)| (k.clone(), b.count as f64 / uptime_secs)).collect()
    }

    /// Build the full JSON report, folding in channel occupancy the
    /// manager supplies since stats has no visibility into the pipeline's
    /// channels itself.
    pub fn report(&self, channels: HashMap<String, ChannelStats>) -> ManagerStatsReport {
        let now = Utc::now();
        let uptime_secs = self.uptime().as_secs_f64().max(1.0 / 1000.0);

        let mut total = self.total.lock().unwrap();
        let jobs_per_second = total.jobs_per_second_since_last_query(now);
        let total_jobs = total.count;
        let average_duration = total.duration.avg();
        drop(total);

        let mut by_type = self.by_type.lock().unwrap();
        let jobs_per_second_by_type = by_type.iter_mut().map(|(k, b)| (k.clone(), b.jobs_per_second_since_last_query(now))).collect();
        let total_jobs_by_type = by_type.iter().map(|(k, b)| (k.clone(), b.count)).collect();
        let average_duration_by_type = by_type.iter().map(|(k, b)| (k.clone(), b.duration.avg())).collect();
        let total_duration_by_type = by_type.iter().map(|(k, b)| (k.clone(), b.duration.total)).collect();
        let total_average_by_type = Self::average_by(&by_type, uptime_secs);
        drop(by_type);

        let mut by_provider = self.by_provider.lock().unwrap();
        let jobs_per_second_by_provider = by_provider.iter_mut().map(|(k, b)| (k.clone(), b.jobs_per_second_since_last_query(now))).collect();
        let total_jobs_by_provider = by_provider.iter().map(|(k, b)| (k.clone(), b.count)).collect();
        let average_duration_by_provider = by_provider.iter().map(|(k, b)| (k.clone(), b.duration.avg())).collect();
        let total_duration_by_provider = by_provider.iter().map(|(k, b)| (k.clone(), b.duration.total)).collect();
        let total_average_by_provider = Self::average_by(&by_provider, uptime_secs);
        drop(by_provider);

        ManagerStatsReport {
            uptime: self.uptime().as_secs(),
            jobs_per_second,
            jobs_per_second_by_type,
            jobs_per_second_by_provider,
            total_jobs,
            total_jobs_by_type,
            total_jobs_by_provider,
            total_average: self.total_average(),
            total_average_by_type,
            total_average_by_provider,
            channel_stats: channels,
            average_duration,
            average_duration_by_type,
            average_duration_by_provider,
            total_duration_by_type,
            total_duration_by_provider,
        }
    }
}

impl Default for ManagerStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use job::JobStatus;
    use std::thread::sleep;

    fn finished_stats() -> JobStats {
        let mut stats = JobStats::new();
        sleep(Duration::from_millis(5));
        stats.end(JobStatus::Success);
        stats
    }

    #[test]
    fn consume_updates_total_and_buckets() {
        let stats = ManagerStats::new();
        stats.consume("cli", "redis_jobs", &finished_stats());
        stats.consume("cli", "redis_jobs", &finished_stats());

        assert_eq!(stats.total_jobs(), 2);
        let report = stats.report(HashMap::new());
        assert_eq!(report.total_jobs_by_type.get("cli"), Some(&2));
        assert_eq!(report.total_jobs_by_provider.get("redis_jobs"), Some(&2));
    }

    #[test]
    fn average_duration_is_cumulative_over_count() {
        let stats = ManagerStats::new();
        stats.consume("cli", "redis_jobs", &finished_stats());
        stats.consume("cli", "redis_jobs", &finished_stats());
        let report = stats.report(HashMap::new());
        assert!(report.average_duration.as_millis() > 0);
        assert_eq!(report.average_duration, report.average_duration_by_type["cli"]);
    }

    #[test]
    fn average_duration_by_provider_is_positive_before_any_completion() {
        let stats = ManagerStats::new();
        assert!(stats.average_duration_by_provider("redis_jobs") > Duration::ZERO);
    }

    #[test]
    fn average_duration_by_provider_reflects_completions() {
        let stats = ManagerStats::new();
        stats.consume("cli", "redis_jobs", &finished_stats());
        assert!(stats.average_duration_by_provider("redis_jobs") > Duration::ZERO);
    }

    #[test]
    fn empty_stats_report_has_zeroed_totals() {
        let stats = ManagerStats::new();
        let report = stats.report(HashMap::new());
        assert_eq!(report.total_jobs, 0);
        assert_eq!(report.average_duration, Duration::ZERO);
    }
}
