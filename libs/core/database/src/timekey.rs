//! Lexicographically-orderable timestamped keys for the disk bucket pair.
//!
//! Keys are `RFC3339(execution_time) "#" suffix`. Because every encoded
//! timestamp has identical width, byte-order on the whole key equals
//! chronological order on the timestamp prefix, which is what lets the
//! disk provider treat a `sled::Tree` scan as a priority queue.

use chrono::{DateTime, Utc};

const SEPARATOR: u8 = b'#';

/// Build a key for `execution_time`, disambiguated by `suffix` (typically a
/// hex-encoded hash) when two jobs share the same timestamp.
pub fn encode(execution_time: DateTime<Utc>, suffix: &str) -> Vec<u8> {
    let mut key = execution_time.to_rfc3339_opts(chrono::SecondsFormat::Nanos, true).into_bytes();
    key.push(SEPARATOR);
    key.extend_from_slice(suffix.as_bytes());
    key
}

/// Split a key back into its timestamp prefix and suffix, as stored.
pub fn split(key: &[u8]) -> Option<(&[u8], &[u8])> {
    let idx = key.iter().position(|&b| b == SEPARATOR)?;
    Some((&key[..idx], &key[idx + 1..]))
}

/// Encode `at` the same way [`encode`] does, for use as a scan bound (the
/// timestamp prefix alone, with no suffix, sorts before any real key at
/// that same instant since `#` (0x23) is lower than every RFC3339 digit
/// that could follow it in a longer key, but higher than nothing — a bare
/// prefix with no separator sorts strictly before any key with a `#`).
pub fn prefix_bound(at: DateTime<Utc>) -> Vec<u8> {
    at.to_rfc3339_opts(chrono::SecondsFormat::Nanos, true).into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn ordering_matches_temporal_order() {
        let t1 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 10).unwrap();
        let k1 = encode(t1, "aaa");
        let k2 = encode(t2, "aaa");
        assert!(k1 < k2);
    }

    #[test]
    fn equal_timestamps_order_by_suffix() {
        let t = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let k1 = encode(t, "aaa");
        let k2 = encode(t, "bbb");
        assert!(k1 < k2);
    }

    #[test]
    fn split_round_trips() {
        let t = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let key = encode(t, "deadbeef");
        let (ts, suffix) = split(&key).unwrap();
        assert_eq!(suffix, b"deadbeef");
        assert_eq!(ts, prefix_bound(t).as_slice());
    }

    #[test]
    fn prefix_bound_sorts_before_any_key_at_that_instant() {
        let t = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let bound = prefix_bound(t);
        let key = encode(t, "aaa");
        assert!(bound < key);
    }
}
