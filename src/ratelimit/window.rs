//! Window identification and cache key derivation.
//!
//! Windows are fixed-length but staggered per subject: each subject's
//! window boundary is offset by a stable hash of its identity, so counters
//! for different clients do not all reset on the same wall-clock second.
//! A window is identified by the Unix timestamp at which it ends.

use sha2::{Digest, Sha256};

use super::spec::{RateSpec, MAX_PERIOD_SECS};

/// Prefix shared by every rate limit counter key.
const KEY_PREFIX: &str = "rl:";

/// Stable 64-bit hash of a subject identity.
pub fn subject_hash(subject: &str) -> u64 {
    let digest = Sha256::digest(subject.as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(head)
}

/// Compute the end of the window containing `now` for `subject`.
///
/// The result is always in `[now, now + period)`. A one-second period is not
/// staggered. Periods longer than [`MAX_PERIOD_SECS`] are clamped to it.
pub fn window_end(subject: &str, period: u64, now: i64) -> i64 {
    if period <= 1 {
        return now;
    }
    let period = period.min(MAX_PERIOD_SECS);
    let offset = (subject_hash(subject) % period) as i64;
    let period = period as i64;
    let end = now - now.rem_euclid(period) + offset;
    if end < now {
        end.saturating_add(period)
    } else {
        end
    }
}

/// Build the counter key for a subject inside a given window.
pub fn cache_key(spec: &RateSpec, subject: &str, window_end: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(spec.safe_form().as_bytes());
    hasher.update(subject.as_bytes());
    hasher.update(window_end.to_string().as_bytes());
    format!("{}{:x}", KEY_PREFIX, hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_end_is_within_one_period() {
        for now in [0_i64, 1, 59, 60, 1_700_000_000, 1_700_000_059] {
            for subject in ["10.0.0.1", "42", "unknown"] {
                let end = window_end(subject, 60, now);
                assert!(end >= now, "end {end} before now {now}");
                assert!(end < now + 60, "end {end} too far from now {now}");
            }
        }
    }

    #[test]
    fn test_window_end_stable_within_window() {
        let subject = "192.168.1.10";
        let start = 1_700_000_000;
        let end = window_end(subject, 3600, start);

        // Every timestamp up to and including the boundary maps to the same window.
        for now in (end - 3599)..=end {
            assert_eq!(window_end(subject, 3600, now), end);
        }
        assert_eq!(window_end(subject, 3600, end + 1), end + 3600);
    }

    #[test]
    fn test_one_second_period_is_not_staggered() {
        assert_eq!(window_end("anyone", 1, 1_700_000_123), 1_700_000_123);
    }

    #[test]
    fn test_subjects_are_staggered() {
        let now = 1_700_000_000;
        let ends: std::collections::HashSet<i64> = (0..32)
            .map(|i| window_end(&format!("10.0.0.{i}"), 86400, now))
            .collect();
        assert!(ends.len() > 1);
    }

    #[test]
    fn test_cache_key_shape() {
        let spec: RateSpec = "100/d".parse().unwrap();
        let key = cache_key(&spec, "10.0.0.1", 1_700_000_000);
        assert!(key.starts_with("rl:"));
        assert_eq!(key.len(), 3 + 64);
    }

    #[test]
    fn test_cache_key_distinguishes_inputs() {
        let spec: RateSpec = "100/d".parse().unwrap();
        let other: RateSpec = "100/h".parse().unwrap();
        let base = cache_key(&spec, "a", 10);

        assert_eq!(base, cache_key(&spec, "a", 10));
        assert_ne!(base, cache_key(&spec, "b", 10));
        assert_ne!(base, cache_key(&spec, "a", 11));
        assert_ne!(base, cache_key(&other, "a", 10));
    }

    #[test]
    fn test_equivalent_specs_share_keys() {
        let a: RateSpec = "5/60".parse().unwrap();
        let b: RateSpec = "5/m".parse().unwrap();
        assert_eq!(cache_key(&a, "x", 1), cache_key(&b, "x", 1));
    }

    #[test]
    fn test_window_end_clamps_huge_period() {
        let end = window_end("10.0.0.1", u64::MAX, 1_700_000_000);
        assert!(end >= 1_700_000_000);
        assert!(end < 1_700_000_000 + MAX_PERIOD_SECS as i64);
    }
}
