//! Core rate limiter implementation.

use std::sync::Arc;
use std::time::Duration;

use axum::http::Extensions;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use super::spec::RateSpec;
use super::store::CounterStore;
use super::window::{cache_key, window_end};
use crate::error::Result;

/// What to do when the counter store cannot be reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreFailurePolicy {
    /// Count the request as the first hit of a fresh window (fail open).
    #[default]
    FirstHit,
    /// Treat the request as over the limit (fail closed).
    Reject,
}

/// Usage of a rate limit for one subject in its current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UsageCount {
    /// Hits recorded in the current window
    pub count: u64,
    /// Hits allowed per window
    pub limit: u64,
    /// Seconds until the window ends
    pub seconds_remaining: u64,
    /// Whether the subject is over the limit
    pub limited: bool,
}

/// Marker recorded on a request once any check found it over the limit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LimitedFlag(pub bool);

/// Fixed-window rate limiter over a shared counter store.
///
/// Cheap to clone; clones share the same store.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    failure_policy: StoreFailurePolicy,
}

impl RateLimiter {
    /// Create a rate limiter with the default failure policy.
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self::with_policy(store, StoreFailurePolicy::default())
    }

    /// Create a rate limiter with an explicit failure policy.
    pub fn with_policy(store: Arc<dyn CounterStore>, failure_policy: StoreFailurePolicy) -> Self {
        Self {
            store,
            failure_policy,
        }
    }

    /// Parse `rate` and check usage for `subject` at the current time.
    pub async fn check_and_increment(
        &self,
        subject: &str,
        rate: &str,
        increment: bool,
    ) -> Result<UsageCount> {
        let spec: RateSpec = rate.parse()?;
        Ok(self.check(subject, &spec, increment).await)
    }

    /// Check usage for `subject` at the current time.
    pub async fn check(&self, subject: &str, spec: &RateSpec, increment: bool) -> UsageCount {
        self.check_at(subject, spec, increment, chrono::Utc::now().timestamp())
            .await
    }

    /// Check usage for `subject` as of the Unix timestamp `now`.
    ///
    /// When `increment` is set the hit is recorded; otherwise the current
    /// count is only read.
    pub async fn check_at(
        &self,
        subject: &str,
        spec: &RateSpec,
        increment: bool,
        now: i64,
    ) -> UsageCount {
        let period = spec.period_secs();
        let end = window_end(subject, period, now);
        let key = cache_key(spec, subject, end);
        let initial = u64::from(increment);

        trace!(
            subject = %subject,
            rate = %spec,
            window_end = end,
            increment,
            "Checking rate limit"
        );

        let (count, forced_limit) = match self.count(&key, initial, increment, period).await {
            Ok(count) => (count, false),
            Err(e) => match self.failure_policy {
                StoreFailurePolicy::FirstHit => {
                    warn!(
                        subject = %subject,
                        error = %e,
                        "Counter store failed, treating request as first hit"
                    );
                    (initial, false)
                }
                StoreFailurePolicy::Reject => {
                    warn!(
                        subject = %subject,
                        error = %e,
                        "Counter store failed, rejecting request"
                    );
                    (initial, true)
                }
            },
        };

        let limited = forced_limit || count > spec.limit();
        if limited {
            debug!(subject = %subject, rate = %spec, count, "Rate limit exceeded");
        }

        UsageCount {
            count,
            limit: spec.limit(),
            seconds_remaining: end.saturating_sub(now).max(0) as u64,
            limited,
        }
    }

    /// Check a rate limit on behalf of a request and remember the outcome.
    ///
    /// Once a request has been found over a limit by an incrementing check,
    /// a [`LimitedFlag`] stays set in its extensions; later checks never
    /// clear it. Returns `None` when no rate applies to the request.
    pub async fn check_request(
        &self,
        extensions: &mut Extensions,
        subject: &str,
        spec: Option<&RateSpec>,
        increment: bool,
    ) -> Option<UsageCount> {
        let old_limited = extensions
            .get::<LimitedFlag>()
            .copied()
            .unwrap_or_default()
            .0;

        let Some(spec) = spec else {
            extensions.insert(LimitedFlag(old_limited));
            return None;
        };

        let usage = self.check(subject, spec, increment).await;
        if increment {
            extensions.insert(LimitedFlag(old_limited || usage.limited));
        }
        Some(usage)
    }

    /// Whether this check finds the subject over `spec`.
    ///
    /// See [`RateLimiter::check_request`] for how the outcome is recorded.
    /// A request with no rate configured is never limited.
    pub async fn is_rate_limited(
        &self,
        extensions: &mut Extensions,
        subject: &str,
        spec: Option<&RateSpec>,
        increment: bool,
    ) -> bool {
        self.check_request(extensions, subject, spec, increment)
            .await
            .is_some_and(|usage| usage.limited)
    }

    async fn count(&self, key: &str, initial: u64, increment: bool, period: u64) -> Result<u64> {
        let ttl = Duration::from_secs(period);
        if self.store.add(key, initial, ttl).await? {
            return Ok(initial);
        }
        if increment {
            // The key can expire between the add and the increment.
            Ok(self.store.incr(key, 1).await?.unwrap_or(initial))
        } else {
            Ok(self.store.get(key).await?.unwrap_or(initial))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ToolsetError;
    use crate::ratelimit::MemoryCounterStore;
    use async_trait::async_trait;

    const NOW: i64 = 1_700_000_000;

    struct BrokenStore;

    #[async_trait]
    impl CounterStore for BrokenStore {
        async fn add(&self, _key: &str, _value: u64, _ttl: Duration) -> Result<bool> {
            Err(ToolsetError::StoreUnavailable("connection refused".to_string()))
        }

        async fn incr(&self, _key: &str, _delta: u64) -> Result<Option<u64>> {
            Err(ToolsetError::StoreUnavailable("connection refused".to_string()))
        }

        async fn get(&self, _key: &str) -> Result<Option<u64>> {
            Err(ToolsetError::StoreUnavailable("connection refused".to_string()))
        }
    }

    fn limiter() -> RateLimiter {
        RateLimiter::new(Arc::new(MemoryCounterStore::new()))
    }

    fn spec(raw: &str) -> RateSpec {
        raw.parse().unwrap()
    }

    #[tokio::test]
    async fn test_nth_request_allowed_next_rejected() {
        let limiter = limiter();
        let spec = spec("5/m");

        for i in 1..=5 {
            let usage = limiter.check_at("10.0.0.1", &spec, true, NOW).await;
            assert_eq!(usage.count, i);
            assert!(!usage.limited, "request {i} should be allowed");
        }

        let usage = limiter.check_at("10.0.0.1", &spec, true, NOW).await;
        assert_eq!(usage.count, 6);
        assert_eq!(usage.limit, 5);
        assert!(usage.limited);
    }

    #[tokio::test]
    async fn test_read_only_check_does_not_count() {
        let limiter = limiter();
        let spec = spec("2/h");

        let usage = limiter.check_at("subject", &spec, false, NOW).await;
        assert_eq!(usage.count, 0);

        limiter.check_at("subject", &spec, true, NOW).await;
        let usage = limiter.check_at("subject", &spec, false, NOW).await;
        assert_eq!(usage.count, 1);
        assert!(!usage.limited);
    }

    #[tokio::test]
    async fn test_subjects_have_independent_counters() {
        let limiter = limiter();
        let spec = spec("1/d");

        assert!(!limiter.check_at("a", &spec, true, NOW).await.limited);
        assert!(limiter.check_at("a", &spec, true, NOW).await.limited);
        assert!(!limiter.check_at("b", &spec, true, NOW).await.limited);
    }

    #[tokio::test]
    async fn test_next_window_starts_fresh() {
        let limiter = limiter();
        let spec = spec("1/m");

        let first = limiter.check_at("a", &spec, true, NOW).await;
        assert!(limiter.check_at("a", &spec, true, NOW).await.limited);

        let later = NOW + first.seconds_remaining as i64 + 1;
        let usage = limiter.check_at("a", &spec, true, later).await;
        assert_eq!(usage.count, 1);
        assert!(!usage.limited);
    }

    #[tokio::test]
    async fn test_seconds_remaining_within_period() {
        let limiter = limiter();
        let usage = limiter.check_at("a", &spec("10/h"), true, NOW).await;
        assert!(usage.seconds_remaining < 3600);
    }

    #[tokio::test]
    async fn test_invalid_rate_is_reported() {
        let err = limiter()
            .check_and_increment("a", "ten per day", true)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolsetError::InvalidRateSpec(_)));

        let err = limiter()
            .check_and_increment("a", "1/200000000000000d", true)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolsetError::InvalidRateSpec(_)));
    }

    #[tokio::test]
    async fn test_longest_period_is_counted() {
        let limiter = limiter();
        let spec = spec("1/36500d");

        let usage = limiter.check_at("a", &spec, true, NOW).await;
        assert_eq!(usage.count, 1);
        assert!(usage.seconds_remaining < spec.period_secs());
        assert!(limiter.check_at("a", &spec, true, NOW).await.limited);
    }

    #[tokio::test]
    async fn test_store_failure_first_hit_policy() {
        let limiter = RateLimiter::new(Arc::new(BrokenStore));
        let usage = limiter.check_at("a", &spec("1/m"), true, NOW).await;
        assert_eq!(usage.count, 1);
        assert!(!usage.limited);
    }

    #[tokio::test]
    async fn test_store_failure_reject_policy() {
        let limiter = RateLimiter::with_policy(Arc::new(BrokenStore), StoreFailurePolicy::Reject);
        let usage = limiter.check_at("a", &spec("100/m"), true, NOW).await;
        assert!(usage.limited);
    }

    #[tokio::test]
    async fn test_limited_flag_is_sticky() {
        let limiter = limiter();
        let spec = spec("1/d");
        let mut extensions = Extensions::new();

        assert!(!limiter.is_rate_limited(&mut extensions, "a", Some(&spec), true).await);
        assert!(limiter.is_rate_limited(&mut extensions, "a", Some(&spec), true).await);
        assert_eq!(extensions.get::<LimitedFlag>(), Some(&LimitedFlag(true)));

        // A later read-only check against a looser rate keeps the flag set.
        let loose: RateSpec = "100/d".parse().unwrap();
        assert!(!limiter.is_rate_limited(&mut extensions, "a", Some(&loose), false).await);
        assert_eq!(extensions.get::<LimitedFlag>(), Some(&LimitedFlag(true)));

        // So does a check with no rate at all.
        assert!(!limiter.is_rate_limited(&mut extensions, "a", None, true).await);
        assert_eq!(extensions.get::<LimitedFlag>(), Some(&LimitedFlag(true)));
    }

    #[tokio::test]
    async fn test_no_rate_records_unlimited_flag() {
        let mut extensions = Extensions::new();
        assert!(!limiter().is_rate_limited(&mut extensions, "a", None, true).await);
        assert_eq!(extensions.get::<LimitedFlag>(), Some(&LimitedFlag(false)));
    }
}
