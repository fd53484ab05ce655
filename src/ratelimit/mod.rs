//! Rate limiting logic and state management.

mod limiter;
mod redis;
mod rules;
mod spec;
mod store;
mod window;

pub use self::redis::RedisCounterStore;
pub use limiter::{LimitedFlag, RateLimiter, StoreFailurePolicy, UsageCount};
pub use rules::{RouteRule, RouteRules};
pub use spec::{RateSpec, TimeWindow, MAX_PERIOD_SECS};
pub use store::{CounterStore, MemoryCounterStore};
pub use window::{cache_key, subject_hash, window_end};
