//! Per-route rate limit rules.
//!
//! Each tool page carries its own rate spec. A rule applies to every request
//! path that starts with its prefix; when several rules match, the longest
//! prefix wins.

use serde::{Deserialize, Serialize};
use tracing::info;

use super::spec::RateSpec;

/// A rate limit attached to a path prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRule {
    /// Path prefix this rule applies to, e.g. `/mx-lookup/`
    pub path: String,
    /// Allowed hits per window for each subject
    pub rate: RateSpec,
}

/// The set of configured route rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<RouteRule>", into = "Vec<RouteRule>")]
pub struct RouteRules {
    rules: Vec<RouteRule>,
}

impl RouteRules {
    /// Build a rule set, most specific prefixes first.
    pub fn new(mut rules: Vec<RouteRule>) -> Self {
        rules.sort_by(|a, b| b.path.len().cmp(&a.path.len()));
        info!(count = rules.len(), "Loaded route rate limit rules");
        Self { rules }
    }

    /// Find the rate spec governing `path`, if any.
    pub fn find(&self, path: &str) -> Option<&RateSpec> {
        self.rules
            .iter()
            .find(|rule| path.starts_with(&rule.path))
            .map(|rule| &rule.rate)
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether there are no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl From<Vec<RouteRule>> for RouteRules {
    fn from(rules: Vec<RouteRule>) -> Self {
        Self::new(rules)
    }
}

impl From<RouteRules> for Vec<RouteRule> {
    fn from(rules: RouteRules) -> Self {
        rules.rules
    }
}
