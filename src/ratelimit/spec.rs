//! Rate spec parsing.
//!
//! A rate spec is a compact string such as `"100/d"` (100 requests per day)
//! or `"1000/7d"` (1000 requests per seven days). The unit is one of
//! `s`, `m`, `h`, `d` or the spelled-out word, and defaults to seconds.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Result, ToolsetError};

/// Time window unit for rate limiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeWindow {
    /// Per-second rate limiting
    Second,
    /// Per-minute rate limiting
    Minute,
    /// Per-hour rate limiting
    Hour,
    /// Per-day rate limiting
    Day,
}

impl TimeWindow {
    /// Length of the window in whole seconds.
    pub fn seconds(&self) -> u64 {
        match self {
            TimeWindow::Second => 1,
            TimeWindow::Minute => 60,
            TimeWindow::Hour => 3600,
            TimeWindow::Day => 86400,
        }
    }

    /// Parse a unit suffix, either a single letter or a word.
    pub fn from_suffix(unit: &str) -> Option<Self> {
        let unit = unit.to_ascii_lowercase();
        let unit = unit.strip_suffix('s').filter(|u| u.len() > 1).unwrap_or(unit.as_str());
        match unit {
            "s" | "sec" | "second" => Some(TimeWindow::Second),
            "m" | "min" | "minute" => Some(TimeWindow::Minute),
            "h" | "hour" => Some(TimeWindow::Hour),
            "d" | "day" => Some(TimeWindow::Day),
            _ => None,
        }
    }
}

/// Longest accepted window, one hundred years.
pub const MAX_PERIOD_SECS: u64 = 100 * 365 * 86400;

/// A parsed rate limit: `limit` hits per `multiplier` windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RateSpec {
    limit: u64,
    multiplier: u64,
    window: TimeWindow,
}

impl RateSpec {
    /// Create a rate spec allowing `limit` hits per `multiplier * window`.
    pub fn new(limit: u64, multiplier: u64, window: TimeWindow) -> Result<Self> {
        let too_long = window
            .seconds()
            .checked_mul(multiplier)
            .map_or(true, |period| period > MAX_PERIOD_SECS);
        if limit == 0 || multiplier == 0 || too_long {
            return Err(ToolsetError::InvalidRateSpec(format!(
                "{}/{}{:?}",
                limit, multiplier, window
            )));
        }
        Ok(Self {
            limit,
            multiplier,
            window,
        })
    }

    /// Maximum number of hits allowed inside one window.
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Window unit before the multiplier is applied.
    pub fn window(&self) -> TimeWindow {
        self.window
    }

    /// Window length in seconds.
    pub fn period_secs(&self) -> u64 {
        self.window.seconds() * self.multiplier
    }

    /// Canonical form used in cache keys, e.g. `"100/86400s"`.
    ///
    /// Two specs that describe the same limit share counters.
    pub fn safe_form(&self) -> String {
        format!("{}/{}s", self.limit, self.period_secs())
    }
}

impl FromStr for RateSpec {
    type Err = ToolsetError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || ToolsetError::InvalidRateSpec(s.to_string());

        let (count, rest) = s.trim().split_once('/').ok_or_else(invalid)?;
        if count.is_empty() || !count.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let limit: u64 = count.parse().map_err(|_| invalid())?;

        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        let (multi, unit) = rest.split_at(digits);
        let multiplier = if multi.is_empty() {
            1
        } else {
            multi.parse().map_err(|_| invalid())?
        };
        let window = if unit.is_empty() {
            TimeWindow::Second
        } else {
            TimeWindow::from_suffix(unit).ok_or_else(invalid)?
        };

        RateSpec::new(limit, multiplier, window).map_err(|_| invalid())
    }
}

impl fmt::Display for RateSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match self.window {
            TimeWindow::Second => 's',
            TimeWindow::Minute => 'm',
            TimeWindow::Hour => 'h',
            TimeWindow::Day => 'd',
        };
        if self.multiplier == 1 {
            write!(f, "{}/{}", self.limit, unit)
        } else {
            write!(f, "{}/{}{}", self.limit, self.multiplier, unit)
        }
    }
}

impl Serialize for RateSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RateSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
