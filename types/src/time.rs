//! The time grammar shared by `--since`, `--until`, and log retention.
//!
//! Accepted forms: a relative duration `N[smhd]`, an ISO-8601 absolute
//! timestamp, or the literal `"0"` (retention only, meaning "disabled").

use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimeGrammarError {
    #[error("invalid duration {input:?} (expected N followed by s, m, h, or d)")]
    InvalidDuration { input: String },
    #[error("invalid time {input:?} (expected N[smhd] or an ISO-8601 timestamp)")]
    InvalidTime { input: String },
}

/// Parse a relative duration of the form `N[smhd]`.
pub fn parse_duration(input: &str) -> Result<Duration, TimeGrammarError> {
    let err = || TimeGrammarError::InvalidDuration {
        input: input.to_string(),
    };

    let input = input.trim();
    if input.len() < 2 {
        return Err(err());
    }
    let (digits, unit) = input.split_at(input.len() - 1);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(err());
    }
    let n: u64 = digits.parse().map_err(|_| err())?;
    let secs = match unit {
        "s" => n,
        "m" => n.saturating_mul(60),
        "h" => n.saturating_mul(3600),
        "d" => n.saturating_mul(86_400),
        _ => return Err(err()),
    };
    Ok(Duration::from_secs(secs))
}

/// Resolve a `--since`/`--until` argument to milliseconds since the epoch.
///
/// Relative durations count back from `now_ms`; absolute timestamps are
/// parsed as ISO-8601 (date-only values mean midnight UTC).
pub fn parse_time_spec(input: &str, now_ms: i64) -> Result<i64, TimeGrammarError> {
    let input = input.trim();

    if let Ok(duration) = parse_duration(input) {
        let back = i64::try_from(duration.as_millis()).unwrap_or(i64::MAX);
        return Ok(now_ms.saturating_sub(back));
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(input) {
        return Ok(ts.timestamp_millis());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S") {
        return Ok(Utc.from_utc_datetime(&naive).timestamp_millis());
    }
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        let midnight = date.and_hms_opt(0, 0, 0).expect("midnight is valid");
        return Ok(Utc.from_utc_datetime(&midnight).timestamp_millis());
    }

    Err(TimeGrammarError::InvalidTime {
        input: input.to_string(),
    })
}

/// Log retention policy: a rolling window, or disabled outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retention {
    Disabled,
    Window(Duration),
}

impl Retention {
    /// Parse a retention value: `"0"` disables pruning, otherwise `N[smhd]`.
    pub fn parse(input: &str) -> Result<Self, TimeGrammarError> {
        let input = input.trim();
        if input == "0" {
            return Ok(Self::Disabled);
        }
        parse_duration(input).map(Self::Window)
    }

    /// The cutoff timestamp (ms) below which rows expire, if any.
    #[must_use]
    pub fn cutoff_ms(self, now_ms: i64) -> Option<i64> {
        match self {
            Self::Disabled => None,
            Self::Window(window) => {
                let back = i64::try_from(window.as_millis()).unwrap_or(i64::MAX);
                Some(now_ms.saturating_sub(back))
            }
        }
    }
}

impl Default for Retention {
    /// Thirty days, matching the `logRetention` config default.
    fn default() -> Self {
        Self::Window(Duration::from_secs(30 * 86_400))
    }
}
