//! Configuration for the tracking manager and interval parsing.
//!
//! Intervals are written as duration strings (`"10s"`, `"500ms"`, `"1m30s"`)
//! and validated when a manager is constructed. A bad interval is a startup
//! error, never a silently applied default.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid duration {0:?}")]
    InvalidDuration(String),

    #[error("duration {0:?} must be positive")]
    NonPositiveDuration(String),

    #[error("unknown unit {unit:?} in duration {input:?}")]
    UnknownUnit { input: String, unit: String },
}

/// Configuration for the TrackingManager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrackingConfig {
    /// Run the prediction loop at all (default: false)
    pub predict_updates: bool,

    /// Time between prediction ticks (default: "1s")
    pub prediction_interval: String,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            predict_updates: false,
            prediction_interval: "1s".to_string(),
        }
    }
}

impl TrackingConfig {
    /// The validated tick interval.
    pub fn interval(&self) -> Result<Duration, ConfigError> {
        parse_interval(&self.prediction_interval)
    }
}

fn unit_nanos(unit: &str) -> Option<f64> {
    Some(match unit {
        "ns" => 1.0,
        "us" | "µs" | "μs" => 1e3,
        "ms" => 1e6,
        "s" => 1e9,
        "m" => 60e9,
        "h" => 3600e9,
        _ => return None,
    })
}

/// Parses a duration string such as `"300ms"`, `"1.5s"` or `"2h45m"`.
///
/// The result must be strictly positive.
pub fn parse_interval(input: &str) -> Result<Duration, ConfigError> {
    let invalid = || ConfigError::InvalidDuration(input.to_string());
    let s = input.trim();
    if s.is_empty() {
        return Err(invalid());
    }
    if s.starts_with('-') {
        return Err(ConfigError::NonPositiveDuration(input.to_string()));
    }
    let mut rest = s.strip_prefix('+').unwrap_or(s);

    let mut total_nanos = 0.0;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return Err(invalid());
        }
        let value: f64 = rest[..number_len].parse().map_err(|_| invalid())?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit = &rest[..unit_len];
        if unit.is_empty() {
            return Err(invalid());
        }
        let nanos = unit_nanos(unit).ok_or_else(|| ConfigError::UnknownUnit {
            input: input.to_string(),
            unit: unit.to_string(),
        })?;
        rest = &rest[unit_len..];

        total_nanos += value * nanos;
    }

    if !total_nanos.is_finite() || total_nanos > u64::MAX as f64 {
        return Err(invalid());
    }
    let nanos = total_nanos.round() as u64;
    if nanos == 0 {
        return Err(ConfigError::NonPositiveDuration(input.to_string()));
    }
    Ok(Duration::from_nanos(nanos))
}
