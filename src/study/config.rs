//! Scheduler configuration
//!
//! Loaded once from a TOML file and passed into the service by value:
//!
//! ```toml
//! default_retention = 0.9
//! max_interval_days = 365
//! enable_fuzz = true
//! learning_steps = "1m,10m"
//! relearning_steps = "10m"
//! undo_window_minutes = 10
//! ```

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use chrono::Duration;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use super::fsrs::{validate_weights, Weights, DEFAULT_WEIGHTS, MAX_INTERVAL_DAYS};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// An ordered sequence of sub-day step durations, written as `"1m,10m"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepSequence(Vec<Duration>);

impl StepSequence {
    pub fn new(steps: Vec<Duration>) -> Self {
        Self(steps)
    }

    pub fn steps(&self) -> &[Duration] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn parse_duration(raw: &str) -> Result<Duration, String> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| format!("missing unit in step {:?}", raw))?;
    let (digits, unit) = raw.split_at(split);
    let value: i64 = digits
        .parse()
        .map_err(|_| format!("invalid number in step {:?}", raw))?;
    let duration = match unit {
        "s" => Duration::seconds(value),
        "m" => Duration::minutes(value),
        "h" => Duration::hours(value),
        "d" => Duration::days(value),
        other => return Err(format!("unknown unit {:?} in step {:?}", other, raw)),
    };
    if duration <= Duration::zero() {
        return Err(format!("step {:?} must be positive", raw));
    }
    Ok(duration)
}

fn format_duration(d: &Duration) -> String {
    let secs = d.num_seconds();
    if secs % 86_400 == 0 {
        format!("{}d", secs / 86_400)
    } else if secs % 3_600 == 0 {
        format!("{}h", secs / 3_600)
    } else if secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}

impl FromStr for StepSequence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let steps = s
            .split(',')
            .filter(|part| !part.trim().is_empty())
            .map(parse_duration)
            .collect::<Result<Vec<_>, _>>()?;
        if steps.is_empty() {
            return Err("at least one step is required".to_string());
        }
        Ok(Self(steps))
    }
}

impl fmt::Display for StepSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(format_duration).collect();
        f.write_str(&parts.join(","))
    }
}

impl Serialize for StepSequence {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for StepSequence {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Spaced-repetition parameters shared by every user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SrsConfig {
    pub weights: Weights,
    /// Used when a user's own retention setting is out of range
    pub default_retention: f64,
    /// Global ceiling; the effective maximum is min(global, user)
    pub max_interval_days: u32,
    pub enable_fuzz: bool,
    pub learning_steps: StepSequence,
    pub relearning_steps: StepSequence,
    /// Default for users without stored settings
    pub new_cards_per_day: u32,
    /// Default for users without stored settings; never enforced
    pub reviews_per_day: u32,
    pub undo_window_minutes: u32,
    pub default_queue_limit: u32,
    pub max_queue_limit: u32,
    pub max_batch_size: usize,
}

impl Default for SrsConfig {
    fn default() -> Self {
        Self {
            weights: DEFAULT_WEIGHTS,
            default_retention: 0.9,
            max_interval_days: 365,
            enable_fuzz: true,
            learning_steps: StepSequence::new(vec![Duration::minutes(1), Duration::minutes(10)]),
            relearning_steps: StepSequence::new(vec![Duration::minutes(10)]),
            new_cards_per_day: 20,
            reviews_per_day: 200,
            undo_window_minutes: 10,
            default_queue_limit: 50,
            max_queue_limit: 200,
            max_batch_size: 100,
        }
    }
}

impl SrsConfig {
    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        log::info!("Loaded SRS config from {:?}", path);
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.default_retention > 0.0 && self.default_retention < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "default_retention must be in (0, 1), got {}",
                self.default_retention
            )));
        }
        if self.max_interval_days == 0 || self.max_interval_days > MAX_INTERVAL_DAYS {
            return Err(ConfigError::Invalid(format!(
                "max_interval_days must be in 1..={}, got {}",
                MAX_INTERVAL_DAYS, self.max_interval_days
            )));
        }
        if self.learning_steps.is_empty() {
            return Err(ConfigError::Invalid("learning_steps must not be empty".to_string()));
        }
        if self.relearning_steps.is_empty() {
            return Err(ConfigError::Invalid(
                "relearning_steps must not be empty".to_string(),
            ));
        }
        if self.default_queue_limit == 0 || self.default_queue_limit > self.max_queue_limit {
            return Err(ConfigError::Invalid(format!(
                "default_queue_limit must be in 1..={}",
                self.max_queue_limit
            )));
        }
        if self.max_batch_size == 0 {
            return Err(ConfigError::Invalid("max_batch_size must be at least 1".to_string()));
        }
        validate_weights(&self.weights).map_err(ConfigError::Invalid)?;
        Ok(())
    }

    pub fn undo_window(&self) -> Duration {
        Duration::minutes(i64::from(self.undo_window_minutes))
    }
}
