//! Settings loading for space usage caches.
//!
//! Settings live in a small YAML file:
//!
//! ```yaml
//! interval: 10m
//! jitter: 1m
//! cache_file: /data/vol1/current/dfsUsed
//! max_record_age: 10m
//! ```
//!
//! Durations accept `ms`, `s`, `m`, `h` and `d` suffixes. Bare numbers are
//! milliseconds.

use anyhow::{anyhow, Result as AnyResult};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, SpaceCacheError};

/// Refresh and persistence settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    /// Time between background refreshes. Zero disables them.
    pub interval: Duration,
    /// Bound on the random offset applied to each interval.
    pub jitter: Duration,
    /// Where to persist measurements, if anywhere.
    pub cache_file: Option<PathBuf>,
    /// Oldest persisted record accepted as a seed value.
    pub max_record_age: Option<Duration>,
}

impl CacheSettings {
    /// Default refresh interval.
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10 * 60);

    /// Default jitter bound.
    pub const DEFAULT_JITTER: Duration = Duration::from_secs(60);

    /// Load settings from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content).map_err(|err| match err {
            SpaceCacheError::ConfigParseError { message, .. } => SpaceCacheError::ConfigParseError {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })
    }

    /// Parse settings from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let raw: RawSettings =
            serde_yaml::from_str(content).map_err(|e| SpaceCacheError::ConfigParseError {
                path: PathBuf::from("<inline>"),
                message: e.to_string(),
            })?;
        raw.resolve()
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            interval: Self::DEFAULT_INTERVAL,
            jitter: Self::DEFAULT_JITTER,
            cache_file: None,
            max_record_age: None,
        }
    }
}

/// Settings as written in the file, before validation.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawSettings {
    interval: Option<DurationValue>,
    jitter: Option<DurationValue>,
    cache_file: Option<PathBuf>,
    max_record_age: Option<DurationValue>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DurationValue {
    Millis(u64),
    Text(String),
}

impl DurationValue {
    fn resolve(&self, field: &str) -> Result<Duration> {
        match self {
            DurationValue::Millis(ms) => Ok(Duration::from_millis(*ms)),
            DurationValue::Text(text) => {
                parse_duration(text).map_err(|e| SpaceCacheError::ConfigValidationError {
                    message: format!("{}: {}", field, e),
                })
            }
        }
    }
}

impl RawSettings {
    fn resolve(self) -> Result<CacheSettings> {
        let defaults = CacheSettings::default();
        Ok(CacheSettings {
            interval: match &self.interval {
                Some(value) => value.resolve("interval")?,
                None => defaults.interval,
            },
            jitter: match &self.jitter {
                Some(value) => value.resolve("jitter")?,
                None => defaults.jitter,
            },
            cache_file: self.cache_file,
            max_record_age: self
                .max_record_age
                .as_ref()
                .map(|value| value.resolve("max_record_age"))
                .transpose()?,
        })
    }
}

/// Parse a duration string like "250ms", "30s", "10m", "1h" or "1d".
pub fn parse_duration(text: &str) -> AnyResult<Duration> {
    let text = text.trim().to_lowercase();

    let (digits, unit_millis) = if let Some(ms) = text.strip_suffix("ms") {
        (ms, 1)
    } else if let Some(days) = text.strip_suffix('d') {
        (days, 86_400_000)
    } else if let Some(hours) = text.strip_suffix('h') {
        (hours, 3_600_000)
    } else if let Some(mins) = text.strip_suffix('m') {
        (mins, 60_000)
    } else if let Some(secs) = text.strip_suffix('s') {
        (secs, 1_000)
    } else {
        // Assume milliseconds if no suffix
        (text.as_str(), 1)
    };

    let n: u64 = digits
        .trim()
        .parse()
        .map_err(|_| anyhow!("invalid duration '{}'", text))?;
    let millis = n
        .checked_mul(unit_millis)
        .ok_or_else(|| anyhow!("duration '{}' is too large", text))?;
    Ok(Duration::from_millis(millis))
}

/// Format a duration for display.
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();

    if millis >= 86_400_000 && millis % 86_400_000 == 0 {
        format!("{}d", millis / 86_400_000)
    } else if millis >= 3_600_000 && millis % 3_600_000 == 0 {
        format!("{}h", millis / 3_600_000)
    } else if millis >= 60_000 && millis % 60_000 == 0 {
        format!("{}m", millis / 60_000)
    } else if millis >= 1_000 && millis % 1_000 == 0 {
        format!("{}s", millis / 1_000)
    } else {
        format!("{}ms", millis)
    }
}
