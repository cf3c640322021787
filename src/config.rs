//! Cache and pruner settings.
//!
//! Settings come from code, from environment variables, or (with the `config`
//! feature) from JSON.

use std::env;
use std::time::Duration;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use crate::error::{CacheError, CacheResult};

/// Default prefix for environment variables.
pub const DEFAULT_ENV_PREFIX: &str = "ACTIVATION_CACHE";

/// Default interval between timer-driven prune passes.
pub const DEFAULT_PRUNING_INTERVAL: Duration = Duration::from_secs(30);

/// Settings shared by a cache and its pruner.
///
/// # Examples
///
/// ```
/// use activation_cache::CacheSettings;
/// use std::time::Duration;
///
/// let settings = CacheSettings::default()
///     .with_pruning_interval(Duration::from_millis(250));
/// assert!(settings.validate().is_ok());
///
/// let invalid = CacheSettings::default().with_pruning_interval(Duration::ZERO);
/// assert!(invalid.validate().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct CacheSettings {
    /// Interval between timer-driven prune passes
    #[cfg_attr(feature = "config", serde(rename = "pruning_interval_ms", with = "duration_ms"))]
    pub pruning_interval: Duration,
    /// Whether instances activated with no scope are tracked for release
    pub track_scopeless: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            pruning_interval: DEFAULT_PRUNING_INTERVAL,
            track_scopeless: true,
        }
    }
}

impl CacheSettings {
    /// Sets the pruning interval.
    pub fn with_pruning_interval(mut self, interval: Duration) -> Self {
        self.pruning_interval = interval;
        self
    }

    /// Sets whether scope-less instances are tracked.
    pub fn with_track_scopeless(mut self, track: bool) -> Self {
        self.track_scopeless = track;
        self
    }

    /// Checks the settings for values the cache cannot work with.
    pub fn validate(&self) -> CacheResult<()> {
        if self.pruning_interval.is_zero() {
            return Err(CacheError::InvalidArgument("pruning interval must be non-zero"));
        }
        Ok(())
    }

    /// Reads settings from `ACTIVATION_CACHE_*` environment variables.
    pub fn from_env() -> CacheResult<Self> {
        Self::from_env_with_prefix(DEFAULT_ENV_PREFIX)
    }

    /// Reads `<PREFIX>_PRUNING_INTERVAL_MS` and `<PREFIX>_TRACK_SCOPELESS`,
    /// keeping defaults for unset variables.
    pub fn from_env_with_prefix(prefix: &str) -> CacheResult<Self> {
        let mut settings = Self::default();
        let prefix = prefix.to_uppercase();

        if let Some(raw) = read_var(&prefix, "PRUNING_INTERVAL_MS") {
            let ms = raw
                .trim()
                .parse::<u64>()
                .map_err(|_| {
                    CacheError::InvalidArgument("pruning interval is not a number of milliseconds")
                })?;
            settings.pruning_interval = Duration::from_millis(ms);
        }

        if let Some(raw) = read_var(&prefix, "TRACK_SCOPELESS") {
            settings.track_scopeless = parse_bool(&raw)
                .ok_or(CacheError::InvalidArgument("track_scopeless is not a boolean"))?;
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Parses settings from JSON, e.g. `{"pruning_interval_ms": 5000}`.
    #[cfg(feature = "config")]
    pub fn from_json_str(json: &str) -> CacheResult<Self> {
        let settings: Self = serde_json::from_str(json)
            .map_err(|_| CacheError::InvalidArgument("invalid JSON cache settings"))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Serializes settings to JSON.
    #[cfg(feature = "config")]
    pub fn to_json_string(&self) -> CacheResult<String> {
        serde_json::to_string(self)
            .map_err(|_| CacheError::InvalidArgument("cache settings are not serializable"))
    }
}

fn read_var(prefix: &str, name: &str) -> Option<String> {
    env::var(format!("{}_{}", prefix, name)).ok()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(feature = "config")]
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
