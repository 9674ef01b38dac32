//! Validator and command Interest options.
//!
//! Options come from `NDN_*` environment variables or from a JSON document;
//! anything not given keeps its default.

use std::env;
use std::path::Path;
use std::str::FromStr;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::trust::validator::DEFAULT_MAX_DEPTH;

/// Longest accepted lifetime or grace period (100 years).
pub const MAX_PERIOD_SECS: u64 = 100 * 365 * 24 * 60 * 60;
const MAX_PERIOD_MS: u64 = MAX_PERIOD_SECS * 1000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value `{value}` for {key}")]
    InvalidValue { key: String, value: String },

    #[error("Failed to parse configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandInterestOptions {
    /// Accepted distance between a command timestamp and the local clock, in milliseconds.
    pub grace_period_ms: u64,
    /// Upper bound on remembered signing keys; `None` keeps every key.
    pub max_records: Option<usize>,
    /// How long a key's last timestamp is remembered, in seconds.
    pub record_lifetime_secs: u64,
}

impl Default for CommandInterestOptions {
    fn default() -> Self {
        CommandInterestOptions {
            grace_period_ms: 2 * 60 * 1000,
            max_records: Some(1000),
            record_lifetime_secs: 3600,
        }
    }
}

impl CommandInterestOptions {
    pub fn grace_period(&self) -> Duration {
        Duration::milliseconds(self.grace_period_ms.min(MAX_PERIOD_MS) as i64)
    }

    pub fn record_lifetime(&self) -> Duration {
        capped_seconds(self.record_lifetime_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        check_range("command_interest.grace_period_ms", self.grace_period_ms, MAX_PERIOD_MS)?;
        check_range(
            "command_interest.record_lifetime_secs",
            self.record_lifetime_secs,
            MAX_PERIOD_SECS,
        )?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorOptions {
    pub max_depth: usize,
    pub verified_cache_lifetime_secs: u64,
    pub unverified_cache_lifetime_secs: u64,
    /// Reload period of trust anchors loaded from files.
    pub anchor_refresh_secs: u64,
    pub command_interest: CommandInterestOptions,
}

impl Default for ValidatorOptions {
    fn default() -> Self {
        ValidatorOptions {
            max_depth: DEFAULT_MAX_DEPTH,
            verified_cache_lifetime_secs: 3600,
            unverified_cache_lifetime_secs: 300,
            anchor_refresh_secs: 3600,
            command_interest: CommandInterestOptions::default(),
        }
    }
}

fn capped_seconds(secs: u64) -> Duration {
    Duration::seconds(secs.min(MAX_PERIOD_SECS) as i64)
}

fn check_range(key: &str, value: u64, max: u64) -> Result<u64, ConfigError> {
    if value > max {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        });
    }
    Ok(value)
}

fn parse_period(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: u64,
    max: u64,
) -> Result<u64, ConfigError> {
    check_range(key, parse_var(lookup, key, default)?, max)
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value,
        }),
        None => Ok(default),
    }
}

impl ValidatorOptions {
    pub fn verified_cache_lifetime(&self) -> Duration {
        capped_seconds(self.verified_cache_lifetime_secs)
    }

    pub fn unverified_cache_lifetime(&self) -> Duration {
        capped_seconds(self.unverified_cache_lifetime_secs)
    }

    pub fn anchor_refresh_period(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.anchor_refresh_secs)
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds options from `lookup`, which maps variable names to values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = ValidatorOptions::default();
        let command_defaults = &defaults.command_interest;

        let max_records = match lookup("NDN_COMMAND_MAX_RECORDS") {
            None => command_defaults.max_records,
            Some(value) if value.trim() == "unlimited" || value.trim() == "-1" => None,
            Some(value) => Some(value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "NDN_COMMAND_MAX_RECORDS".to_string(),
                value,
            })?),
        };

        Ok(ValidatorOptions {
            max_depth: parse_var(&lookup, "NDN_MAX_DEPTH", defaults.max_depth)?,
            verified_cache_lifetime_secs: parse_period(
                &lookup,
                "NDN_VERIFIED_CACHE_LIFETIME_SECS",
                defaults.verified_cache_lifetime_secs,
                MAX_PERIOD_SECS,
            )?,
            unverified_cache_lifetime_secs: parse_period(
                &lookup,
                "NDN_UNVERIFIED_CACHE_LIFETIME_SECS",
                defaults.unverified_cache_lifetime_secs,
                MAX_PERIOD_SECS,
            )?,
            anchor_refresh_secs: parse_period(
                &lookup,
                "NDN_ANCHOR_REFRESH_SECS",
                defaults.anchor_refresh_secs,
                MAX_PERIOD_SECS,
            )?,
            command_interest: CommandInterestOptions {
                grace_period_ms: parse_period(
                    &lookup,
                    "NDN_COMMAND_GRACE_PERIOD_MS",
                    command_defaults.grace_period_ms,
                    MAX_PERIOD_MS,
                )?,
                max_records,
                record_lifetime_secs: parse_period(
                    &lookup,
                    "NDN_COMMAND_RECORD_LIFETIME_SECS",
                    command_defaults.record_lifetime_secs,
                    MAX_PERIOD_SECS,
                )?,
            },
        })
    }

    /// Parses a JSON document, rejecting periods longer than [`MAX_PERIOD_SECS`].
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let options: ValidatorOptions = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        check_range(
            "verified_cache_lifetime_secs",
            self.verified_cache_lifetime_secs,
            MAX_PERIOD_SECS,
        )?;
        check_range(
            "unverified_cache_lifetime_secs",
            self.unverified_cache_lifetime_secs,
            MAX_PERIOD_SECS,
        )?;
        check_range("anchor_refresh_secs", self.anchor_refresh_secs, MAX_PERIOD_SECS)?;
        self.command_interest.validate()
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }
}
