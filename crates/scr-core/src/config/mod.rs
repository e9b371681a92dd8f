//! # SCR Engine Configuration
//!
//! [`EngineConfig`] holds the tunables of the instance engine: how long any
//! worker waits for the build lock or for a concurrent build of the same
//! component, what happens when that wait times out ([`TimeoutPolicy`]), and
//! two diagnostics switches.
//!
//! A config can be read from JSON, YAML (`yaml-config` feature) or TOML
//! (`toml-config` feature) files, chosen by extension, and then overridden
//! from `SCR_*` environment variables.
pub mod error;

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::kernel::constants;
use error::ConfigError;

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigFormat {
    /// JSON format (.json)
    Json,
    /// YAML format (.yaml, .yml) - requires "yaml-config" feature
    #[cfg(feature = "yaml-config")]
    Yaml,
    /// TOML format (.toml) - requires "toml-config" feature
    #[cfg(feature = "toml-config")]
    Toml,
}

impl ConfigFormat {
    /// Get the file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Json => "json",
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => "yaml",
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => "toml",
        }
    }

    /// Determine format from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| match ext.to_lowercase().as_str() {
                "json" => Some(ConfigFormat::Json),
                #[cfg(feature = "yaml-config")]
                "yaml" | "yml" => Some(ConfigFormat::Yaml),
                #[cfg(feature = "toml-config")]
                "toml" => Some(ConfigFormat::Toml),
                _ => None,
            })
    }
}

/// What a worker does when a bounded wait runs out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutPolicy {
    /// Log and continue: proceed without the build lock, or hand out an
    /// instance that may not have finished activating.
    #[default]
    BestEffort,
    /// Fail the operation with a timeout error
    Strict,
}

impl FromStr for TimeoutPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "best_effort" => Ok(TimeoutPolicy::BestEffort),
            "strict" => Ok(TimeoutPolicy::Strict),
            _ => Err(ConfigError::InvalidValue {
                key: constants::ENV_TIMEOUT_POLICY.to_string(),
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Bound on every wait for the build lock or a concurrent build, in milliseconds
    pub wait_time_on_block_ms: u64,

    pub timeout_policy: TimeoutPolicy,

    /// Build every non-factory component as soon as it is satisfied, not only immediate ones
    pub instantiate_all: bool,

    /// Log how long each build and dispose took
    pub perf: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            wait_time_on_block_ms: constants::DEFAULT_WAIT_TIME_ON_BLOCK_MS,
            timeout_policy: TimeoutPolicy::BestEffort,
            instantiate_all: false,
            perf: false,
        }
    }
}

impl EngineConfig {
    pub fn wait_time(&self) -> Duration {
        Duration::from_millis(self.wait_time_on_block_ms)
    }

    pub fn with_wait_time(mut self, wait_time: Duration) -> Self {
        self.wait_time_on_block_ms = wait_time.as_millis() as u64;
        self
    }

    pub fn with_timeout_policy(mut self, policy: TimeoutPolicy) -> Self {
        self.timeout_policy = policy;
        self
    }

    pub fn with_instantiate_all(mut self, instantiate_all: bool) -> Self {
        self.instantiate_all = instantiate_all;
        self
    }

    /// Read a config file, choosing the format from its extension
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let format = ConfigFormat::from_path(path).ok_or_else(|| ConfigError::UnsupportedFormat {
            path: path.to_path_buf(),
        })?;
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents, format)
    }

    /// Parse config text in the given format; missing keys keep their defaults
    pub fn parse(contents: &str, format: ConfigFormat) -> Result<Self, ConfigError> {
        let parse_error = |message: String| ConfigError::Parse {
            format: format.extension().to_string(),
            message,
        };
        match format {
            ConfigFormat::Json => serde_json::from_str(contents).map_err(|e| parse_error(e.to_string())),
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => serde_yaml::from_str(contents).map_err(|e| parse_error(e.to_string())),
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::from_str(contents).map_err(|e| parse_error(e.to_string())),
        }
    }

    /// Apply `SCR_*` overrides from the process environment
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(std::env::vars())
    }

    /// Apply overrides from `(name, value)` pairs; unknown names are ignored
    pub fn apply_overrides<I, K, V>(&mut self, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let (key, value) = (key.as_ref(), value.as_ref());
            let invalid = || ConfigError::InvalidValue {
                key: key.to_string(),
                value: value.to_string(),
            };
            match key {
                constants::ENV_WAIT_TIME_ON_BLOCK => {
                    self.wait_time_on_block_ms = value.trim().parse().map_err(|_| invalid())?;
                }
                constants::ENV_TIMEOUT_POLICY => {
                    self.timeout_policy = value.parse()?;
                }
                constants::ENV_INSTANTIATE_ALL => {
                    self.instantiate_all = parse_flag(value).ok_or_else(invalid)?;
                }
                constants::ENV_PERF => {
                    self.perf = parse_flag(value).ok_or_else(invalid)?;
                }
                _ => {}
            }
        }
        Ok(())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
