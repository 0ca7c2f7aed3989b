//! Configuration loading and typed config structures for the feedback service.
//!
//! The configuration lives in `ngf-config.yaml`. This module defines
//! strongly-typed structs that mirror the YAML structure, and a loader that
//! reads, applies environment overrides and validates the result. Every field
//! has a default, so an empty file (or no file at all) yields a working
//! configuration.
//!
//! ```yaml
//! service:
//!   name: com.nokia.NonGraphicFeedback1
//!   subject_prefix: ngf
//!   completion_delay_ms: 2000
//!   notify_mode: directed
//!   owner_probe_timeout_ms: 500
//! infrastructure:
//!   nats_url: nats://localhost:4222
//! logging:
//!   level: info
//! ```

use std::path::Path;
use std::time::Duration;

use ngf_types::subjects;
use serde::Deserialize;

use crate::dispatcher::DispatcherConfig;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value is present but unusable.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level service configuration. Mirrors `ngf-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FeedbackConfig {
    /// Service identity and event timing.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Infrastructure connection strings.
    #[serde(default)]
    pub infrastructure: InfrastructureConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl FeedbackConfig {
    /// Load configuration from a YAML file, then apply environment
    /// overrides and validate.
    ///
    /// Environment variables override YAML values:
    /// - `NATS_URL` overrides `infrastructure.nats_url`
    /// - `NGF_COMPLETION_DELAY_MS` overrides `service.completion_delay_ms`
    /// - `NGF_NOTIFY_MODE` overrides `service.notify_mode`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if it is not valid YAML, or
    /// [`ConfigError::Invalid`] if an override or value is unusable.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string, then apply environment
    /// overrides and validate.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] or [`ConfigError::Invalid`].
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config = Self::parse_without_env(yaml)?;
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Built-in defaults with environment overrides applied.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if an override is unusable.
    pub fn from_env_defaults() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse YAML without consulting the environment. Empty input yields
    /// the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse_without_env(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Apply overrides looked up through `lookup` (normally the process
    /// environment).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if an override cannot be parsed.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("NATS_URL") {
            self.infrastructure.nats_url = val;
        }
        if let Some(val) = lookup("NGF_COMPLETION_DELAY_MS") {
            self.service.completion_delay_ms =
                val.trim().parse().map_err(|e| ConfigError::Invalid {
                    reason: format!("invalid NGF_COMPLETION_DELAY_MS: {e}"),
                })?;
        }
        if let Some(val) = lookup("NGF_NOTIFY_MODE") {
            self.service.notify_mode = NotifyMode::parse(&val).ok_or_else(|| {
                ConfigError::Invalid {
                    reason: format!("invalid NGF_NOTIFY_MODE: {val}"),
                }
            })?;
        }
        Ok(())
    }

    /// Check values that serde cannot check.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for an empty service name, an
    /// unusable subject prefix, a zero completion delay or an empty NATS
    /// URL.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service.name.trim().is_empty() {
            return Err(ConfigError::Invalid {
                reason: "service.name must not be empty".to_owned(),
            });
        }
        if !subjects::is_valid_prefix(&self.service.subject_prefix) {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "service.subject_prefix {:?} must be non-empty tokens without whitespace or wildcards",
                    self.service.subject_prefix
                ),
            });
        }
        if self.service.completion_delay_ms == 0 {
            return Err(ConfigError::Invalid {
                reason: "service.completion_delay_ms must be greater than zero".to_owned(),
            });
        }
        if self.infrastructure.nats_url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                reason: "infrastructure.nats_url must not be empty".to_owned(),
            });
        }
        Ok(())
    }

    /// Dispatcher parameters derived from the service section.
    pub const fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            completion_delay: Duration::from_millis(self.service.completion_delay_ms),
        }
    }
}

/// How outbound notifications are addressed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyMode {
    /// One-way message to the requester's own subject.
    #[default]
    Directed,
    /// Signal on the shared subject every listener receives.
    Broadcast,
}

impl NotifyMode {
    /// Parse a mode name case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "directed" => Some(Self::Directed),
            "broadcast" => Some(Self::Broadcast),
            _ => None,
        }
    }
}

impl core::fmt::Display for NotifyMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Directed => f.write_str("directed"),
            Self::Broadcast => f.write_str("broadcast"),
        }
    }
}

/// Service identity and event timing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceConfig {
    /// Well-known service name the daemon claims.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// First token(s) of every subject the service uses.
    #[serde(default = "default_subject_prefix")]
    pub subject_prefix: String,

    /// Delay between `Play` and `Completed`, in milliseconds.
    #[serde(default = "default_completion_delay_ms")]
    pub completion_delay_ms: u64,

    /// How notifications are addressed.
    #[serde(default)]
    pub notify_mode: NotifyMode,

    /// How long to wait for an existing owner to answer the name probe.
    #[serde(default = "default_owner_probe_timeout_ms")]
    pub owner_probe_timeout_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            subject_prefix: default_subject_prefix(),
            completion_delay_ms: default_completion_delay_ms(),
            notify_mode: NotifyMode::default(),
            owner_probe_timeout_ms: default_owner_probe_timeout_ms(),
        }
    }
}

/// Infrastructure connection strings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InfrastructureConfig {
    /// NATS messaging URL.
    #[serde(default = "default_nats_url")]
    pub nats_url: String,
}

impl Default for InfrastructureConfig {
    fn default() -> Self {
        Self {
            nats_url: default_nats_url(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "com.nokia.NonGraphicFeedback1".to_owned()
}

fn default_subject_prefix() -> String {
    subjects::DEFAULT_PREFIX.to_owned()
}

const fn default_completion_delay_ms() -> u64 {
    2000
}

const fn default_owner_probe_timeout_ms() -> u64 {
    500
}

fn default_nats_url() -> String {
    "nats://localhost:4222".to_owned()
}

fn default_log_level() -> String {
    "info".to_owned()
}
