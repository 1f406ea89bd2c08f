use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::domain::DomainError;

/// Default minimum confidence required to accept a candidate without asking the user.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.7;

/// Default bound on a single identification call.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Accepted range for the identification timeout.
pub const REQUEST_TIMEOUT_RANGE_SECS: std::ops::RangeInclusive<u64> = 1..=60;

/// Prefix of the environment variables that override the config file.
pub const ENV_PREFIX: &str = "MACHINEMATE_";

/// Override lookup backed by the process environment.
pub fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Identification backend configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentificationConfig {
    /// Base URL of the identification backend.
    /// None (or empty) means offline mode: the network is never attempted.
    pub api_base_url: Option<String>,
    /// Minimum top-candidate confidence for auto-navigation (0.0-1.0).
    pub confidence_threshold: f64,
    /// Timeout for one identification call, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for IdentificationConfig {
    fn default() -> Self {
        Self {
            api_base_url: None,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl IdentificationConfig {
    /// Configured base URL, with blank values treated as unset.
    pub fn base_url(&self) -> Option<&str> {
        self.api_base_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    /// Whether identification runs without network access.
    pub fn is_offline(&self) -> bool {
        self.base_url().is_none()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Check the values a resolver depends on.
    pub fn validate(&self) -> Result<(), DomainError> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(DomainError::Config(format!(
                "confidence_threshold must be within [0, 1], got {}",
                self.confidence_threshold
            )));
        }

        if !REQUEST_TIMEOUT_RANGE_SECS.contains(&self.request_timeout_secs) {
            return Err(DomainError::Config(format!(
                "request_timeout_secs must be within {}-{}, got {}",
                REQUEST_TIMEOUT_RANGE_SECS.start(),
                REQUEST_TIMEOUT_RANGE_SECS.end(),
                self.request_timeout_secs
            )));
        }

        if let Some(base_url) = self.base_url() {
            let parsed = Url::parse(base_url).map_err(|e| {
                DomainError::Config(format!("Invalid api_base_url '{}': {}", base_url, e))
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(DomainError::Config(format!(
                    "api_base_url must use http or https, got '{}'",
                    parsed.scheme()
                )));
            }
        }

        Ok(())
    }
}

/// Machine catalog configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// JSON file replacing the embedded catalog.
    pub path: Option<PathBuf>,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Enable file logging with rotation.
    pub file_logging: bool,
    /// Maximum number of log files to keep.
    pub max_files: u32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_logging: true,
            max_files: 7,
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub identification: IdentificationConfig,
    pub catalog: CatalogConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Create a new AppConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of this configuration with overrides applied and validated.
    ///
    /// `self` stays as stored; overrides only live in the returned value.
    pub fn effective<F>(&self, lookup: F) -> Result<AppConfig, DomainError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut effective = self.clone();
        effective.apply_overrides(lookup)?;
        effective.validate()?;
        Ok(effective)
    }

    /// Apply overrides looked up by full variable name.
    ///
    /// An empty `MACHINEMATE_API_BASE_URL` switches to offline mode.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), DomainError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        if let Some(url) = var("API_BASE_URL") {
            let url = url.trim().to_string();
            self.identification.api_base_url = if url.is_empty() { None } else { Some(url) };
        }

        if let Some(raw) = var("CONFIDENCE_THRESHOLD") {
            self.identification.confidence_threshold = raw.trim().parse().map_err(|_| {
                DomainError::Config(format!(
                    "Invalid {}CONFIDENCE_THRESHOLD: '{}'",
                    ENV_PREFIX, raw
                ))
            })?;
        }

        if let Some(raw) = var("REQUEST_TIMEOUT_SECS") {
            self.identification.request_timeout_secs = raw.trim().parse().map_err(|_| {
                DomainError::Config(format!(
                    "Invalid {}REQUEST_TIMEOUT_SECS: '{}'",
                    ENV_PREFIX, raw
                ))
            })?;
        }

        if let Some(level) = var("LOG_LEVEL") {
            self.logging.level = level.trim().to_lowercase();
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        self.identification.validate()
    }
}
