//! Session configuration and its environment overrides.

use std::time::Duration;

use quickedit_image_upload::{DEFAULT_ROUTE_PREFIX, EndpointError, Endpoints, validate_base_url};
use thiserror::Error;
use url::Url;

/// Environment variable holding the backend base URL.
pub const BASE_URL_ENV: &str = "QUICKEDIT_IMAGE_BASE_URL";
/// Environment variable overriding the route prefix.
pub const ROUTE_PREFIX_ENV: &str = "QUICKEDIT_IMAGE_ROUTE_PREFIX";
/// Environment variable overriding the request timeout, in milliseconds.
pub const TIMEOUT_MS_ENV: &str = "QUICKEDIT_IMAGE_TIMEOUT_MS";
/// Request timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Backend location and transport settings of an editing session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    base_url: Url,
    route_prefix: String,
    timeout: Duration,
}

impl SessionConfig {
    /// Creates a config with the default route prefix and timeout.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidBaseUrl`] for non-HTTP(S) or unparsable
    /// base URLs.
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: validate_base_url(base_url)?,
            route_prefix: DEFAULT_ROUTE_PREFIX.to_string(),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Replaces the route prefix.
    pub fn with_route_prefix(mut self, route_prefix: impl Into<String>) -> Self {
        self.route_prefix = route_prefix.into();
        self
    }

    /// Replaces the request timeout.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidTimeout`] for a zero duration.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, ConfigError> {
        if timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout("timeout must be positive".to_string()));
        }
        self.timeout = timeout;
        Ok(self)
    }

    /// Reads the config from the process environment.
    ///
    /// # Errors
    /// See [`SessionConfig::from_lookup`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the config through `lookup`.
    ///
    /// Blank values count as unset.
    ///
    /// # Errors
    /// Returns [`ConfigError::MissingBaseUrl`] when no base URL is set,
    /// [`ConfigError::InvalidBaseUrl`] when it is invalid, and
    /// [`ConfigError::InvalidTimeout`] when the timeout is not a positive
    /// integer.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let base_url = read(BASE_URL_ENV).ok_or(ConfigError::MissingBaseUrl)?;
        let mut config = Self::new(&base_url)?;

        if let Some(route_prefix) = read(ROUTE_PREFIX_ENV) {
            config = config.with_route_prefix(route_prefix);
        }

        if let Some(raw) = read(TIMEOUT_MS_ENV) {
            let millis = raw
                .parse::<u64>()
                .map_err(|error| ConfigError::InvalidTimeout(format!("{TIMEOUT_MS_ENV}={raw}: {error}")))?;
            config = config.with_timeout(Duration::from_millis(millis))?;
        }

        Ok(config)
    }

    /// Backend base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Route prefix of the backend endpoints.
    pub fn route_prefix(&self) -> &str {
        &self.route_prefix
    }

    /// Request timeout for the HTTP transport.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Endpoint layout described by this config.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidBaseUrl`] when endpoints cannot be built.
    pub fn endpoints(&self) -> Result<Endpoints, ConfigError> {
        Ok(Endpoints::new(self.base_url.as_str(), &self.route_prefix)?)
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No base URL configured.
    #[error("QUICKEDIT_IMAGE_BASE_URL is not set")]
    MissingBaseUrl,
    /// Base URL rejected.
    #[error(transparent)]
    InvalidBaseUrl(#[from] EndpointError),
    /// Timeout rejected.
    #[error("invalid request timeout: {0}")]
    InvalidTimeout(String),
}
