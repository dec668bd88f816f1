
use thiserror::Error;
use url::Url;

use crate::config::credentials::Credentials;

pub const DEFAULT_BASE_URL: &str = "https://api.veryfi.com/api/v8/partner/";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 120;

pub const BASE_URL_VAR: &str = "VERYFI_BASE_URL";
pub const TIMEOUT_VAR: &str = "VERYFI_TIMEOUT_SECS";

const MAX_TIMEOUT_SECONDS: u64 = 600;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api: ApiConfig,
    pub credentials: Credentials,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECONDS,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid timeout: {0} (must be between 1 and 600 seconds)")]
    InvalidTimeout(u64),
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

impl Config {
    /// Build the configuration from the process environment.
    #[inline]
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary name to value lookup.
    #[inline]
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut api = ApiConfig::default();

        if let Some(base_url) = lookup(BASE_URL_VAR).filter(|v| !v.trim().is_empty()) {
            api.set_base_url(base_url.trim().to_string())?;
        }

        if let Some(raw) = lookup(TIMEOUT_VAR).filter(|v| !v.trim().is_empty()) {
            let timeout = raw
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidValue {
                    name: TIMEOUT_VAR,
                    value: raw.clone(),
                })?;
            api.set_timeout_secs(timeout)?;
        }

        let config = Self {
            api,
            credentials: Credentials::from_lookup(&lookup),
        };
        config.validate()?;
        Ok(config)
    }

    /// Build the configuration from explicit parts.
    #[inline]
    pub fn new(api: ApiConfig, credentials: Credentials) -> Result<Self, ConfigError> {
        let config = Self { api, credentials };
        config.validate()?;
        Ok(config)
    }

    /// Credentials are deliberately not validated here: the server must start
    /// without them so the diagnostic can be reported to the caller.
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.api.validate()
    }
}

impl ApiConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.api_url()?;

        if !(1..=MAX_TIMEOUT_SECONDS).contains(&self.timeout_secs) {
            return Err(ConfigError::InvalidTimeout(self.timeout_secs));
        }

        Ok(())
    }

    /// Parsed base URL, always ending with `/` so endpoint segments join
    /// beneath it rather than replacing its last segment.
    pub fn api_url(&self) -> Result<Url, ConfigError> {
        let mut url =
            Url::parse(&self.base_url).map_err(|_| ConfigError::InvalidUrl(self.base_url.clone()))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidProtocol(url.scheme().to_string()));
        }
        if url.cannot_be_a_base() || url.host_str().is_none() {
            return Err(ConfigError::InvalidUrl(self.base_url.clone()));
        }

        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }

        Ok(url)
    }

    pub fn set_base_url(&mut self, base_url: String) -> Result<(), ConfigError> {
        let temp_config = ApiConfig {
            base_url: base_url.clone(),
            ..self.clone()
        };
        temp_config.api_url()?;
        self.base_url = base_url;
        Ok(())
    }

    pub fn set_timeout_secs(&mut self, timeout_secs: u64) -> Result<(), ConfigError> {
        if !(1..=MAX_TIMEOUT_SECONDS).contains(&timeout_secs) {
            return Err(ConfigError::InvalidTimeout(timeout_secs));
        }
        self.timeout_secs = timeout_secs;
        Ok(())
    }
}
