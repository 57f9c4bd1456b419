//! API base-URL configuration.
//!
//! The client talks to a single identity/API origin, configured through the
//! `API_BASE_URL` environment variable. The value is normalized to
//! `{origin}/api/v1`: a host-only URL gets the path appended, a URL already
//! ending in `/api/v1` is accepted as-is, and anything else is rejected so a
//! misconfigured device fails at startup instead of on the first request.

use reqwest::Url;
use thiserror::Error;

/// Environment variable holding the API origin.
const BASE_URL_ENV: &str = "API_BASE_URL";

/// Versioned API path appended to the configured origin.
const API_V1_PATH: &str = "/api/v1";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing {BASE_URL_ENV} - set it in the environment")]
    MissingBaseUrl,

    #[error("invalid {BASE_URL_ENV}: {0}")]
    InvalidBaseUrl(String),

    #[error("{BASE_URL_ENV} must start with http:// or https://")]
    UnsupportedScheme,

    #[error("{BASE_URL_ENV} must be host only, or end with {API_V1_PATH}")]
    UnexpectedPath,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Normalized base URL, always `{origin}/api/v1` with no trailing slash.
    pub api_base_url: String,
}

impl Config {
    /// Load the configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw = std::env::var(BASE_URL_ENV).map_err(|_| ConfigError::MissingBaseUrl)?;
        Self::new(&raw)
    }

    /// Build a configuration from a raw base URL, normalizing it to
    /// `{origin}/api/v1`.
    pub fn new(raw_base_url: &str) -> Result<Self, ConfigError> {
        let url = Url::parse(raw_base_url.trim())
            .map_err(|_| ConfigError::InvalidBaseUrl(raw_base_url.to_string()))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::UnsupportedScheme);
        }

        let path = url.path().trim_end_matches('/');
        if !path.is_empty() && path != API_V1_PATH {
            return Err(ConfigError::UnexpectedPath);
        }

        let origin = url.origin().ascii_serialization();
        Ok(Self {
            api_base_url: format!("{}{}", origin.trim_end_matches('/'), API_V1_PATH),
        })
    }
}
