//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! - `BAZAAR_API_URL` - Storefront API base URL (default: `http://127.0.0.1:3000`)
//! - `BAZAAR_STORAGE_PATH` - JSON file holding the guest session id and access
//!   token (default: `.bazaar/session.json`)
//! - `BAZAAR_HTTP_TIMEOUT_SECS` - Per-request timeout (default: 15)

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the storefront API
    pub api_url: Url,
    /// Where client state is persisted between runs
    pub storage_path: PathBuf,
    /// Timeout applied to every HTTP request
    pub http_timeout: Duration,
}

impl ClientConfig {
    /// Create a configuration for `api_url` with default storage and timeout.
    #[must_use]
    pub fn new(api_url: Url) -> Self {
        Self {
            api_url,
            storage_path: PathBuf::from(".bazaar/session.json"),
            http_timeout: Duration::from_secs(15),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let api_url = env_or("BAZAAR_API_URL", "http://127.0.0.1:3000");
        let api_url = Url::parse(&api_url)
            .map_err(|e| ConfigError::InvalidEnvVar("BAZAAR_API_URL".to_string(), e.to_string()))?;

        let storage_path = PathBuf::from(env_or("BAZAAR_STORAGE_PATH", ".bazaar/session.json"));

        let timeout_secs = env_or("BAZAAR_HTTP_TIMEOUT_SECS", "15")
            .parse::<u64>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("BAZAAR_HTTP_TIMEOUT_SECS".to_string(), e.to_string())
            })?;

        Ok(Self {
            api_url,
            storage_path,
            http_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}
