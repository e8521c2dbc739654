//! HTTP backend configuration.

use std::env;
use std::time::Duration;

/// Default service endpoint.
pub const DEFAULT_BASE_URL: &str = "https://gigaverse.io";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Connection settings for [`crate::HttpGameApi`].
#[derive(Clone)]
pub struct HttpApiConfig {
    /// Base URL of the game service (no trailing slash)
    pub base_url: String,

    /// Bearer token sent on every request
    pub auth_token: String,

    /// Account address the energy, claim and progress calls refer to
    pub address: String,

    /// Transport-level request timeout
    pub request_timeout: Duration,
}

impl std::fmt::Debug for HttpApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpApiConfig")
            .field("base_url", &self.base_url)
            .field("auth_token", &"<redacted>")
            .field("address", &self.address)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl HttpApiConfig {
    pub fn new(auth_token: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            auth_token: auth_token.into(),
            address: address.into(),
            request_timeout: Duration::from_secs(15),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `GAME_API_URL` - Service base URL (default: https://gigaverse.io)
    /// - `GAME_AUTH_TOKEN` - Bearer token (required)
    /// - `GAME_ACCOUNT_ADDRESS` - Account address (required)
    /// - `API_TIMEOUT_MS` - Request timeout in milliseconds (default: 15000)
    pub fn from_env() -> Result<Self, ConfigError> {
        let auth_token = env::var("GAME_AUTH_TOKEN")
            .map_err(|_| ConfigError::Missing("GAME_AUTH_TOKEN"))?;
        let address = env::var("GAME_ACCOUNT_ADDRESS")
            .map_err(|_| ConfigError::Missing("GAME_ACCOUNT_ADDRESS"))?;

        let mut config = Self::new(auth_token, address);

        if let Ok(url) = env::var("GAME_API_URL") {
            config = config.with_base_url(url);
        }

        if let Ok(raw) = env::var("API_TIMEOUT_MS") {
            let millis = raw.parse::<u64>().map_err(|e| ConfigError::Invalid {
                key: "API_TIMEOUT_MS",
                reason: e.to_string(),
            })?;
            config.request_timeout = Duration::from_millis(millis.max(1));
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ConfigError::Invalid {
                key: "GAME_API_URL",
                reason: format!("not an http(s) URL: {}", self.base_url),
            });
        }
        if self.auth_token.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "GAME_AUTH_TOKEN",
                reason: "empty token".to_string(),
            });
        }
        Ok(())
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_loses_trailing_slash() {
        let config = HttpApiConfig::new("t", "0xabc").with_base_url("https://example.test/");
        assert_eq!(config.url("/api/x"), "https://example.test/api/x");
    }

    #[test]
    fn rejects_non_http_urls_and_empty_tokens() {
        let config = HttpApiConfig::new("t", "0xabc").with_base_url("ftp://nope");
        assert!(config.validate().is_err());

        let config = HttpApiConfig::new("  ", "0xabc");
        assert!(config.validate().is_err());
    }

    #[test]
    fn debug_output_hides_token() {
        let config = HttpApiConfig::new("secret-token", "0xabc");
        assert!(!format!("{config:?}").contains("secret-token"));
    }
}
