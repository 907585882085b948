//! Configuration Module
//!
//! The API origin is the only configurable setting. Everything that talks to
//! the backend or renders server media resolves URLs through [`Config`].

use std::time::Duration;
use reqwest::Url;
use tracing::debug;

const DEVELOPMENT_API_URL: &str = "http://localhost:8000";
const PRODUCTION_API_URL: &str = "https://api.hzn-courier.com";

/// Environment variable selecting the target environment
pub const ENV_VAR: &str = "HZN_ENV";
/// Environment variable overriding the API origin
pub const API_URL_VAR: &str = "HZN_API_URL";

/// Deployment target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    fn default_api_url(&self) -> &'static str {
        match self {
            Environment::Development => DEVELOPMENT_API_URL,
            Environment::Production => PRODUCTION_API_URL,
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(ConfigError::UnknownEnvironment(other.to_string())),
        }
    }
}

/// Client configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    api_url: String,
    pub timeout: Duration,
}

impl Config {
    /// Configuration for an environment with its default origin
    pub fn for_environment(environment: Environment) -> Self {
        Self {
            environment,
            api_url: environment.default_api_url().to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Read `HZN_ENV` and `HZN_API_URL`
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = match std::env::var(ENV_VAR) {
            Ok(value) => value.parse()?,
            Err(_) => Environment::default(),
        };

        let config = Self::for_environment(environment);
        match std::env::var(API_URL_VAR) {
            Ok(url) => config.with_api_url(&url),
            Err(_) => Ok(config),
        }
    }

    /// Replace the API origin after validating it
    pub fn with_api_url(mut self, url: &str) -> Result<Self, ConfigError> {
        let parsed = Url::parse(url).map_err(|e| ConfigError::InvalidUrl(url.to_string(), e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl(url.to_string(), "expected http or https".into()));
        }

        self.api_url = url.trim_end_matches('/').to_string();
        debug!("API origin set to {}", self.api_url);
        Ok(self)
    }

    /// API origin without trailing slash
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Base URL of the auth endpoints
    pub fn auth_url(&self) -> String {
        format!("{}/auth", self.api_url)
    }

    /// Absolute URL for media returned by the server.
    ///
    /// Relative paths are prefixed with the API origin; absolute URLs are
    /// returned unchanged.
    pub fn media_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }

        if path.starts_with('/') {
            format!("{}{}", self.api_url, path)
        } else {
            format!("{}/{}", self.api_url, path)
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::for_environment(Environment::default())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Unknown environment: {0}")]
    UnknownEnvironment(String),

    #[error("Invalid API URL {0}: {1}")]
    InvalidUrl(String, String),
}
