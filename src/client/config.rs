//! Client configuration: which API origin to talk to and how long to wait for
//! it. Values here are public; tokens never live in configuration.

use std::time::Duration;
use url::Url;

pub const PRODUCTION_BASE_URL: &str = "https://residentfeedback-api.onrender.com/";
pub const LOCAL_BASE_URL: &str = "http://localhost:3000/";

/// Default bound on establishing a connection while the network is unavailable.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Default bound on a whole request, including waiting for connectivity.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Production,
    Local,
}

impl Environment {
    #[must_use]
    pub fn base_url(self) -> &'static str {
        match self {
            Self::Production => PRODUCTION_BASE_URL,
            Self::Local => LOCAL_BASE_URL,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: Url,
    pub user_agent: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl ClientConfig {
    /// # Errors
    /// Returns an error if `base_url` is empty, unparsable, or not http(s).
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: normalize_base_url(base_url)?,
            user_agent: APP_USER_AGENT.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    /// # Errors
    /// Never fails for the built-in origins; kept fallible to share `new`.
    pub fn for_environment(environment: Environment) -> Result<Self, ConfigError> {
        Self::new(environment.base_url())
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("base URL is empty")]
    Empty,
    #[error("invalid base URL: {0}")]
    Parse(#[from] url::ParseError),
    #[error("unsupported scheme {0}, expected http or https")]
    Scheme(String),
}

/// Trims the value and guarantees a trailing slash so relative paths join
/// below the base path instead of replacing its last segment.
/// # Errors
/// Returns an error if the value is empty, unparsable, or not http(s).
pub fn normalize_base_url(raw: &str) -> Result<Url, ConfigError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Empty);
    }

    let mut url = Url::parse(trimmed)?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(ConfigError::Scheme(other.to_string())),
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Result, anyhow};

    #[test]
    fn normalize_adds_trailing_slash() -> Result<()> {
        let url = normalize_base_url("  https://api.example.com/v2 ")?;
        assert_eq!(url.as_str(), "https://api.example.com/v2/");
        assert_eq!(url.join("auth/login")?.as_str(), "https://api.example.com/v2/auth/login");
        Ok(())
    }

    #[test]
    fn normalize_rejects_empty() -> Result<()> {
        let err = normalize_base_url("   ")
            .err()
            .ok_or_else(|| anyhow!("expected error"))?;
        assert!(matches!(err, ConfigError::Empty));
        Ok(())
    }

    #[test]
    fn normalize_rejects_unsupported_scheme() -> Result<()> {
        let err = normalize_base_url("ftp://example.com")
            .err()
            .ok_or_else(|| anyhow!("expected error"))?;
        assert!(err.to_string().contains("unsupported scheme"));
        Ok(())
    }

    #[test]
    fn environments_map_to_origins() -> Result<()> {
        let production = ClientConfig::for_environment(Environment::Production)?;
        assert_eq!(production.base_url.as_str(), PRODUCTION_BASE_URL);

        let local = ClientConfig::for_environment(Environment::Local)?;
        assert_eq!(local.base_url.as_str(), LOCAL_BASE_URL);
        assert_eq!(local.request_timeout, DEFAULT_REQUEST_TIMEOUT);
        Ok(())
    }
}
