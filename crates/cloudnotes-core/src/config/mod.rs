//! Client configuration.
//!
//! `ApiConfig` carries the values that shape every outgoing request: the
//! user agent, the default SSL policy and the timing of the login poll.

use std::time::Duration;

use crate::error::{Error, Result};
use crate::util::normalize_text_option;

const DEFAULT_APP_NAME: &str = "cloudnotes";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Settings applied when the API service is constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// Display name sent in the `User-Agent` header.
    pub app_name: String,
    /// Version sent in the `User-Agent` header.
    pub app_version: String,
    /// Machine name sent in the `User-Agent` header.
    pub hostname: String,
    /// Initial peer certificate verification policy.
    pub verify_ssl: bool,
    /// Interval between Login Flow v2 poll requests.
    pub poll_interval: Duration,
    /// Per-request timeout enforced by the HTTP transport.
    pub request_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            app_name: DEFAULT_APP_NAME.to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            hostname: local_hostname(),
            verify_ssl: true,
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl ApiConfig {
    /// Builds a config for the given application identity.
    pub fn for_app(app_name: impl Into<String>, app_version: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            app_version: app_version.into(),
            ..Self::default()
        }
    }

    /// `<app name> <version> - <hostname>`
    pub fn user_agent(&self) -> String {
        format!("{} {} - {}", self.app_name, self.app_version, self.hostname)
    }

    /// Normalizes text fields and rejects unusable values.
    pub fn validated(mut self) -> Result<Self> {
        self.app_name = normalize_text_option(Some(self.app_name))
            .ok_or_else(|| Error::InvalidConfiguration("app name must not be empty".into()))?;
        self.app_version =
            normalize_text_option(Some(self.app_version)).unwrap_or_else(|| "0".to_string());
        self.hostname = normalize_text_option(Some(self.hostname)).unwrap_or_else(local_hostname);
        if self.poll_interval.is_zero() {
            return Err(Error::InvalidConfiguration(
                "poll interval must be greater than zero".into(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(Error::InvalidConfiguration(
                "request timeout must be greater than zero".into(),
            ));
        }
        Ok(self)
    }
}

fn local_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .and_then(|name| normalize_text_option(Some(name)))
        .unwrap_or_else(|| "localhost".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_agent_joins_identity_and_host() {
        let config = ApiConfig {
            hostname: "sailfish".to_string(),
            ..ApiConfig::for_app("Nextcloud Notes", "1.2.3")
        };
        assert_eq!(config.user_agent(), "Nextcloud Notes 1.2.3 - sailfish");
    }

    #[test]
    fn validated_rejects_empty_app_name() {
        let config = ApiConfig::for_app("  ", "1.0");
        assert!(config.validated().is_err());
    }

    #[test]
    fn validated_rejects_zero_poll_interval() {
        let config = ApiConfig {
            poll_interval: Duration::ZERO,
            ..ApiConfig::default()
        };
        let error = config.validated().unwrap_err();
        assert!(error.to_string().contains("poll interval"));
    }

    #[test]
    fn validated_fills_blank_hostname() {
        let config = ApiConfig {
            hostname: " ".to_string(),
            ..ApiConfig::default()
        }
        .validated()
        .unwrap();
        assert!(!config.hostname.is_empty());
    }
}
