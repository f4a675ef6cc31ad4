//! Error types for cloudnotes-core

use thiserror::Error;

/// Result type alias using cloudnotes-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while constructing or configuring the client
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// HTTP client construction failed
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Error kinds surfaced upward to the presentation layer.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiErrorKind {
    #[error("No error")]
    NoError,
    #[error("No network connection available")]
    NoConnectionError,
    #[error("Failed to communicate with the Nextcloud server")]
    CommunicationError,
    #[error("An error occurred while establishing an encrypted connection")]
    SslHandshakeError,
    #[error("Could not authenticate to the Nextcloud instance")]
    AuthenticationError,
    #[error("Unknown error")]
    Unknown,
}

impl ApiErrorKind {
    /// Human-readable message for the error kind.
    pub fn message(self) -> String {
        self.to_string()
    }
}
