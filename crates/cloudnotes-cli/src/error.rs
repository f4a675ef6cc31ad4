use std::io;

use cloudnotes_core::ApiErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] cloudnotes_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("{0}")]
    Api(ApiErrorKind),
    #[error("No note content provided")]
    EmptyContent,
    #[error("Edited note content cannot be empty")]
    EmptyEditedContent,
    #[error("Note not found: {0}")]
    NoteNotFound(i64),
    #[error("Editor command failed: {0}")]
    EditorFailed(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Keychain error: {0}")]
    Keychain(String),
    #[error("Request could not be sent: {0}")]
    NotSent(String),
    #[error("Server did not confirm {0}")]
    Unconfirmed(String),
    #[error("Login failed: {0}")]
    Login(String),
    #[error("Login timed out after {0} seconds")]
    LoginTimeout(u64),
    #[error(
        "Profile '{0}' is not logged in. Run `cloudnotes config init --server <url>` and `cloudnotes login`."
    )]
    NotLoggedIn(String),
}
