//! cloudnotes-core - Core library for cloudnotes
//!
//! This crate contains the sync engine between a local note collection and a
//! Nextcloud Notes server: endpoint and credential state, request dispatch,
//! Login Flow v2, status/capabilities discovery and note reconciliation.

pub mod api;
pub mod client;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod events;
pub mod login;
pub mod models;
pub mod notes;
pub mod status;
pub mod transport;
pub mod util;

pub use api::NextcloudApi;
pub use client::{NotesClient, Progress};
pub use config::ApiConfig;
pub use endpoint::{Endpoint, EndpointState};
pub use error::{ApiErrorKind, Error, Result};
pub use events::{ApiEvent, EventBus};
pub use login::{LoginCredentials, LoginStatus};
pub use models::{Note, NoteId};
pub use notes::NotesApp;
pub use status::{
    AppCapabilities, Capabilities, CapabilitiesStatus, NextcloudStatus, StatusSnapshot, Version,
};
pub use transport::{HttpTransport, ReqwestTransport, Route};
