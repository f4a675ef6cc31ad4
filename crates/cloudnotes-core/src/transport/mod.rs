//! Transport layer: request/reply types, the HTTP primitive abstraction and
//! the request dispatcher.
//!
//! The actual HTTP client sits behind [`HttpTransport`] so the engine can be
//! driven by `reqwest` in production and by an in-memory scripted transport
//! in tests (behind the `test-util` feature outside this crate).

mod dispatcher;
#[cfg(any(test, feature = "test-util"))]
mod scripted;

use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

use crate::error::ApiErrorKind;

pub use dispatcher::{Dispatcher, ReplyReceiver};
pub use reqwest::Method;
#[cfg(any(test, feature = "test-util"))]
pub use scripted::{RecordedRequest, ScriptedTransport};

/// Identifies which operation a request belongs to, so its reply can be
/// routed back to the component that issued it.
#[derive(Clone, PartialEq, Eq)]
pub enum Route {
    Status,
    /// `attempt` tells replies of a superseded initiation apart.
    LoginFlowInitiate { attempt: u64 },
    LoginFlowPoll { token: String },
    VerifyLogin,
    Capabilities,
    GetAppPassword,
    DeleteAppPassword,
    Notes,
}

impl fmt::Debug for Route {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status => formatter.write_str("Status"),
            Self::LoginFlowInitiate { attempt } => formatter
                .debug_struct("LoginFlowInitiate")
                .field("attempt", attempt)
                .finish(),
            Self::LoginFlowPoll { .. } => formatter
                .debug_struct("LoginFlowPoll")
                .field("token", &"[REDACTED]")
                .finish(),
            Self::VerifyLogin => formatter.write_str("VerifyLogin"),
            Self::Capabilities => formatter.write_str("Capabilities"),
            Self::GetAppPassword => formatter.write_str("GetAppPassword"),
            Self::DeleteAppPassword => formatter.write_str("DeleteAppPassword"),
            Self::Notes => formatter.write_str("Notes"),
        }
    }
}

/// Metadata describing the request a reply answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestMeta {
    pub route: Route,
    pub method: Method,
    pub url: Url,
    pub authenticated: bool,
}

/// A fully prepared request handed to the transport.
#[derive(Debug, Clone)]
pub struct OutgoingRequest {
    pub meta: RequestMeta,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
    pub verify_ssl: bool,
}

/// Raw HTTP response as returned by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Transport-level failure attached to a reply.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("TLS handshake failed: {0}")]
    Tls(String),
    #[error("request timed out")]
    Timeout,
    #[error("server returned HTTP {status}")]
    Http { status: u16 },
    #[error("request failed: {0}")]
    Other(String),
}

impl TransportError {
    pub const fn kind(&self) -> ApiErrorKind {
        match self {
            Self::Connection(_) => ApiErrorKind::NoConnectionError,
            Self::Tls(_) => ApiErrorKind::SslHandshakeError,
            Self::Http { status: 401 } => ApiErrorKind::AuthenticationError,
            Self::Timeout | Self::Http { .. } | Self::Other(_) => {
                ApiErrorKind::CommunicationError
            }
        }
    }
}

/// Completion of a dispatched request.
#[derive(Debug, Clone)]
pub struct Reply {
    pub meta: RequestMeta,
    pub status: Option<u16>,
    pub error: Option<TransportError>,
    pub body: Vec<u8>,
}

impl Reply {
    pub(crate) fn from_response(meta: RequestMeta, response: HttpResponse) -> Self {
        let error = (response.status >= 400).then_some(TransportError::Http {
            status: response.status,
        });
        Self {
            meta,
            status: Some(response.status),
            error,
            body: response.body,
        }
    }

    pub(crate) const fn failed(meta: RequestMeta, error: TransportError) -> Self {
        Self {
            meta,
            status: None,
            error: Some(error),
            body: Vec::new(),
        }
    }

    pub const fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn error_kind(&self) -> ApiErrorKind {
        self.error
            .as_ref()
            .map_or(ApiErrorKind::NoError, TransportError::kind)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// The HTTP primitive used by the dispatcher.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Performs one request attempt. HTTP error statuses are not failures at
    /// this layer; they are returned as responses.
    async fn execute(&self, request: OutgoingRequest) -> Result<HttpResponse, TransportError>;
}

/// `reqwest`-backed transport with separate verifying and non-verifying
/// clients, selected per request by the snapshot's SSL policy.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    verifying: reqwest::Client,
    permissive: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> crate::Result<Self> {
        Ok(Self {
            verifying: reqwest::Client::builder().timeout(timeout).build()?,
            permissive: reqwest::Client::builder()
                .timeout(timeout)
                .danger_accept_invalid_certs(true)
                .build()?,
        })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: OutgoingRequest) -> Result<HttpResponse, TransportError> {
        let client = if request.verify_ssl {
            &self.verifying
        } else {
            &self.permissive
        };

        let mut builder = client
            .request(request.meta.method, request.meta.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(classify_reqwest_error)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(classify_reqwest_error)?;
        Ok(HttpResponse {
            status,
            body: body.to_vec(),
        })
    }
}

fn classify_reqwest_error(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        return TransportError::Timeout;
    }
    let chain = error_chain(&error);
    if mentions_tls(&chain) {
        TransportError::Tls(chain)
    } else if error.is_connect() {
        TransportError::Connection(chain)
    } else {
        TransportError::Other(chain)
    }
}

fn error_chain(error: &dyn StdError) -> String {
    let mut rendered = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}

fn mentions_tls(chain: &str) -> bool {
    let lowered = chain.to_lowercase();
    ["certificate", "tls", "ssl", "handshake"]
        .iter()
        .any(|needle| lowered.contains(needle))
}
