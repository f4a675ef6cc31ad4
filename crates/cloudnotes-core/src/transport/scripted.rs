//! In-memory transport that answers from a script and records every request.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use reqwest::header::{HeaderName, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;

use super::{HttpResponse, HttpTransport, OutgoingRequest, TransportError};

type ScriptKey = (Method, String);
type Scripted = Result<HttpResponse, TransportError>;

/// A request as seen by [`ScriptedTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: Method,
    pub url: String,
    pub content_type: Option<String>,
    pub authorization: Option<String>,
    pub body: Option<Vec<u8>>,
    pub verify_ssl: bool,
}

impl RecordedRequest {
    pub fn body_json(&self) -> Option<serde_json::Value> {
        self.body
            .as_deref()
            .and_then(|body| serde_json::from_slice(body).ok())
    }
}

#[derive(Debug, Default)]
struct Script {
    sticky: HashMap<ScriptKey, Scripted>,
    queued: HashMap<ScriptKey, VecDeque<Scripted>>,
    requests: Vec<RecordedRequest>,
}

/// Test transport keyed by method and URL path.
///
/// Queued answers are consumed first, then the sticky answer for the key is
/// repeated. Unscripted requests get an empty 404.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    script: Mutex<Script>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers every matching request with `status` and `body`.
    pub fn respond(&self, method: Method, path: &str, status: u16, body: &str) {
        self.lock().sticky.insert(
            (method, path.to_string()),
            Ok(HttpResponse {
                status,
                body: body.as_bytes().to_vec(),
            }),
        );
    }

    /// Answers the next matching request only.
    pub fn respond_once(&self, method: Method, path: &str, status: u16, body: &str) {
        self.lock()
            .queued
            .entry((method, path.to_string()))
            .or_default()
            .push_back(Ok(HttpResponse {
                status,
                body: body.as_bytes().to_vec(),
            }));
    }

    /// Fails every matching request with `error`.
    pub fn fail(&self, method: Method, path: &str, error: TransportError) {
        self.lock()
            .sticky
            .insert((method, path.to_string()), Err(error));
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn execute(&self, request: OutgoingRequest) -> Result<HttpResponse, TransportError> {
        let header = |name: HeaderName| {
            request
                .headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };
        let recorded = RecordedRequest {
            method: request.meta.method.clone(),
            url: request.meta.url.to_string(),
            content_type: header(CONTENT_TYPE),
            authorization: header(AUTHORIZATION),
            body: request.body.clone(),
            verify_ssl: request.verify_ssl,
        };

        let key = (request.meta.method.clone(), request.meta.url.path().to_string());
        let mut script = self.lock();
        script.requests.push(recorded);
        if let Some(answer) = script.queued.get_mut(&key).and_then(VecDeque::pop_front) {
            return answer;
        }
        script.sticky.get(&key).cloned().unwrap_or(Ok(HttpResponse {
            status: 404,
            body: Vec::new(),
        }))
    }
}
