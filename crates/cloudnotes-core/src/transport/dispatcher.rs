//! Request dispatch against the current connection snapshot.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use reqwest::Method;
use tokio::sync::mpsc;
use url::Url;

use super::{HttpTransport, OutgoingRequest, Reply, RequestMeta, Route};
use crate::endpoint::SharedSnapshot;

/// Issues requests without blocking and reports completions on a channel.
///
/// Every method returns whether the request was accepted for sending. A
/// `false` means nothing was sent: the composed URL was invalid, lacked a
/// scheme or host, or no async runtime was available.
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn HttpTransport>,
    snapshot: SharedSnapshot,
    replies: mpsc::UnboundedSender<Reply>,
    in_flight: Arc<AtomicUsize>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Dispatcher")
            .field("in_flight", &self.running_requests())
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        snapshot: SharedSnapshot,
    ) -> (Self, ReplyReceiver) {
        let (replies, receiver) = mpsc::unbounded_channel();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let dispatcher = Self {
            transport,
            snapshot,
            replies,
            in_flight: Arc::clone(&in_flight),
        };
        (
            dispatcher,
            ReplyReceiver {
                receiver,
                in_flight,
            },
        )
    }

    /// Number of accepted requests whose reply has not been taken yet.
    pub fn running_requests(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn get(
        &self,
        route: Route,
        endpoint: &str,
        query: &[(&str, &str)],
        authenticated: bool,
    ) -> bool {
        let Some(url) = self.compose(endpoint, query) else {
            return false;
        };
        self.send(Method::GET, route, url, None, authenticated)
    }

    pub fn post(&self, route: Route, endpoint: &str, body: Vec<u8>, authenticated: bool) -> bool {
        let Some(url) = self.compose(endpoint, &[]) else {
            return false;
        };
        self.send(Method::POST, route, url, Some(body), authenticated)
    }

    pub fn put(&self, route: Route, endpoint: &str, body: Vec<u8>, authenticated: bool) -> bool {
        let Some(url) = self.compose(endpoint, &[]) else {
            return false;
        };
        self.send(Method::PUT, route, url, Some(body), authenticated)
    }

    pub fn delete(&self, route: Route, endpoint: &str, authenticated: bool) -> bool {
        let Some(url) = self.compose(endpoint, &[]) else {
            return false;
        };
        self.send(Method::DELETE, route, url, None, authenticated)
    }

    /// POSTs to an absolute URL instead of one relative to the server.
    pub fn post_url(&self, route: Route, url: &str, body: Vec<u8>, authenticated: bool) -> bool {
        let Some(url) = validate_url(url) else {
            return false;
        };
        self.send(Method::POST, route, url, Some(body), authenticated)
    }

    fn compose(&self, endpoint: &str, query: &[(&str, &str)]) -> Option<Url> {
        let server = self.snapshot.load().server.clone();
        let mut url = validate_url(&format!("{server}{endpoint}"))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Some(url)
    }

    fn send(
        &self,
        method: Method,
        route: Route,
        url: Url,
        body: Option<Vec<u8>>,
        authenticated: bool,
    ) -> bool {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("{} {} rejected: no async runtime available", method, url);
            return false;
        };

        tracing::debug!("{} {}", method, url);
        let snapshot = self.snapshot.load();
        let request = OutgoingRequest {
            meta: RequestMeta {
                route,
                method,
                url,
                authenticated,
            },
            headers: snapshot.template(authenticated).headers().clone(),
            body,
            verify_ssl: snapshot.verify_ssl,
        };

        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let transport = Arc::clone(&self.transport);
        let replies = self.replies.clone();
        runtime.spawn(async move {
            let meta = request.meta.clone();
            let reply = match transport.execute(request).await {
                Ok(response) => Reply::from_response(meta, response),
                Err(error) => Reply::failed(meta, error),
            };
            if replies.send(reply).is_err() {
                tracing::debug!("Reply dropped: receiver closed");
            }
        });
        true
    }
}

fn validate_url(raw: &str) -> Option<Url> {
    match Url::parse(raw) {
        Ok(url) if !url.scheme().is_empty() && url.host_str().is_some_and(|h| !h.is_empty()) => {
            Some(url)
        }
        Ok(url) => {
            tracing::warn!("URL not valid for dispatch: {}", url);
            None
        }
        Err(error) => {
            tracing::warn!("URL not valid for dispatch '{}': {}", raw, error);
            None
        }
    }
}

/// Receiving half of the dispatcher's completion channel.
#[derive(Debug)]
pub struct ReplyReceiver {
    receiver: mpsc::UnboundedReceiver<Reply>,
    in_flight: Arc<AtomicUsize>,
}

impl ReplyReceiver {
    /// Waits for the next completion and marks it as no longer in flight.
    pub async fn recv(&mut self) -> Option<Reply> {
        let reply = self.receiver.recv().await?;
        self.settle();
        Some(reply)
    }

    pub fn try_recv(&mut self) -> Option<Reply> {
        let reply = self.receiver.try_recv().ok()?;
        self.settle();
        Some(reply)
    }

    fn settle(&self) {
        let _ = self
            .in_flight
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| {
                count.checked_sub(1)
            });
    }
}
