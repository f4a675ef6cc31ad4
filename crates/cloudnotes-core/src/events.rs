//! Typed change notifications.
//!
//! Every event is emitted only after an explicit equality check on the state
//! it describes, so subscribers never see a notification for a no-op.

use tokio::sync::broadcast;

use crate::error::ApiErrorKind;
use crate::login::LoginStatus;
use crate::status::{CapabilitiesStatus, NextcloudStatus};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// A state change or diagnostic raised by the API service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiEvent {
    SchemeChanged(String),
    HostChanged(String),
    PortChanged(Option<u16>),
    UsernameChanged(String),
    /// The password changed; the value itself is never broadcast.
    PasswordChanged,
    PathChanged(String),
    ServerChanged(String),
    /// Full URL with the password redacted.
    UrlChanged(String),
    VerifySslChanged(bool),
    StatusChanged(NextcloudStatus),
    CapabilitiesStatusChanged(CapabilitiesStatus),
    LoginStatusChanged(LoginStatus),
    LoginUrlChanged(Option<String>),
    LoginVerified { valid: bool },
    Error(ApiErrorKind),
    SslError { url: String, message: String },
    AuthenticationRequired { url: String },
}

/// Fan-out of [`ApiEvent`]s to any number of subscribers.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ApiEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ApiEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: ApiEvent) {
        // No subscribers is not an error.
        let _ = self.sender.send(event);
    }
}

/// Drains every event currently buffered in `receiver`.
pub fn drain_events(receiver: &mut broadcast::Receiver<ApiEvent>) -> Vec<ApiEvent> {
    let mut events = Vec::new();
    loop {
        match receiver.try_recv() {
            Ok(event) => events.push(event),
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                tracing::warn!("Event subscriber lagged, {} events skipped", skipped);
            }
            Err(_) => break,
        }
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_without_subscribers_is_silent() {
        let bus = EventBus::new();
        bus.emit(ApiEvent::VerifySslChanged(false));
    }

    #[test]
    fn subscribers_receive_events_in_order() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe();
        bus.emit(ApiEvent::HostChanged("cloud.example.com".to_string()));
        bus.emit(ApiEvent::PortChanged(Some(8443)));

        assert_eq!(
            drain_events(&mut receiver),
            vec![
                ApiEvent::HostChanged("cloud.example.com".to_string()),
                ApiEvent::PortChanged(Some(8443)),
            ]
        );
    }
}
