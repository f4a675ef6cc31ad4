//! Login Flow v2: obtain an app password by having the user authorize this
//! client in a browser while the engine polls for completion.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::events::{ApiEvent, EventBus};
use crate::transport::{Dispatcher, Reply, Route};

pub const LOGIN_FLOW_ENDPOINT: &str = "/index.php/login/v2";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoginStatus {
    #[default]
    Unknown,
    Initiating,
    Polling,
    Succeeded,
    Failed,
}

impl LoginStatus {
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Initiating | Self::Polling)
    }
}

/// Credentials handed back by the server once the user authorized the flow.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginCredentials {
    pub server: String,
    pub login_name: String,
    pub app_password: String,
}

impl fmt::Debug for LoginCredentials {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("LoginCredentials")
            .field("server", &self.server)
            .field("login_name", &self.login_name)
            .field("app_password", &"[REDACTED]")
            .finish()
    }
}

#[derive(Deserialize)]
struct InitiateResponse {
    login: String,
    poll: PollTarget,
}

#[derive(Deserialize)]
struct PollTarget {
    token: String,
    endpoint: String,
}

struct Session {
    login_url: String,
    poll_url: String,
    poll_token: String,
}

/// State machine for one login attempt at a time.
pub struct LoginFlow {
    status: LoginStatus,
    attempt: u64,
    session: Option<Session>,
    timer: Option<Interval>,
    poll_interval: Duration,
    dispatcher: Dispatcher,
    events: EventBus,
}

impl fmt::Debug for LoginFlow {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("LoginFlow")
            .field("status", &self.status)
            .field("login_url", &self.login_url())
            .field("polling", &self.timer.is_some())
            .finish_non_exhaustive()
    }
}

impl LoginFlow {
    pub fn new(dispatcher: Dispatcher, events: EventBus, poll_interval: Duration) -> Self {
        Self {
            status: LoginStatus::Unknown,
            attempt: 0,
            session: None,
            timer: None,
            poll_interval,
            dispatcher,
            events,
        }
    }

    pub const fn status(&self) -> LoginStatus {
        self.status
    }

    /// URL the user has to open to authorize this client.
    pub fn login_url(&self) -> Option<&str> {
        self.session
            .as_ref()
            .map(|session| session.login_url.as_str())
            .filter(|url| !url.is_empty())
    }

    pub const fn is_polling(&self) -> bool {
        self.timer.is_some()
    }

    pub fn initiate(&mut self) -> bool {
        if self.status.is_active() {
            self.abort();
        }
        self.attempt = self.attempt.wrapping_add(1);
        let route = Route::LoginFlowInitiate {
            attempt: self.attempt,
        };
        if self.dispatcher.post(route, LOGIN_FLOW_ENDPOINT, Vec::new(), false) {
            self.set_status(LoginStatus::Initiating);
            return true;
        }
        self.set_status(LoginStatus::Failed);
        self.abort();
        false
    }

    /// Sends one poll request for the live session.
    pub fn poll(&mut self) -> bool {
        let accepted = self.session.as_ref().is_some_and(|session| {
            let body = format!("token={}", urlencoding::encode(&session.poll_token));
            self.dispatcher.post_url(
                Route::LoginFlowPoll {
                    token: session.poll_token.clone(),
                },
                &session.poll_url,
                body.into_bytes(),
                false,
            )
        });
        if accepted {
            self.set_status(LoginStatus::Polling);
            return true;
        }
        self.set_status(LoginStatus::Failed);
        self.abort();
        false
    }

    /// Stops polling and forgets the session. Safe to call repeatedly.
    pub fn abort(&mut self) {
        self.timer = None;
        self.clear_session();
        self.set_status(LoginStatus::Unknown);
    }

    /// Resolves when the poll timer fires; never resolves while not polling.
    pub async fn poll_due(&mut self) {
        match self.timer.as_mut() {
            Some(timer) => {
                timer.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }

    /// Only the reply to the latest initiation counts, and only while it is
    /// still awaited.
    pub fn handle_initiate_reply(&mut self, reply: &Reply) {
        let Route::LoginFlowInitiate { attempt } = reply.meta.route else {
            return;
        };
        if attempt != self.attempt {
            tracing::debug!("Ignoring reply to a superseded login flow initiation");
            return;
        }
        if self.status != LoginStatus::Initiating {
            tracing::debug!("Ignoring login flow reply in state {:?}", self.status);
            return;
        }
        if let Some(error) = &reply.error {
            tracing::warn!("Login flow initiation failed: {}", error);
            self.fail();
            return;
        }
        let response = match reply.json::<InitiateResponse>() {
            Ok(response) => response,
            Err(error) => {
                tracing::warn!("Login flow initiation reply not usable: {}", error);
                self.fail();
                return;
            }
        };
        if response.login.is_empty() || response.poll.endpoint.is_empty() {
            tracing::warn!("Login flow initiation reply is missing the login or poll URL");
            self.fail();
            return;
        }
        if tokio::runtime::Handle::try_current().is_err() {
            tracing::warn!("Cannot start login polling without an async runtime");
            self.fail();
            return;
        }

        let mut timer =
            tokio::time::interval_at(Instant::now() + self.poll_interval, self.poll_interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.timer = Some(timer);

        tracing::info!("Login flow started, waiting for authorization");
        self.events
            .emit(ApiEvent::LoginUrlChanged(Some(response.login.clone())));
        self.session = Some(Session {
            login_url: response.login,
            poll_url: response.poll.endpoint,
            poll_token: response.poll.token,
        });
    }

    /// Returns the credentials when the flow completed with this reply.
    pub fn handle_poll_reply(&mut self, reply: &Reply) -> Option<LoginCredentials> {
        let Route::LoginFlowPoll { token } = &reply.meta.route else {
            return None;
        };
        let live = self
            .session
            .as_ref()
            .is_some_and(|session| session.poll_token == *token);
        if !live {
            tracing::debug!("Ignoring poll reply for a session that is no longer active");
            return None;
        }

        if reply.status == Some(404) {
            tracing::debug!("Login flow not authorized yet");
            return None;
        }
        if let Some(error) = &reply.error {
            tracing::warn!("Login flow poll failed: {}", error);
            self.fail();
            return None;
        }
        match reply.json::<LoginCredentials>() {
            Ok(credentials) => {
                tracing::info!("Login flow succeeded for {}", credentials.login_name);
                self.timer = None;
                self.clear_session();
                self.set_status(LoginStatus::Succeeded);
                Some(credentials)
            }
            Err(error) => {
                tracing::warn!("Login flow poll reply not usable: {}", error);
                self.fail();
                None
            }
        }
    }

    fn fail(&mut self) {
        self.timer = None;
        self.clear_session();
        self.set_status(LoginStatus::Failed);
    }

    fn clear_session(&mut self) {
        if self.session.take().is_some() {
            self.events.emit(ApiEvent::LoginUrlChanged(None));
        }
    }

    fn set_status(&mut self, status: LoginStatus) {
        if status != self.status {
            self.status = status;
            self.events.emit(ApiEvent::LoginStatusChanged(status));
        }
    }
}
