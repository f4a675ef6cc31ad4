//! The Nextcloud API service: endpoint state, dispatch, login and status.

use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::broadcast;

use crate::config::ApiConfig;
use crate::endpoint::EndpointState;
use crate::error::Result;
use crate::events::{ApiEvent, EventBus};
use crate::login::{LoginCredentials, LoginFlow, LoginStatus};
use crate::status::{ocs_data, StatusTracker};
use crate::transport::{
    Dispatcher, HttpTransport, Reply, ReplyReceiver, ReqwestTransport, Route, TransportError,
};

pub const USER_ENDPOINT: &str = "/ocs/v2.php/cloud/users";
pub const GET_APP_PASSWORD_ENDPOINT: &str = "/ocs/v2.php/core/getapppassword";
pub const DELETE_APP_PASSWORD_ENDPOINT: &str = "/ocs/v2.php/core/apppassword";

#[derive(Deserialize)]
struct AppPasswordData {
    apppassword: String,
}

/// Explicitly constructed service shared by every app built on top of it.
#[derive(Debug)]
pub struct NextcloudApi {
    config: ApiConfig,
    endpoint: EndpointState,
    dispatcher: Dispatcher,
    login: LoginFlow,
    status: StatusTracker,
    events: EventBus,
}

impl NextcloudApi {
    /// Creates the service on top of a `reqwest` transport.
    pub fn new(config: ApiConfig) -> Result<(Self, ReplyReceiver)> {
        let config = config.validated()?;
        let transport = Arc::new(ReqwestTransport::new(config.request_timeout)?);
        Self::with_transport(config, transport)
    }

    pub fn with_transport(
        config: ApiConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<(Self, ReplyReceiver)> {
        let config = config.validated()?;
        let events = EventBus::new();
        let endpoint = EndpointState::new(config.user_agent(), config.verify_ssl, events.clone());
        let (dispatcher, replies) = Dispatcher::new(transport, endpoint.shared_snapshot());
        let login = LoginFlow::new(dispatcher.clone(), events.clone(), config.poll_interval);
        let status = StatusTracker::new(dispatcher.clone(), events.clone());

        tracing::debug!("API service created for {}", config.user_agent());
        Ok((
            Self {
                config,
                endpoint,
                dispatcher,
                login,
                status,
                events,
            },
            replies,
        ))
    }

    pub const fn config(&self) -> &ApiConfig {
        &self.config
    }

    pub const fn endpoint(&self) -> &EndpointState {
        &self.endpoint
    }

    /// Setters for server and credentials live on [`EndpointState`].
    pub fn endpoint_mut(&mut self) -> &mut EndpointState {
        &mut self.endpoint
    }

    pub const fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub const fn login(&self) -> &LoginFlow {
        &self.login
    }

    pub const fn status(&self) -> &StatusTracker {
        &self.status
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ApiEvent> {
        self.events.subscribe()
    }

    pub fn running_requests(&self) -> usize {
        self.dispatcher.running_requests()
    }

    pub fn get_status(&mut self) -> bool {
        self.status.get_status()
    }

    pub fn get_capabilities(&mut self) -> bool {
        self.status.get_capabilities()
    }

    pub fn initiate_login(&mut self) -> bool {
        self.login.initiate()
    }

    pub fn poll_login(&mut self) -> bool {
        self.login.poll()
    }

    pub fn abort_login(&mut self) {
        self.login.abort();
    }

    pub const fn login_status(&self) -> LoginStatus {
        self.login.status()
    }

    /// Resolves whenever the login poll timer fires.
    pub async fn poll_due(&mut self) {
        self.login.poll_due().await;
    }

    /// Checks that the stored credentials are accepted by the server.
    pub fn verify_login(&self) -> bool {
        let username = &self.endpoint.endpoint().username;
        let endpoint = format!("{USER_ENDPOINT}/{}", urlencoding::encode(username));
        self.dispatcher
            .get(Route::VerifyLogin, &endpoint, &[("format", "json")], true)
    }

    /// Trades the current password for a server-issued app password.
    pub fn get_app_password(&self) -> bool {
        self.dispatcher.get(
            Route::GetAppPassword,
            GET_APP_PASSWORD_ENDPOINT,
            &[("format", "json")],
            true,
        )
    }

    /// Revokes the app password currently used as credential.
    pub fn delete_app_password(&self) -> bool {
        self.dispatcher
            .delete(Route::DeleteAppPassword, DELETE_APP_PASSWORD_ENDPOINT, true)
    }

    /// Emits the error events a failed reply warrants.
    pub fn report_error(&self, reply: &Reply) {
        let Some(error) = &reply.error else {
            return;
        };
        if matches!(reply.meta.route, Route::LoginFlowPoll { .. }) && reply.status == Some(404) {
            return;
        }

        tracing::warn!(
            "{} {} failed: {}",
            reply.meta.method,
            reply.meta.url,
            error
        );
        match error {
            TransportError::Tls(message) => self.events.emit(ApiEvent::SslError {
                url: reply.meta.url.to_string(),
                message: message.clone(),
            }),
            TransportError::Http { status: 401 } => {
                self.events.emit(ApiEvent::AuthenticationRequired {
                    url: reply.meta.url.to_string(),
                });
            }
            _ => {}
        }
        self.events.emit(ApiEvent::Error(error.kind()));
    }

    /// Applies a reply to the service state. Notes replies are not handled
    /// here.
    pub fn handle_reply(&mut self, reply: &Reply) {
        match &reply.meta.route {
            Route::Status => self.status.handle_status_reply(reply),
            Route::Capabilities => self.status.handle_capabilities_reply(reply),
            Route::LoginFlowInitiate { .. } => self.login.handle_initiate_reply(reply),
            Route::LoginFlowPoll { .. } => {
                if let Some(credentials) = self.login.handle_poll_reply(reply) {
                    self.apply_credentials(&credentials);
                }
            }
            Route::VerifyLogin => {
                let valid = reply.is_success();
                tracing::info!("Login verification: {}", if valid { "valid" } else { "invalid" });
                self.events.emit(ApiEvent::LoginVerified { valid });
            }
            Route::GetAppPassword => {
                if reply.is_success() {
                    if let Some(data) = ocs_data::<AppPasswordData>(reply) {
                        self.endpoint.set_password(&data.apppassword);
                    }
                }
            }
            Route::DeleteAppPassword => {
                if reply.is_success() {
                    self.endpoint.set_password("");
                }
            }
            Route::Notes => {
                tracing::debug!("Notes reply reached the API service; ignoring");
            }
        }
    }

    fn apply_credentials(&mut self, credentials: &LoginCredentials) {
        self.endpoint.set_server(&credentials.server);
        self.endpoint.set_username(&credentials.login_name);
        self.endpoint.set_password(&credentials.app_password);
    }
}
