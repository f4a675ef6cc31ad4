//! `NotesClient` ties the API service, the notes app and the reply stream
//! together and drives them from one task.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::api::NextcloudApi;
use crate::config::ApiConfig;
use crate::error::Result;
use crate::events::ApiEvent;
use crate::notes::NotesApp;
use crate::transport::{HttpTransport, Reply, ReplyReceiver, Route};

/// What a call to [`NotesClient::process_next`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    /// A reply for the given route was applied.
    Reply(Route),
    /// The login poll timer fired and a poll was dispatched (or rejected).
    Polled { accepted: bool },
    /// No more replies can arrive.
    Closed,
}

#[derive(Debug)]
pub struct NotesClient {
    api: NextcloudApi,
    notes: NotesApp,
    replies: ReplyReceiver,
}

impl NotesClient {
    pub fn new(config: ApiConfig) -> Result<Self> {
        let (api, replies) = NextcloudApi::new(config)?;
        Ok(Self::assemble(api, replies))
    }

    pub fn with_transport(config: ApiConfig, transport: Arc<dyn HttpTransport>) -> Result<Self> {
        let (api, replies) = NextcloudApi::with_transport(config, transport)?;
        Ok(Self::assemble(api, replies))
    }

    fn assemble(api: NextcloudApi, replies: ReplyReceiver) -> Self {
        let notes = NotesApp::new(api.dispatcher().clone());
        Self {
            api,
            notes,
            replies,
        }
    }

    pub const fn api(&self) -> &NextcloudApi {
        &self.api
    }

    pub fn api_mut(&mut self) -> &mut NextcloudApi {
        &mut self.api
    }

    pub const fn notes(&self) -> &NotesApp {
        &self.notes
    }

    pub fn notes_mut(&mut self) -> &mut NotesApp {
        &mut self.notes
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ApiEvent> {
        self.api.subscribe()
    }

    pub fn running_requests(&self) -> usize {
        self.api.running_requests()
    }

    /// Waits for the next reply or login poll tick and handles it.
    pub async fn process_next(&mut self) -> Progress {
        tokio::select! {
            biased;
            reply = self.replies.recv() => match reply {
                Some(reply) => {
                    let route = reply.meta.route.clone();
                    self.route(&reply);
                    Progress::Reply(route)
                }
                None => Progress::Closed,
            },
            () = self.api.poll_due() => Progress::Polled {
                accepted: self.api.poll_login(),
            },
        }
    }

    /// Handles replies until no request is in flight.
    pub async fn wait_idle(&mut self) {
        while self.running_requests() > 0 {
            match self.replies.recv().await {
                Some(reply) => self.route(&reply),
                None => break,
            }
        }
    }

    fn route(&mut self, reply: &Reply) {
        self.api.report_error(reply);
        match reply.meta.route {
            Route::Notes => self.notes.update_reply(reply),
            _ => self.api.handle_reply(reply),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use reqwest::Method;

    use super::*;
    use crate::login::{LoginStatus, LOGIN_FLOW_ENDPOINT};
    use crate::models::Note;
    use crate::notes::NOTES_ENDPOINT;
    use crate::transport::ScriptedTransport;

    fn client(transport: &Arc<ScriptedTransport>) -> NotesClient {
        let config = ApiConfig {
            hostname: "testhost".to_string(),
            poll_interval: Duration::from_secs(5),
            ..ApiConfig::default()
        };
        NotesClient::with_transport(config, transport.clone()).unwrap()
    }

    #[tokio::test]
    async fn test_wait_idle_merges_note_listing() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(
            Method::GET,
            NOTES_ENDPOINT,
            200,
            r#"[{"id": 1, "content": "one"}, {"id": 2, "content": "two"}]"#,
        );
        let mut client = client(&transport);
        client
            .api_mut()
            .endpoint_mut()
            .set_url("https://alice:pw@cloud.example.com");
        client.notes_mut().create_note(Note::new("one"), true);
        client.notes_mut().create_note(Note::new("two"), true);

        assert!(client.notes().get_all_notes::<&str>(&[]));
        client.wait_idle().await;

        assert_eq!(client.running_requests(), 0);
        let ids: Vec<_> = client.notes().notes().iter().map(Note::id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_process_next_routes_by_request() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(Method::GET, "/status.php", 200, r#"{"installed": true}"#);
        let mut client = client(&transport);
        client.api_mut().endpoint_mut().set_url("https://cloud.example.com");

        assert!(client.api_mut().get_status());
        assert_eq!(client.process_next().await, Progress::Reply(Route::Status));
        assert!(client.api().status().snapshot().installed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_polls_on_timer_until_authorized() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(
            Method::POST,
            LOGIN_FLOW_ENDPOINT,
            200,
            r#"{"poll": {"token": "t", "endpoint": "https://cloud.example.com/login/v2/poll"},
                "login": "https://cloud.example.com/login/v2/flow/1"}"#,
        );
        transport.respond_once(Method::POST, "/login/v2/poll", 404, "");
        transport.respond(
            Method::POST,
            "/login/v2/poll",
            200,
            r#"{"server": "https://cloud.example.com", "loginName": "bob", "appPassword": "pw"}"#,
        );
        let mut client = client(&transport);
        client.api_mut().endpoint_mut().set_url("https://cloud.example.com");

        assert!(client.api_mut().initiate_login());
        let mut polls = 0;
        while client.api().login_status() != LoginStatus::Succeeded {
            if let Progress::Polled { accepted } = client.process_next().await {
                assert!(accepted);
                polls += 1;
            }
            assert!(polls <= 2, "login should finish on the second poll");
        }

        assert_eq!(polls, 2);
        assert_eq!(client.api().endpoint().endpoint().username, "bob");
        assert!(!client.api().login().is_polling());
    }
}
