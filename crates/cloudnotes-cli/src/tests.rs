use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use cloudnotes_core::login::LOGIN_FLOW_ENDPOINT;
use cloudnotes_core::notes::NOTES_ENDPOINT;
use cloudnotes_core::transport::{Method, ScriptedTransport};
use cloudnotes_core::{ApiConfig, ApiErrorKind, Note, NotesClient};
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::cli::CompletionShell;
use crate::commands::add::create_remote_note;
use crate::commands::auth_cmd::{login_flow, revoke_app_password, verify_credentials};
use crate::commands::capabilities::{fetch_notes_capabilities, format_capability_lines};
use crate::commands::common::{
    client_config, configure_client, default_editor, format_note_lines, format_relative_time,
    normalize_content, note_preview, note_to_list_item, settle,
};
use crate::commands::completions::run_completions;
use crate::commands::config::{merge_profile, normalize_server_url};
use crate::commands::delete::delete_remote_note;
use crate::commands::edit::update_remote_note;
use crate::commands::get::fetch_note;
use crate::commands::list::fetch_notes;
use crate::commands::status::{fetch_status, format_status_lines};
use crate::config_profiles::CliProfile;
use crate::error::CliError;

const SERVER: &str = "https://cloud.example.com";

#[test]
fn normalize_content_trims_and_rejects_empty() {
    assert_eq!(normalize_content("   "), None);
    assert_eq!(normalize_content("  hello  "), Some("hello".to_string()));
}

#[test]
fn normalize_content_keeps_multiline_text() {
    assert_eq!(
        normalize_content("\nfirst line\nsecond line\n"),
        Some("first line\nsecond line".to_string())
    );
}

#[test]
fn default_editor_is_defined() {
    assert!(!default_editor().is_empty());
}

#[test]
fn format_relative_time_units() {
    let now = 10_000_000_000;
    assert_eq!(format_relative_time(now - 30_000, now), "just now");
    assert_eq!(format_relative_time(now - 5 * 60_000, now), "5m ago");
    assert_eq!(format_relative_time(now - 3 * 3_600_000, now), "3h ago");
    assert_eq!(format_relative_time(now - 2 * 86_400_000, now), "2d ago");
}

#[test]
fn note_preview_truncates_with_ellipsis() {
    let note = Note::new("This   is a long\nsecond line");
    assert_eq!(note_preview(&note, 40), "This is a long");
    assert_eq!(note_preview(&note, 10), "This is...");
}

#[test]
fn note_preview_prefers_title() {
    let note: Note =
        serde_json::from_value(json!({"id": 1, "title": "Groceries", "content": "milk"})).unwrap();
    assert_eq!(note_preview(&note, 40), "Groceries");
}

#[test]
fn format_note_lines_show_id_favorite_and_category() {
    let notes: Vec<Note> = serde_json::from_value(json!([
        {"id": 12, "title": "Recipes", "category": "Kitchen", "favorite": true},
        {"id": 3, "title": "Plain"}
    ]))
    .unwrap();

    let lines = format_note_lines(&notes);
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("      12 * Recipes"));
    assert!(lines[0].ends_with("[Kitchen]"));
    assert!(lines[1].starts_with("       3   Plain"));
}

#[test]
fn note_to_list_item_reads_modified_seconds() {
    let note: Note =
        serde_json::from_value(json!({"id": 5, "title": "Todo", "modified": 1_700_000_000}))
            .unwrap();
    let item = note_to_list_item(&note);
    assert_eq!(item.id, 5);
    assert_eq!(item.title, "Todo");
    assert_eq!(item.modified, Some(1_700_000_000));
    assert!(!item.favorite);
}

#[test]
fn normalize_server_url_requires_http_scheme() {
    assert!(normalize_server_url("cloud.example.com").is_err());
    assert_eq!(
        normalize_server_url(" https://cloud.example.com/nc/ ").unwrap(),
        "https://cloud.example.com/nc"
    );
}

#[test]
fn merge_profile_keeps_existing_values() {
    let existing = CliProfile {
        server_url: Some(SERVER.to_string()),
        username: Some("alice".to_string()),
        verify_ssl: None,
    };

    let merged = merge_profile(&existing, None, None, true).unwrap();
    assert_eq!(merged.server_url(), Some(SERVER.to_string()));
    assert_eq!(merged.username(), Some("alice".to_string()));
    assert!(!merged.verify_ssl());

    let merged = merge_profile(&existing, Some("http://10.0.0.2/".into()), None, false).unwrap();
    assert_eq!(merged.server_url(), Some("http://10.0.0.2".to_string()));
    assert!(merged.verify_ssl());
}

#[test]
fn merge_profile_requires_server() {
    let result = merge_profile(&CliProfile::default(), None, Some("alice".into()), false);
    assert!(matches!(result, Err(CliError::Config(_))));
}

#[test]
fn format_status_lines_flag_maintenance() {
    let snapshot = cloudnotes_core::StatusSnapshot {
        installed: true,
        maintenance: true,
        version_string: "28.0.1".to_string(),
        product_name: "Nextcloud".to_string(),
        ..Default::default()
    };
    assert_eq!(
        format_status_lines(SERVER, &snapshot),
        vec![
            format!("Nextcloud 28.0.1 at {SERVER}"),
            "Maintenance mode is enabled".to_string(),
        ]
    );
}

#[tokio::test]
async fn fetch_notes_lists_server_notes_without_content() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond(
        Method::GET,
        NOTES_ENDPOINT,
        200,
        r#"[{"id": 1, "title": "One"}, {"id": 2, "title": "Two"}]"#,
    );
    let mut client = scripted_client(&transport);

    let notes = fetch_notes(&mut client).await.unwrap();

    let ids: Vec<_> = notes.iter().map(Note::id).collect();
    assert_eq!(ids, vec![1, 2]);
    let request = &transport.requests()[0];
    assert_eq!(
        request.url,
        format!("{SERVER}{NOTES_ENDPOINT}?exclude=content")
    );
    assert!(request
        .authorization
        .as_deref()
        .is_some_and(|value| value.starts_with("Basic ")));
}

#[tokio::test]
async fn fetch_note_returns_server_copy() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond(
        Method::GET,
        &format!("{NOTES_ENDPOINT}/7"),
        200,
        r#"{"id": 7, "content": "seven"}"#,
    );
    let mut client = scripted_client(&transport);

    let note = fetch_note(&mut client, 7).await.unwrap();
    assert_eq!(note.content(), Some("seven"));
}

#[tokio::test]
async fn fetch_note_surfaces_missing_note_as_error() {
    let transport = Arc::new(ScriptedTransport::new());
    let mut client = scripted_client(&transport);

    let result = fetch_note(&mut client, 99).await;
    assert!(matches!(
        result,
        Err(CliError::Api(ApiErrorKind::CommunicationError))
    ));
}

#[tokio::test]
async fn fetch_note_rejects_unassigned_id() {
    let transport = Arc::new(ScriptedTransport::new());
    let mut client = scripted_client(&transport);

    assert!(matches!(
        fetch_note(&mut client, 0).await,
        Err(CliError::NoteNotFound(0))
    ));
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn create_remote_note_returns_assigned_id() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond(
        Method::POST,
        NOTES_ENDPOINT,
        200,
        r#"{"id": 41, "content": "hello", "title": "hello"}"#,
    );
    let mut client = scripted_client(&transport);

    let note = create_remote_note(&mut client, "hello").await.unwrap();

    assert_eq!(note.id(), 41);
    assert_eq!(client.notes().notes().len(), 1);
    let request = &transport.requests()[0];
    assert_eq!(request.method, Method::POST);
    assert_eq!(request.body_json(), Some(json!({"content": "hello"})));
}

#[tokio::test]
async fn update_remote_note_sends_new_content() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond(
        Method::GET,
        &format!("{NOTES_ENDPOINT}/3"),
        200,
        r#"{"id": 3, "content": "old", "title": "old"}"#,
    );
    transport.respond(
        Method::PUT,
        &format!("{NOTES_ENDPOINT}/3"),
        200,
        r#"{"id": 3, "content": "new", "title": "new"}"#,
    );
    let mut client = scripted_client(&transport);

    let note = fetch_note(&mut client, 3).await.unwrap();
    let updated = update_remote_note(&mut client, note, "new").await.unwrap();

    assert_eq!(updated.content(), Some("new"));
    assert_eq!(updated.title(), Some("new"));
    let put = transport
        .requests()
        .into_iter()
        .find(|request| request.method == Method::PUT)
        .unwrap();
    assert_eq!(
        put.body_json(),
        Some(json!({"id": 3, "content": "new", "title": "old"}))
    );
}

#[tokio::test]
async fn delete_remote_note_sends_delete() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond(Method::DELETE, &format!("{NOTES_ENDPOINT}/8"), 200, "");
    let mut client = scripted_client(&transport);

    delete_remote_note(&mut client, 8).await.unwrap();

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, Method::DELETE);
    assert_eq!(requests[0].url, format!("{SERVER}{NOTES_ENDPOINT}/8"));
}

#[tokio::test]
async fn settle_reports_rejected_credentials() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond(Method::GET, NOTES_ENDPOINT, 401, "");
    let mut client = scripted_client(&transport);

    let result = fetch_notes(&mut client).await;
    assert!(matches!(
        result,
        Err(CliError::Api(ApiErrorKind::AuthenticationError))
    ));
}

#[tokio::test]
async fn settle_is_ok_without_requests() {
    let transport = Arc::new(ScriptedTransport::new());
    let mut client = scripted_client(&transport);
    let mut events = client.subscribe();

    settle(&mut client, &mut events).await.unwrap();
}

#[tokio::test]
async fn fetch_status_reads_snapshot() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond(
        Method::GET,
        "/status.php",
        200,
        r#"{"installed": true, "maintenance": false, "needsDbUpgrade": false,
            "version": "28.0.1.1", "versionstring": "28.0.1", "productname": "Nextcloud"}"#,
    );
    let mut client = scripted_client(&transport);

    let snapshot = fetch_status(&mut client).await.unwrap();

    assert!(snapshot.installed);
    assert_eq!(snapshot.version_string, "28.0.1");
    assert_eq!(
        snapshot.parsed_version().map(|version| version.major()),
        Some(28)
    );
}

#[tokio::test]
async fn fetch_notes_capabilities_reads_api_versions() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond(
        Method::GET,
        "/ocs/v2.php/cloud/capabilities",
        200,
        r#"{"ocs": {"meta": {"status": "ok"}, "data": {"capabilities":
            {"notes": {"api_version": ["1.3", "0.2"], "version": "4.8.1"}}}}}"#,
    );
    let mut client = scripted_client(&transport);

    let notes = fetch_notes_capabilities(&mut client).await.unwrap().unwrap();

    assert_eq!(
        format_capability_lines(&notes),
        vec![
            "Notes app version: 4.8.1".to_string(),
            "API versions: 1.3, 0.2".to_string(),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn login_flow_reports_url_and_returns_credentials() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond(
        Method::POST,
        LOGIN_FLOW_ENDPOINT,
        200,
        r#"{"poll": {"token": "tok", "endpoint": "https://cloud.example.com/login/v2/poll"},
            "login": "https://cloud.example.com/login/v2/flow/abc"}"#,
    );
    transport.respond_once(Method::POST, "/login/v2/poll", 404, "");
    transport.respond(
        Method::POST,
        "/login/v2/poll",
        200,
        r#"{"server": "https://cloud.example.com", "loginName": "bob", "appPassword": "app-secret"}"#,
    );
    let mut client = anonymous_client(&transport);

    let mut login_urls = Vec::new();
    let outcome = login_flow(&mut client, |url| login_urls.push(url.to_string()))
        .await
        .unwrap();

    assert_eq!(
        login_urls,
        vec!["https://cloud.example.com/login/v2/flow/abc".to_string()]
    );
    assert_eq!(outcome.server, SERVER);
    assert_eq!(outcome.username, "bob");
    assert_eq!(outcome.app_password, "app-secret");
}

#[tokio::test]
async fn login_flow_fails_when_server_refuses() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond(Method::POST, LOGIN_FLOW_ENDPOINT, 500, "");
    let mut client = anonymous_client(&transport);

    let result = login_flow(&mut client, |_| {}).await;
    assert!(matches!(result, Err(CliError::Login(_))));
}

#[tokio::test]
async fn verify_credentials_checks_user_endpoint() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond(Method::GET, "/ocs/v2.php/cloud/users/alice", 200, "{}");
    let mut client = scripted_client(&transport);

    assert!(verify_credentials(&mut client).await);
}

#[tokio::test]
async fn revoke_app_password_clears_client_password() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond(Method::DELETE, "/ocs/v2.php/core/apppassword", 200, "{}");
    let mut client = scripted_client(&transport);

    revoke_app_password(&mut client).await.unwrap();
    assert_eq!(client.api().endpoint().endpoint().password, "");
}

#[test]
fn run_completions_writes_bash_script_file() {
    let path = unique_test_path("completions.bash");
    run_completions(CompletionShell::Bash, Some(&path)).unwrap();

    let script = std::fs::read_to_string(&path).unwrap();
    assert!(script.contains("cloudnotes"));

    let _ = std::fs::remove_file(path);
}

fn test_config() -> ApiConfig {
    ApiConfig {
        hostname: "testhost".to_string(),
        ..client_config()
    }
}

fn scripted_client(transport: &Arc<ScriptedTransport>) -> NotesClient {
    let mut client = NotesClient::with_transport(test_config(), transport.clone()).unwrap();
    let profile = CliProfile {
        server_url: Some(SERVER.to_string()),
        username: Some("alice".to_string()),
        verify_ssl: None,
    };
    configure_client(&mut client, &profile, Some("app-pw")).unwrap();
    client
}

fn anonymous_client(transport: &Arc<ScriptedTransport>) -> NotesClient {
    let mut client = NotesClient::with_transport(test_config(), transport.clone()).unwrap();
    let profile = CliProfile {
        server_url: Some(SERVER.to_string()),
        ..CliProfile::default()
    };
    configure_client(&mut client, &profile, None).unwrap();
    client
}

fn unique_test_path(suffix: &str) -> PathBuf {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!(
        "cloudnotes-cli-test-{}-{now}-{seq}-{suffix}",
        std::process::id()
    ))
}
