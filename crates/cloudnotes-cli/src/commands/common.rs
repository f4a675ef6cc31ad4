use std::env;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::Utc;
use cloudnotes_core::events::drain_events;
use cloudnotes_core::{ApiConfig, ApiEvent, Note, NotesClient};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::auth::load_app_password;
use crate::config_profiles::{CliProfile, CliProfilesConfig};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct NoteListItem {
    pub id: i64,
    pub title: String,
    pub category: String,
    pub favorite: bool,
    pub modified: Option<i64>,
    pub relative_time: String,
}

/// Identity the CLI announces in its `User-Agent`.
pub fn client_config() -> ApiConfig {
    ApiConfig::for_app("cloudnotes", env!("CARGO_PKG_VERSION"))
}

/// Loads the profile config and resolves which profile a command acts on.
pub fn load_profile(explicit: Option<&str>) -> Result<(CliProfilesConfig, String), CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(explicit);
    Ok((config, profile_name))
}

/// Builds a client for a logged-in profile.
pub fn open_client(explicit_profile: Option<&str>) -> Result<NotesClient, CliError> {
    let (config, profile_name) = load_profile(explicit_profile)?;
    let profile = config
        .profile(&profile_name)
        .ok_or_else(|| CliError::NotLoggedIn(profile_name.clone()))?;
    let password = load_app_password(&profile_name)?
        .ok_or_else(|| CliError::NotLoggedIn(profile_name.clone()))?;
    if profile.username().is_none() {
        return Err(CliError::NotLoggedIn(profile_name));
    }

    let mut client = NotesClient::new(client_config())?;
    configure_client(&mut client, profile, Some(&password))?;
    Ok(client)
}

/// Builds a client for the profile's server without credentials.
pub fn open_anonymous_client(explicit_profile: Option<&str>) -> Result<NotesClient, CliError> {
    let (config, profile_name) = load_profile(explicit_profile)?;
    let profile = config.profile(&profile_name).ok_or_else(|| {
        CliError::Config(format!(
            "Profile '{profile_name}' is not configured. Run `cloudnotes config init --server <url>` first."
        ))
    })?;

    let mut client = NotesClient::new(client_config())?;
    configure_client(&mut client, profile, None)?;
    Ok(client)
}

/// Points `client` at the profile's server and credentials.
pub fn configure_client(
    client: &mut NotesClient,
    profile: &CliProfile,
    password: Option<&str>,
) -> Result<(), CliError> {
    let server = profile.server_url().ok_or_else(|| {
        CliError::Config(
            "No server configured. Run `cloudnotes config init --server <url>` first.".into(),
        )
    })?;

    let endpoint = client.api_mut().endpoint_mut();
    endpoint.set_verify_ssl(profile.verify_ssl());
    endpoint.set_url(&server);
    if let Some(username) = profile.username() {
        endpoint.set_username(&username);
    }
    if let Some(password) = password {
        endpoint.set_password(password);
    }
    Ok(())
}

/// Turns the boolean result of a dispatch call into an error.
pub fn ensure_sent(sent: bool, what: &str) -> Result<(), CliError> {
    if sent {
        Ok(())
    } else {
        Err(CliError::NotSent(what.to_string()))
    }
}

/// Handles replies until the client is idle and surfaces the first error.
pub async fn settle(
    client: &mut NotesClient,
    events: &mut broadcast::Receiver<ApiEvent>,
) -> Result<(), CliError> {
    client.wait_idle().await;
    let failure = drain_events(events).into_iter().find_map(|event| match event {
        ApiEvent::Error(kind) => Some(kind),
        _ => None,
    });
    match failure {
        Some(kind) => Err(CliError::Api(kind)),
        None => Ok(()),
    }
}

pub fn format_note_lines(notes: &[Note]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    notes
        .iter()
        .map(|note| {
            let preview = note_preview(note, 40);
            let relative_time = note
                .modified()
                .map(|modified| format_relative_time(modified.timestamp_millis(), now_ms))
                .unwrap_or_default();
            let marker = if note.favorite() { "*" } else { " " };

            match note.category().filter(|category| !category.is_empty()) {
                Some(category) => format!(
                    "{:>8} {marker} {preview:<40}  {relative_time:<10}  [{category}]",
                    note.id()
                ),
                None => format!("{:>8} {marker} {preview:<40}  {relative_time}", note.id()),
            }
        })
        .collect()
}

pub fn note_to_list_item(note: &Note) -> NoteListItem {
    let now_ms = Utc::now().timestamp_millis();
    let modified = note.modified();

    NoteListItem {
        id: note.id(),
        title: note_preview(note, 80),
        category: note.category().unwrap_or_default().to_string(),
        favorite: note.favorite(),
        modified: modified.map(|modified| modified.timestamp()),
        relative_time: modified
            .map(|modified| format_relative_time(modified.timestamp_millis(), now_ms))
            .unwrap_or_default(),
    }
}

pub fn note_preview(note: &Note, max_chars: usize) -> String {
    let first_line = note.title_preview(usize::MAX);
    let collapsed = first_line.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

pub fn resolve_note_content(content_parts: &[String]) -> Result<String, CliError> {
    if let Some(content) = normalize_content(&content_parts.join(" ")) {
        return Ok(content);
    }

    if let Some(content) = read_piped_stdin()? {
        return Ok(content);
    }

    if let Some(content) = capture_editor_input_with_initial("")? {
        return Ok(content);
    }

    Err(CliError::EmptyContent)
}

pub fn normalize_content(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(normalize_content(&buffer))
}

pub fn capture_editor_input_with_initial(
    initial_content: &str,
) -> Result<Option<String>, CliError> {
    let editor = preferred_editor();
    let temp_file = create_temp_note_file_path();
    std::fs::write(&temp_file, initial_content)?;

    let launch_result = launch_editor(&editor, &temp_file);
    let note_content = std::fs::read_to_string(&temp_file)?;
    let _ = std::fs::remove_file(&temp_file);

    launch_result?;
    Ok(normalize_content(&note_content))
}

pub fn launch_editor(editor: &str, file_path: &Path) -> Result<(), CliError> {
    match Command::new(editor).arg(file_path).status() {
        Ok(status) => {
            if status.success() {
                Ok(())
            } else {
                Err(CliError::EditorFailed(format!(
                    "`{editor}` exited with status {status}"
                )))
            }
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            let mut parts = editor.split_whitespace();
            let Some(program) = parts.next() else {
                return Err(CliError::EditorFailed("empty EDITOR command".into()));
            };

            let mut command = Command::new(program);
            command.args(parts).arg(file_path);

            let status = command.status()?;
            if status.success() {
                Ok(())
            } else {
                Err(CliError::EditorFailed(format!(
                    "`{editor}` exited with status {status}"
                )))
            }
        }
        Err(err) => Err(CliError::Io(err)),
    }
}

pub fn preferred_editor() -> String {
    env::var("VISUAL")
        .or_else(|_| env::var("EDITOR"))
        .unwrap_or_else(|_| default_editor().to_string())
}

pub const fn default_editor() -> &'static str {
    if cfg!(windows) {
        "notepad"
    } else {
        "vi"
    }
}

pub fn create_temp_note_file_path() -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    env::temp_dir().join(format!("cloudnotes-note-{}-{now}.md", std::process::id()))
}
