use cloudnotes_core::{AppCapabilities, NotesClient};

use crate::commands::common::{ensure_sent, open_client, settle};
use crate::error::CliError;

/// Notes API major version this CLI talks.
pub const SUPPORTED_NOTES_API: u32 = 1;

pub async fn run_capabilities(profile: Option<&str>) -> Result<(), CliError> {
    let mut client = open_client(profile)?;
    let notes = fetch_notes_capabilities(&mut client).await?;

    match notes {
        Some(notes) => {
            for line in format_capability_lines(&notes) {
                println!("{line}");
            }
        }
        None => println!("The Notes app is not enabled on this server."),
    }
    Ok(())
}

pub async fn fetch_notes_capabilities(
    client: &mut NotesClient,
) -> Result<Option<AppCapabilities>, CliError> {
    let mut events = client.subscribe();
    ensure_sent(client.api_mut().get_capabilities(), "capabilities request")?;
    settle(client, &mut events).await?;
    Ok(client.api().status().capabilities().notes())
}

pub fn format_capability_lines(notes: &AppCapabilities) -> Vec<String> {
    let version = notes
        .version()
        .map_or_else(|| "unknown".to_string(), ToString::to_string);
    let api_versions = notes
        .api_versions()
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");

    let mut lines = vec![
        format!("Notes app version: {version}"),
        format!("API versions: {api_versions}"),
    ];
    if !notes.supports_api(SUPPORTED_NOTES_API) {
        lines.push(format!(
            "Warning: server does not offer Notes API v{SUPPORTED_NOTES_API}"
        ));
    }
    lines
}
