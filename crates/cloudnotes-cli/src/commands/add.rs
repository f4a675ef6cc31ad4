use cloudnotes_core::{Note, NotesClient};

use crate::commands::common::{ensure_sent, open_client, resolve_note_content, settle};
use crate::error::CliError;

pub async fn run_add(profile: Option<&str>, content_parts: &[String]) -> Result<(), CliError> {
    let content = resolve_note_content(content_parts)?;

    let mut client = open_client(profile)?;
    let note = create_remote_note(&mut client, &content).await?;

    println!("{}", note.id());
    Ok(())
}

/// Creates the note on the server and returns it as the server stored it.
pub async fn create_remote_note(client: &mut NotesClient, content: &str) -> Result<Note, CliError> {
    let mut events = client.subscribe();
    ensure_sent(
        client.notes_mut().create_note(Note::new(content), false),
        "note creation",
    )?;
    settle(client, &mut events).await?;

    client
        .notes()
        .notes()
        .iter()
        .rev()
        .find(|note| note.has_assigned_id() && note.content() == Some(content))
        .cloned()
        .ok_or_else(|| CliError::Unconfirmed("the new note".to_string()))
}
