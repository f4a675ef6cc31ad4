use cloudnotes_core::{Note, NoteId, NotesClient};

use crate::commands::common::{
    capture_editor_input_with_initial, ensure_sent, normalize_content, open_client, settle,
};
use crate::commands::get::fetch_note;
use crate::error::CliError;

pub async fn run_edit(
    profile: Option<&str>,
    id: NoteId,
    content_parts: &[String],
) -> Result<(), CliError> {
    let mut client = open_client(profile)?;
    let note = fetch_note(&mut client, id).await?;
    let current = note.content().unwrap_or_default().to_string();

    let edited_content = match normalize_content(&content_parts.join(" ")) {
        Some(content) => content,
        None => capture_editor_input_with_initial(&current)?.ok_or(CliError::EmptyEditedContent)?,
    };

    if edited_content == current {
        println!("{id}");
        return Ok(());
    }

    let updated = update_remote_note(&mut client, note, &edited_content).await?;
    println!("{}", updated.id());
    Ok(())
}

/// Sends `note` with new content and returns the version the server kept.
pub async fn update_remote_note(
    client: &mut NotesClient,
    mut note: Note,
    content: &str,
) -> Result<Note, CliError> {
    let id = note.id();
    note.set("content", content);

    let mut events = client.subscribe();
    ensure_sent(client.notes_mut().update_note(id, note, false), "note update")?;
    settle(client, &mut events).await?;

    client
        .notes()
        .find(id)
        .cloned()
        .ok_or(CliError::NoteNotFound(id))
}
