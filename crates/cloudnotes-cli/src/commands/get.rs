use cloudnotes_core::{Note, NoteId, NotesClient};

use crate::commands::common::{ensure_sent, open_client, settle};
use crate::error::CliError;

pub async fn run_get(profile: Option<&str>, id: NoteId) -> Result<(), CliError> {
    let mut client = open_client(profile)?;
    let note = fetch_note(&mut client, id).await?;

    println!("{}", note.content().unwrap_or_default());
    Ok(())
}

pub async fn fetch_note(client: &mut NotesClient, id: NoteId) -> Result<Note, CliError> {
    if id <= 0 {
        return Err(CliError::NoteNotFound(id));
    }

    let mut events = client.subscribe();
    ensure_sent(client.notes().get_note(id), "note request")?;
    settle(client, &mut events).await?;
    client
        .notes()
        .find(id)
        .cloned()
        .ok_or(CliError::NoteNotFound(id))
}
