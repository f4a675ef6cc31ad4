use cloudnotes_core::{NoteId, NotesClient};

use crate::commands::common::{ensure_sent, open_client, settle};
use crate::error::CliError;

pub async fn run_delete(profile: Option<&str>, id: NoteId) -> Result<(), CliError> {
    let mut client = open_client(profile)?;
    delete_remote_note(&mut client, id).await?;

    println!("{id}");
    Ok(())
}

pub async fn delete_remote_note(client: &mut NotesClient, id: NoteId) -> Result<(), CliError> {
    if id <= 0 {
        return Err(CliError::NoteNotFound(id));
    }

    let mut events = client.subscribe();
    ensure_sent(client.notes_mut().delete_note(id, false), "note deletion")?;
    settle(client, &mut events).await
}
