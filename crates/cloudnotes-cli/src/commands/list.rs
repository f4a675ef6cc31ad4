use cloudnotes_core::{Note, NotesClient};

use crate::commands::common::{
    ensure_sent, format_note_lines, note_to_list_item, open_client, settle, NoteListItem,
};
use crate::error::CliError;

pub async fn run_list(profile: Option<&str>, as_json: bool) -> Result<(), CliError> {
    let mut client = open_client(profile)?;
    let notes = fetch_notes(&mut client).await?;

    if as_json {
        let json_items = notes
            .iter()
            .map(note_to_list_item)
            .collect::<Vec<NoteListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else {
        for line in format_note_lines(&notes) {
            println!("{line}");
        }
    }

    Ok(())
}

/// Lists every note without its content, which the listing never shows.
pub async fn fetch_notes(client: &mut NotesClient) -> Result<Vec<Note>, CliError> {
    let mut events = client.subscribe();
    ensure_sent(client.notes().get_all_notes(&["content"]), "note listing")?;
    settle(client, &mut events).await?;
    Ok(client.notes().notes().to_vec())
}
