//! Local note collection kept in step with the Notes API.
//!
//! Local mutations commit immediately. With `local == false` the same change
//! is also sent to the server, and whatever the server answers is merged back
//! through [`NotesApp::update_reply`].

use serde_json::Value;

use crate::models::{Note, NoteId};
use crate::transport::{Dispatcher, Method, Reply, Route};
use crate::util::compact_body;

pub const NOTES_ENDPOINT: &str = "/index.php/apps/notes/api/v1/notes";
const EXCLUDE_QUERY: &str = "exclude";

#[derive(Debug)]
pub struct NotesApp {
    notes: Vec<Note>,
    dispatcher: Dispatcher,
}

impl NotesApp {
    pub const fn new(dispatcher: Dispatcher) -> Self {
        Self {
            notes: Vec::new(),
            dispatcher,
        }
    }

    /// Notes in insertion order.
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn find(&self, id: NoteId) -> Option<&Note> {
        self.notes.iter().find(|note| note.id() == id)
    }

    /// Requests every note; `exclude` names fields the server should omit.
    pub fn get_all_notes<S: AsRef<str>>(&self, exclude: &[S]) -> bool {
        let joined = exclude
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(",");
        let pairs = [(EXCLUDE_QUERY, joined.as_str())];
        let query: &[(&str, &str)] = if exclude.is_empty() { &[] } else { &pairs };
        self.dispatcher.get(Route::Notes, NOTES_ENDPOINT, query, true)
    }

    pub fn get_note(&self, id: NoteId) -> bool {
        self.dispatcher
            .get(Route::Notes, &note_endpoint(id), &[], true)
    }

    /// Adds `note` unless an identical one is already present.
    ///
    /// A note with a positive id replaces whichever note already holds that
    /// id, so no two notes share one.
    pub fn create_note(&mut self, note: Note, local: bool) -> bool {
        let body = if local {
            None
        } else {
            match serde_json::to_vec(&note) {
                Ok(body) => Some(body),
                Err(error) => {
                    tracing::warn!("Cannot serialize note: {}", error);
                    return false;
                }
            }
        };

        if !self.notes.contains(&note) {
            let claimant = if note.has_assigned_id() {
                self.position_of(note.id())
            } else {
                None
            };
            match claimant {
                Some(index) => self.notes[index] = note,
                None => self.notes.push(note),
            }
        }

        match body {
            Some(body) => self
                .dispatcher
                .post(Route::Notes, NOTES_ENDPOINT, body, true),
            None => true,
        }
    }

    /// Replaces the note matching `id`, or for notes without an id, the one
    /// with the same content.
    ///
    /// An update identical to a note already present counts as applied.
    pub fn update_note(&mut self, id: NoteId, note: Note, local: bool) -> bool {
        let body = if local {
            None
        } else {
            match serde_json::to_vec(&note) {
                Ok(body) => Some(body),
                Err(error) => {
                    tracing::warn!("Cannot serialize note {}: {}", id, error);
                    return false;
                }
            }
        };

        let done = self.notes.contains(&note) || self.replace_matching(id, note);

        match body {
            Some(body) => self
                .dispatcher
                .put(Route::Notes, &note_endpoint(id), body, true),
            None => done,
        }
    }

    /// Removes the first note whose id equals `id`.
    pub fn delete_note(&mut self, id: NoteId, local: bool) -> bool {
        let done = match self.position_of(id) {
            Some(index) => {
                self.notes.remove(index);
                true
            }
            None => false,
        };

        if local {
            done
        } else {
            self.dispatcher
                .delete(Route::Notes, &note_endpoint(id), true)
        }
    }

    /// Merges a Notes API reply into the local collection.
    pub fn update_reply(&mut self, reply: &Reply) {
        if let Some(error) = &reply.error {
            tracing::warn!(
                "{} {} failed: {}",
                reply.meta.method,
                reply.meta.url,
                error
            );
        }

        let listing = reply.is_success() && reply.meta.method == Method::GET;
        match serde_json::from_slice::<Value>(&reply.body) {
            Ok(Value::Object(object)) => self.merge(Note::from_object(object), listing),
            Ok(Value::Array(items)) => {
                for item in items {
                    match item {
                        Value::Object(object) => {
                            self.merge(Note::from_object(object), listing);
                        }
                        other => tracing::debug!("Skipping non-object note entry: {}", other),
                    }
                }
            }
            Ok(_) | Err(_) => {
                tracing::warn!("Reply not valid: {}", compact_body(&reply.body));
            }
        }
    }

    /// Notes from a successful GET with an id nothing local matches are
    /// appended. Replies to mutations only ever update, so a note deleted
    /// locally stays deleted when an earlier PUT answers late.
    fn merge(&mut self, note: Note, listing: bool) {
        let id = note.id();
        let insertable = listing && note.has_assigned_id();
        let fallback = insertable.then(|| note.clone());
        if !self.update_note(id, note, true) {
            if let Some(note) = fallback {
                self.notes.push(note);
            }
        }
    }

    fn replace_matching(&mut self, id: NoteId, note: Note) -> bool {
        let target = self.notes.iter().position(|existing| {
            if existing.has_assigned_id() {
                existing.id() == id
            } else {
                existing.same_content(&note)
            }
        });
        match target {
            Some(index) => {
                self.notes[index] = note;
                true
            }
            None => false,
        }
    }

    fn position_of(&self, id: NoteId) -> Option<usize> {
        self.notes.iter().position(|note| note.id() == id)
    }
}

fn note_endpoint(id: NoteId) -> String {
    format!("{NOTES_ENDPOINT}/{id}")
}
