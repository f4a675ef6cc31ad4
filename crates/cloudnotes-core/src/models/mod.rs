//! Data models for cloudnotes

mod note;

pub use note::{Note, NoteId};
