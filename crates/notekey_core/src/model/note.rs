//! Note domain model.
//!
//! # Responsibility
//! - Define the note record shared by store, coordinator and panel.
//! - Provide mutation helpers that keep `last_modified` current.
//!
//! # Invariants
//! - `id` is stable and never reused for another note.
//! - `last_modified` is rewritten on every mutation and never decreases.
//! - `content` is an opaque HTML fragment; helpers here never parse it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable note identifier.
///
/// Kept as a type alias so ids read as ids in signatures. Notes seeded by
/// external tooling may use any non-empty string.
pub type NoteId = String;

/// Title given to notes created through `create-note`.
pub const UNTITLED_NOTE_TITLE: &str = "Untitled Note";
/// Title of the note created when the store is first initialized.
pub const FIRST_NOTE_TITLE: &str = "My First Note";

/// One captured note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: NoteId,
    #[serde(default)]
    pub title: String,
    /// HTML fragment. Treated as a black box by core.
    #[serde(default)]
    pub content: String,
    /// Unix epoch milliseconds.
    #[serde(default)]
    pub created: i64,
    /// Unix epoch milliseconds.
    #[serde(default)]
    pub last_modified: i64,
}

impl Note {
    /// Creates an empty note with a generated id.
    pub fn new(title: impl Into<String>, now_ms: i64) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), title, now_ms)
    }

    /// Creates an empty note with a caller-provided id.
    pub fn with_id(id: impl Into<NoteId>, title: impl Into<String>, now_ms: i64) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: String::new(),
            created: now_ms,
            last_modified: now_ms,
        }
    }

    /// Title to render, falling back to the placeholder when blank.
    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            UNTITLED_NOTE_TITLE
        } else {
            self.title.as_str()
        }
    }

    pub fn set_title(&mut self, title: impl Into<String>, now_ms: i64) {
        self.title = title.into();
        self.touch(now_ms);
    }

    pub fn set_content(&mut self, content: impl Into<String>, now_ms: i64) {
        self.content = content.into();
        self.touch(now_ms);
    }

    fn touch(&mut self, now_ms: i64) {
        self.last_modified = self.last_modified.max(now_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::{Note, UNTITLED_NOTE_TITLE};

    #[test]
    fn generated_ids_are_distinct() {
        let first = Note::new("a", 10);
        let second = Note::new("a", 10);
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn blank_title_displays_placeholder() {
        let note = Note::with_id("1", "  ", 0);
        assert_eq!(note.display_title(), UNTITLED_NOTE_TITLE);
    }

    #[test]
    fn last_modified_never_moves_backwards() {
        let mut note = Note::with_id("1", "t", 500);
        note.set_content("<p>x</p>", 100);
        assert_eq!(note.last_modified, 500);
        note.set_title("u", 900);
        assert_eq!(note.last_modified, 900);
    }

    #[test]
    fn serializes_with_camel_case_fields() {
        let note = Note::with_id("1", "My First Note", 42);
        let value = serde_json::to_value(&note).unwrap();
        assert_eq!(value["lastModified"], 42);
        assert_eq!(value["id"], "1");
    }
}
