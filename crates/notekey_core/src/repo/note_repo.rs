//! Note/settings repository over the key-value store.
//!
//! # Responsibility
//! - Provide typed note list, active pointer and settings APIs.
//! - Keep key names and JSON shapes private to this module.
//!
//! # Invariants
//! - The note list preserves insertion order.
//! - Absent keys read as empty list / no pointer / default settings.
//! - A note id appears at most once in a persisted list.
//!
//! # See also
//! - `repo::kv_store` for the storage boundary.

use crate::model::note::{Note, NoteId};
use crate::model::settings::Settings;
use crate::repo::kv_store::{KvStore, StoreError, StoreResult};
use serde_json::Value;

pub const NOTES_KEY: &str = "notes";
pub const ACTIVE_NOTE_KEY: &str = "activeNoteId";
pub const SETTINGS_KEY: &str = "settings";

/// Repository interface for note and settings persistence.
pub trait NoteRepository: Send {
    /// Returns all notes in stored order.
    fn list_notes(&self) -> StoreResult<Vec<Note>>;
    /// Gets one note by id.
    fn get_note(&self, id: &str) -> StoreResult<Option<Note>>;
    /// Appends a new note to the list.
    fn insert_note(&mut self, note: &Note) -> StoreResult<()>;
    /// Replaces an existing note record (matched by id).
    fn save_note(&mut self, note: &Note) -> StoreResult<()>;
    /// Removes one note from the list.
    fn remove_note(&mut self, id: &str) -> StoreResult<()>;
    /// Reads the active note pointer.
    fn active_note_id(&self) -> StoreResult<Option<NoteId>>;
    /// Overwrites the active note pointer.
    fn set_active_note_id(&mut self, id: &str) -> StoreResult<()>;
    /// Reads settings, falling back to defaults.
    fn settings(&self) -> StoreResult<Settings>;
    /// Overwrites settings.
    fn save_settings(&mut self, settings: &Settings) -> StoreResult<()>;
}

/// Note repository backed by any `KvStore`.
pub struct KvNoteRepository<S: KvStore> {
    store: S,
}

impl<S: KvStore> KvNoteRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn write_notes(&mut self, notes: &[Note]) -> StoreResult<()> {
        let value = serde_json::to_value(notes)?;
        self.store.set(NOTES_KEY, &value)
    }
}

impl<S: KvStore> NoteRepository for KvNoteRepository<S> {
    fn list_notes(&self) -> StoreResult<Vec<Note>> {
        match self.store.get(NOTES_KEY)? {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(value) => serde_json::from_value(value).map_err(|err| {
                StoreError::InvalidData(format!("`{NOTES_KEY}` is not a note list: {err}"))
            }),
        }
    }

    fn get_note(&self, id: &str) -> StoreResult<Option<Note>> {
        Ok(self.list_notes()?.into_iter().find(|note| note.id == id))
    }

    fn insert_note(&mut self, note: &Note) -> StoreResult<()> {
        let mut notes = self.list_notes()?;
        if notes.iter().any(|existing| existing.id == note.id) {
            return Err(StoreError::InvalidData(format!(
                "note id `{}` already exists",
                note.id
            )));
        }
        notes.push(note.clone());
        self.write_notes(&notes)
    }

    fn save_note(&mut self, note: &Note) -> StoreResult<()> {
        let mut notes = self.list_notes()?;
        let slot = notes
            .iter_mut()
            .find(|existing| existing.id == note.id)
            .ok_or_else(|| StoreError::NotFound(note.id.clone()))?;
        *slot = note.clone();
        self.write_notes(&notes)
    }

    fn remove_note(&mut self, id: &str) -> StoreResult<()> {
        let mut notes = self.list_notes()?;
        let before = notes.len();
        notes.retain(|note| note.id != id);
        if notes.len() == before {
            return Err(StoreError::NotFound(id.to_string()));
        }
        self.write_notes(&notes)
    }

    fn active_note_id(&self) -> StoreResult<Option<NoteId>> {
        match self.store.get(ACTIVE_NOTE_KEY)? {
            Some(Value::String(id)) if !id.is_empty() => Ok(Some(id)),
            None | Some(Value::Null) | Some(Value::String(_)) => Ok(None),
            Some(other) => Err(StoreError::InvalidData(format!(
                "`{ACTIVE_NOTE_KEY}` must be a string, got {other}"
            ))),
        }
    }

    fn set_active_note_id(&mut self, id: &str) -> StoreResult<()> {
        self.store.set(ACTIVE_NOTE_KEY, &Value::from(id))
    }

    fn settings(&self) -> StoreResult<Settings> {
        match self.store.get(SETTINGS_KEY)? {
            None | Some(Value::Null) => Ok(Settings::default()),
            Some(value) => serde_json::from_value(value).map_err(|err| {
                StoreError::InvalidData(format!("`{SETTINGS_KEY}` is not a mapping: {err}"))
            }),
        }
    }

    fn save_settings(&mut self, settings: &Settings) -> StoreResult<()> {
        let value = serde_json::to_value(settings)?;
        self.store.set(SETTINGS_KEY, &value)
    }
}
