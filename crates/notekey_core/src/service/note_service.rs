//! Note use-case service.
//!
//! # Responsibility
//! - Implement every note mutation the coordinator exposes (bullet append,
//!   create, delete, rename, content replace, active switch, settings merge).
//! - Format captured text into HTML list items.
//!
//! # Invariants
//! - At least one note exists after `initialize` and deleting the last one
//!   is refused.
//! - The active pointer resolves to a stored note after `initialize`; a
//!   delete reassigns it before removing the target.
//! - Captured text is HTML-escaped; `update_content` stores caller content
//!   verbatim.
//! - Writes touching two keys order them so an interrupted sequence still
//!   leaves both invariants intact.

use crate::clock::Clock;
use crate::model::note::{Note, NoteId, FIRST_NOTE_TITLE, UNTITLED_NOTE_TITLE};
use crate::model::settings::Settings;
use crate::repo::kv_store::StoreError;
use crate::repo::note_repo::NoteRepository;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

const LIST_OPEN: &str = "<ul>";
const LIST_CLOSE: &str = "</ul>";

/// Service error for note use-cases.
#[derive(Debug)]
pub enum NoteServiceError {
    /// Active pointer is absent or dangling.
    NoActiveNote,
    /// Target note does not exist.
    NoteNotFound(NoteId),
    /// Refused to delete the only remaining note.
    LastNote,
    /// Persistence-layer failure.
    Store(StoreError),
}

impl Display for NoteServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoActiveNote => write!(f, "No active note found"),
            Self::NoteNotFound(id) => write!(f, "Note not found: {id}"),
            Self::LastNote => write!(f, "Cannot delete the last note"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for NoteServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for NoteServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(id) => Self::NoteNotFound(id),
            other => Self::Store(other),
        }
    }
}

pub type NoteServiceResult<T> = Result<T, NoteServiceError>;

/// Outcome of a successful delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub deleted: NoteId,
    /// Active note id after the delete.
    pub active: NoteId,
}

/// Note service facade over a repository implementation.
pub struct NoteService<R: NoteRepository> {
    repo: R,
    clock: Arc<dyn Clock>,
}

impl<R: NoteRepository> NoteService<R> {
    pub fn new(repo: R, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    /// Seeds the first note or repairs a dangling active pointer.
    ///
    /// Returns the active note after initialization.
    pub fn initialize(&mut self) -> NoteServiceResult<Note> {
        let notes = self.repo.list_notes()?;
        let Some(first) = notes.first() else {
            let note = Note::new(FIRST_NOTE_TITLE, self.clock.now_ms());
            self.repo.insert_note(&note)?;
            self.repo.set_active_note_id(&note.id)?;
            info!(
                "event=store_init module=service status=ok action=seeded note_id={}",
                note.id
            );
            return Ok(note);
        };

        let active_id = self.repo.active_note_id()?;
        if let Some(active) = active_id
            .as_deref()
            .and_then(|id| notes.iter().find(|note| note.id == id))
        {
            return Ok(active.clone());
        }

        warn!(
            "event=store_init module=service status=repaired reason=dangling_active note_id={}",
            first.id
        );
        self.repo.set_active_note_id(&first.id)?;
        Ok(first.clone())
    }

    /// Appends one escaped bullet to the active note.
    pub fn append_bullet(&mut self, text: &str) -> NoteServiceResult<Note> {
        self.append_to_active(&bullet_item(text))
    }

    /// Appends one bullet carrying the source text and its explanation.
    pub fn append_explanation(&mut self, text: &str, explanation: &str) -> NoteServiceResult<Note> {
        self.append_to_active(&explanation_item(text, explanation))
    }

    /// Creates an empty note and makes it active.
    pub fn create_note(&mut self) -> NoteServiceResult<Note> {
        let note = Note::new(UNTITLED_NOTE_TITLE, self.clock.now_ms());
        self.repo.insert_note(&note)?;
        self.repo.set_active_note_id(&note.id)?;
        Ok(note)
    }

    /// Deletes one note, reassigning the active pointer first if needed.
    pub fn delete_note(&mut self, id: &str) -> NoteServiceResult<DeleteOutcome> {
        let notes = self.repo.list_notes()?;
        if !notes.iter().any(|note| note.id == id) {
            return Err(NoteServiceError::NoteNotFound(id.to_string()));
        }
        if notes.len() <= 1 {
            return Err(NoteServiceError::LastNote);
        }

        let current = self.repo.active_note_id()?;
        let still_valid = current
            .as_deref()
            .is_some_and(|active| active != id && notes.iter().any(|note| note.id == active));
        let active = match current {
            Some(active) if still_valid => active,
            _ => {
                let replacement = notes
                    .iter()
                    .find(|note| note.id != id)
                    .map(|note| note.id.clone())
                    .ok_or(NoteServiceError::LastNote)?;
                self.repo.set_active_note_id(&replacement)?;
                replacement
            }
        };

        self.repo.remove_note(id)?;
        Ok(DeleteOutcome {
            deleted: id.to_string(),
            active,
        })
    }

    /// Renames one note. Blank titles fall back to the placeholder.
    pub fn rename_note(&mut self, id: &str, title: &str) -> NoteServiceResult<Note> {
        let trimmed = title.trim();
        let title = if trimmed.is_empty() {
            UNTITLED_NOTE_TITLE
        } else {
            trimmed
        };
        let mut note = self.require_note(id)?;
        note.set_title(title, self.clock.now_ms());
        self.repo.save_note(&note)?;
        Ok(note)
    }

    /// Replaces note content verbatim.
    pub fn update_content(&mut self, id: &str, content: &str) -> NoteServiceResult<Note> {
        let mut note = self.require_note(id)?;
        note.set_content(content, self.clock.now_ms());
        self.repo.save_note(&note)?;
        Ok(note)
    }

    /// Points the active pointer at `id` and returns that note.
    pub fn switch_active(&mut self, id: &str) -> NoteServiceResult<Note> {
        let note = self.require_note(id)?;
        self.repo.set_active_note_id(&note.id)?;
        Ok(note)
    }

    /// Reads the active note, if the pointer resolves.
    pub fn active_note(&self) -> NoteServiceResult<Option<Note>> {
        match self.repo.active_note_id()? {
            Some(id) => Ok(self.repo.get_note(&id)?),
            None => Ok(None),
        }
    }

    pub fn list_notes(&self) -> NoteServiceResult<Vec<Note>> {
        Ok(self.repo.list_notes()?)
    }

    pub fn get_note(&self, id: &str) -> NoteServiceResult<Option<Note>> {
        Ok(self.repo.get_note(id)?)
    }

    pub fn settings(&self) -> NoteServiceResult<Settings> {
        Ok(self.repo.settings()?)
    }

    /// Merges `update` into stored settings and returns the result.
    pub fn update_settings(&mut self, update: &Settings) -> NoteServiceResult<Settings> {
        let mut settings = self.repo.settings()?;
        settings.merge(update);
        self.repo.save_settings(&settings)?;
        Ok(settings)
    }

    fn require_note(&self, id: &str) -> NoteServiceResult<Note> {
        self.repo
            .get_note(id)?
            .ok_or_else(|| NoteServiceError::NoteNotFound(id.to_string()))
    }

    fn append_to_active(&mut self, item: &str) -> NoteServiceResult<Note> {
        let mut note = self.active_note()?.ok_or(NoteServiceError::NoActiveNote)?;
        let content = append_list_item(&note.content, item);
        note.set_content(content, self.clock.now_ms());
        self.repo.save_note(&note)?;
        Ok(note)
    }
}

/// Escapes text for embedding in an HTML fragment.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// `<li>` item for a plain captured bullet.
pub fn bullet_item(text: &str) -> String {
    format!("<li>{}</li>", escape_html(text))
}

/// `<li>` item for an explained capture.
pub fn explanation_item(text: &str, explanation: &str) -> String {
    format!(
        "<li><strong>Text:</strong> {} | <strong>Explanation:</strong> {}</li>",
        escape_html(text),
        escape_html(explanation)
    )
}

/// Places `item` into `content` without interpreting the markup around it.
///
/// Rules:
/// - empty content: wrap the item in a new list;
/// - content ending with `</ul>`: insert before the closing tag;
/// - anything else: append a new list holding the item.
pub fn append_list_item(content: &str, item: &str) -> String {
    let trimmed = content.trim_end();
    if trimmed.is_empty() {
        return format!("{LIST_OPEN}{item}{LIST_CLOSE}");
    }
    match trimmed.strip_suffix(LIST_CLOSE) {
        Some(head) => format!("{head}{item}{LIST_CLOSE}"),
        None => format!("{trimmed}{LIST_OPEN}{item}{LIST_CLOSE}"),
    }
}
