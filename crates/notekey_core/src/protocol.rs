//! Request/response message protocol between panels, the selection
//! detector and the coordinator.
//!
//! # Responsibility
//! - Define the closed set of requests (wire tag `action`).
//! - Define typed replies and their `{success, ...}` wire envelope.
//!
//! # Invariants
//! - Adding a request kind is a compile-time checked change in the router.
//! - A response carries either result fields or `error`, never both.

use crate::model::note::{Note, NoteId};
use crate::model::settings::Settings;
use log::warn;
use serde::{Deserialize, Serialize};

/// Wire message for requests that fail to decode.
pub const UNKNOWN_ACTION: &str = "Unknown action";

/// One inbound request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    /// Selection relay from the page.
    SetHighlightedText { text: String },
    /// Append the text as a bullet to the active note.
    Add { text: String },
    /// Explain the text and append it with its explanation.
    Explain { text: String },
    CreateNote,
    #[serde(rename_all = "camelCase")]
    DeleteNote { note_id: NoteId },
    #[serde(rename_all = "camelCase")]
    RenameNote { note_id: NoteId, new_title: String },
    #[serde(rename_all = "camelCase")]
    UpdateNote { note_id: NoteId, content: String },
    #[serde(rename_all = "camelCase")]
    SwitchNote { note_id: NoteId },
    GetActiveNote,
    GetAllNotes,
    GetSettings,
    UpdateSettings { settings: Settings },
    /// Page asks for the panel to become visible.
    OpenSidePanel,
}

impl Request {
    /// Decodes one JSON request. Malformed or unknown actions become the
    /// `UNKNOWN_ACTION` failure envelope.
    pub fn from_json(raw: &str) -> Result<Self, Response> {
        serde_json::from_str(raw).map_err(|err| {
            warn!(
                "event=request_decode module=protocol status=rejected error_code=unknown_action line={} column={}",
                err.line(),
                err.column()
            );
            Response::failure(UNKNOWN_ACTION)
        })
    }

    pub fn action(&self) -> &'static str {
        match self {
            Self::SetHighlightedText { .. } => "setHighlightedText",
            Self::Add { .. } => "add",
            Self::Explain { .. } => "explain",
            Self::CreateNote => "createNote",
            Self::DeleteNote { .. } => "deleteNote",
            Self::RenameNote { .. } => "renameNote",
            Self::UpdateNote { .. } => "updateNote",
            Self::SwitchNote { .. } => "switchNote",
            Self::GetActiveNote => "getActiveNote",
            Self::GetAllNotes => "getAllNotes",
            Self::GetSettings => "getSettings",
            Self::UpdateSettings { .. } => "updateSettings",
            Self::OpenSidePanel => "openSidePanel",
        }
    }
}

/// Typed successful result of one request.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Ack,
    Note(Note),
    ActiveNote(Option<Note>),
    Notes(Vec<Note>),
    Explained { note: Note, explanation: String },
    Settings(Settings),
}

/// Wire envelope: `success` plus result fields or `error`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<Note>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<Vec<Note>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Settings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }
}

impl From<Reply> for Response {
    fn from(reply: Reply) -> Self {
        let mut response = Self {
            success: true,
            ..Self::default()
        };
        match reply {
            Reply::Ack => {}
            Reply::Note(note) => response.note = Some(note),
            Reply::ActiveNote(note) => response.note = note,
            Reply::Notes(notes) => response.notes = Some(notes),
            Reply::Explained { note, explanation } => {
                response.note = Some(note);
                response.explanation = Some(explanation);
            }
            Reply::Settings(settings) => response.settings = Some(settings),
        }
        response
    }
}
