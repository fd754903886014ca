//! Coordinator: the single entry point for every state-changing request.
//!
//! # Responsibility
//! - Route each `Request` to the note service, the explanation client or a
//!   relay notification.
//! - Apply the debounce policy before any work starts.
//! - Broadcast a notification after every successful mutation.
//!
//! # Invariants
//! - Failures are returned as values; nothing unwinds out of `handle`.
//! - A rejected request performs no store write.
//! - A request is processed to completion before the next one starts
//!   (enforced by `&mut self` and the actor in `handle`).

mod handle;

pub use handle::{spawn, CoordinatorHandle, DEFAULT_QUEUE_CAPACITY};

use crate::clock::Clock;
use crate::explain::{ExplainError, ExplanationClient};
use crate::notify::{Notification, NotificationHub};
use crate::protocol::{Reply, Request, Response};
use crate::repo::note_repo::NoteRepository;
use crate::service::debounce::{DebounceGuard, DebounceKind, DebounceWindows};
use crate::service::note_service::{NoteService, NoteServiceError};
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Instant;

pub const DUPLICATE_REQUEST: &str = "Duplicate request";
pub const CREATE_TOO_SOON: &str = "Please wait before creating another note";
pub const STORAGE_FAILURE: &str = "Could not save changes. Please try again.";

/// Failure of one coordinator request.
#[derive(Debug)]
pub enum CoordinatorError {
    /// Same add/explain payload inside its debounce window.
    Duplicate(DebounceKind),
    /// Create-note inside its debounce window.
    CreateTooSoon,
    Note(NoteServiceError),
    Explain(ExplainError),
}

impl CoordinatorError {
    /// Stable string carried in the response `error` field.
    pub fn user_message(&self) -> String {
        match self {
            Self::Duplicate(_) => DUPLICATE_REQUEST.to_string(),
            Self::CreateTooSoon => CREATE_TOO_SOON.to_string(),
            Self::Note(NoteServiceError::Store(_)) => STORAGE_FAILURE.to_string(),
            Self::Note(err) => err.to_string(),
            Self::Explain(err) => err.user_message().to_string(),
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Duplicate(_) => "duplicate",
            Self::CreateTooSoon => "create_too_soon",
            Self::Note(NoteServiceError::NoActiveNote) => "no_active_note",
            Self::Note(NoteServiceError::NoteNotFound(_)) => "note_not_found",
            Self::Note(NoteServiceError::LastNote) => "last_note",
            Self::Note(NoteServiceError::Store(_)) => "store_failed",
            Self::Explain(err) => err.code(),
        }
    }
}

impl Display for CoordinatorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Duplicate(kind) => write!(f, "duplicate {} request", kind.as_str()),
            Self::CreateTooSoon => write!(f, "{CREATE_TOO_SOON}"),
            Self::Note(err) => write!(f, "{err}"),
            Self::Explain(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CoordinatorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Note(err) => Some(err),
            Self::Explain(err) => Some(err),
            Self::Duplicate(_) | Self::CreateTooSoon => None,
        }
    }
}

impl From<NoteServiceError> for CoordinatorError {
    fn from(value: NoteServiceError) -> Self {
        Self::Note(value)
    }
}

impl From<ExplainError> for CoordinatorError {
    fn from(value: ExplainError) -> Self {
        Self::Explain(value)
    }
}

pub type CoordinatorResult<T> = Result<T, CoordinatorError>;

/// Request router owning note state, debounce records and the AI client.
pub struct Coordinator<R: NoteRepository> {
    notes: NoteService<R>,
    debounce: DebounceGuard,
    explainer: Option<Arc<dyn ExplanationClient>>,
    hub: NotificationHub,
    clock: Arc<dyn Clock>,
}

impl<R: NoteRepository> Coordinator<R> {
    pub fn new(
        repo: R,
        hub: NotificationHub,
        clock: Arc<dyn Clock>,
        windows: DebounceWindows,
    ) -> Self {
        Self {
            notes: NoteService::new(repo, Arc::clone(&clock)),
            debounce: DebounceGuard::new(windows),
            explainer: None,
            hub,
            clock,
        }
    }

    /// Installs the explanation client. Without one, explain requests fail
    /// as `Unconfigured`.
    pub fn with_explainer(mut self, explainer: Arc<dyn ExplanationClient>) -> Self {
        self.explainer = Some(explainer);
        self
    }

    pub fn hub(&self) -> &NotificationHub {
        &self.hub
    }

    pub fn notes(&self) -> &NoteService<R> {
        &self.notes
    }

    /// Seeds or repairs the store so an active note always exists.
    pub fn initialize(&mut self) -> CoordinatorResult<()> {
        let active = self.notes.initialize()?;
        info!(
            "event=coordinator_init module=coordinator status=ok active_note_id={}",
            active.id
        );
        Ok(())
    }

    /// Handles one request and converts the outcome to a wire envelope.
    pub async fn dispatch(&mut self, request: Request) -> Response {
        match self.handle(request).await {
            Ok(reply) => Response::from(reply),
            Err(err) => Response::failure(err.user_message()),
        }
    }

    /// Decodes one JSON request and dispatches it.
    pub async fn dispatch_json(&mut self, raw: &str) -> Response {
        match Request::from_json(raw) {
            Ok(request) => self.dispatch(request).await,
            Err(failure) => failure,
        }
    }

    /// Handles one typed request.
    pub async fn handle(&mut self, request: Request) -> CoordinatorResult<Reply> {
        let action = request.action();
        let started_at = Instant::now();
        let result = self.route(request).await;

        match &result {
            Ok(_) => info!(
                "event=request module=coordinator status=ok action={} duration_ms={}",
                action,
                started_at.elapsed().as_millis()
            ),
            Err(CoordinatorError::Note(NoteServiceError::Store(err))) => error!(
                "event=request module=coordinator status=error action={} duration_ms={} error_code=store_failed error={}",
                action,
                started_at.elapsed().as_millis(),
                err
            ),
            Err(err) => warn!(
                "event=request module=coordinator status=rejected action={} duration_ms={} error_code={}",
                action,
                started_at.elapsed().as_millis(),
                err.code()
            ),
        }
        result
    }

    async fn route(&mut self, request: Request) -> CoordinatorResult<Reply> {
        match request {
            Request::SetHighlightedText { text } => {
                self.hub.publish(Notification::SetHighlightedText { text });
                Ok(Reply::Ack)
            }
            Request::OpenSidePanel => {
                self.hub.publish(Notification::ShowPanel);
                Ok(Reply::Ack)
            }
            Request::Add { text } => self.append_bullet(&text).map(Reply::Note),
            Request::Explain { text } => self.explain_text(&text).await,
            Request::CreateNote => self.create_note().map(Reply::Note),
            Request::DeleteNote { note_id } => self.delete_note(&note_id).map(|()| Reply::Ack),
            Request::RenameNote { note_id, new_title } => {
                let note = self.notes.rename_note(&note_id, &new_title)?;
                self.hub.publish(Notification::NoteRenamed { note: note.clone() });
                Ok(Reply::Note(note))
            }
            Request::UpdateNote { note_id, content } => {
                let note = self.notes.update_content(&note_id, &content)?;
                self.hub.publish(Notification::NoteUpdated { note: note.clone() });
                Ok(Reply::Note(note))
            }
            Request::SwitchNote { note_id } => {
                let note = self.notes.switch_active(&note_id)?;
                self.hub.publish(Notification::NoteSwitched { note: note.clone() });
                Ok(Reply::Note(note))
            }
            Request::GetActiveNote => Ok(Reply::ActiveNote(self.notes.active_note()?)),
            Request::GetAllNotes => Ok(Reply::Notes(self.notes.list_notes()?)),
            Request::GetSettings => Ok(Reply::Settings(self.notes.settings()?)),
            Request::UpdateSettings { settings } => {
                let merged = self.notes.update_settings(&settings)?;
                self.hub.publish(Notification::SettingsUpdated {
                    settings: merged.clone(),
                });
                Ok(Reply::Settings(merged))
            }
        }
    }

    fn admit(&mut self, kind: DebounceKind, payload: Option<&str>) -> bool {
        let now = self.clock.now_ms();
        self.debounce.admit(kind, payload, now)
    }

    fn append_bullet(&mut self, text: &str) -> CoordinatorResult<crate::model::note::Note> {
        if !self.admit(DebounceKind::AddText, Some(text)) {
            return Err(CoordinatorError::Duplicate(DebounceKind::AddText));
        }

        let note = self.notes.append_bullet(text)?;
        self.hub.publish(Notification::NoteUpdated { note: note.clone() });
        self.hub.publish(Notification::ClearHighlightedText);
        Ok(note)
    }

    async fn explain_text(&mut self, text: &str) -> CoordinatorResult<Reply> {
        if !self.admit(DebounceKind::ExplainText, Some(text)) {
            return Err(CoordinatorError::Duplicate(DebounceKind::ExplainText));
        }

        let Some(explainer) = self.explainer.as_ref().map(Arc::clone) else {
            return Err(self.explain_failed(ExplainError::Unconfigured));
        };
        if self.notes.active_note()?.is_none() {
            return Err(NoteServiceError::NoActiveNote.into());
        }

        self.hub.publish(Notification::ExplanationLoading);
        let explanation = match explainer.explain(text).await {
            Ok(explanation) => explanation,
            Err(err) => return Err(self.explain_failed(err)),
        };

        let note = match self.notes.append_explanation(text, &explanation) {
            Ok(note) => note,
            Err(err) => {
                let err = CoordinatorError::from(err);
                self.hub.publish(Notification::Error {
                    error: err.user_message(),
                });
                return Err(err);
            }
        };

        self.hub.publish(Notification::ExplanationComplete {
            explanation: explanation.clone(),
            note: note.clone(),
        });
        self.hub.publish(Notification::ClearHighlightedText);
        Ok(Reply::Explained { note, explanation })
    }

    fn explain_failed(&self, err: ExplainError) -> CoordinatorError {
        self.hub.publish(Notification::Error {
            error: err.user_message().to_string(),
        });
        CoordinatorError::Explain(err)
    }

    fn create_note(&mut self) -> CoordinatorResult<crate::model::note::Note> {
        if !self.admit(DebounceKind::CreateNote, None) {
            return Err(CoordinatorError::CreateTooSoon);
        }

        let note = self.notes.create_note()?;
        self.hub.publish(Notification::NoteCreated { note: note.clone() });
        Ok(note)
    }

    fn delete_note(&mut self, id: &str) -> CoordinatorResult<()> {
        let previous_active = self.notes.active_note()?.map(|note| note.id);
        let outcome = self.notes.delete_note(id)?;
        self.hub.publish(Notification::NoteDeleted {
            note_id: outcome.deleted,
        });

        if previous_active.as_deref() != Some(outcome.active.as_str()) {
            if let Some(note) = self.notes.get_note(&outcome.active)? {
                self.hub.publish(Notification::NoteSwitched { note });
            }
        }
        Ok(())
    }
}
