//! Panel view model.
//!
//! Pure state: every method takes the current time explicitly, so the
//! driver in `panel::Panel` and tests share the same transitions.

use crate::model::note::{Note, NoteId};
use crate::model::settings::Settings;
use crate::notify::Notification;
use crate::protocol::{Request, Response};
use crate::service::debounce::{DebounceKind, DebounceWindows};
use std::collections::HashSet;

pub const BANNER_TIMEOUT_MS: i64 = 5_000;
pub const SAVE_QUIET_PERIOD_MS: i64 = 1_000;

/// Errors the panel swallows instead of showing, matched by substring.
const SILENT_CREATE_ERROR: &str = "Please wait";

/// Panel buttons with in-flight and cooldown gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelAction {
    Add,
    Explain,
    Create,
}

impl PanelAction {
    fn debounce_kind(self) -> DebounceKind {
        match self {
            Self::Add => DebounceKind::AddText,
            Self::Explain => DebounceKind::ExplainText,
            Self::Create => DebounceKind::CreateNote,
        }
    }

    fn slot(self) -> usize {
        match self {
            Self::Add => 0,
            Self::Explain => 1,
            Self::Create => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ActionGate {
    in_flight: bool,
    cooldown_until_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Banner {
    message: String,
    expires_at_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingSave {
    note_id: NoteId,
    content: String,
    due_at_ms: i64,
}

/// Title field: last known-good value plus the in-progress draft.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct TitleField {
    committed: String,
    draft: String,
}

#[derive(Debug, Clone)]
pub struct PanelState {
    windows: DebounceWindows,
    notes: Vec<Note>,
    current: Option<Note>,
    highlighted: Option<String>,
    settings: Settings,
    visible: bool,
    gates: [ActionGate; 3],
    banner: Option<Banner>,
    title: TitleField,
    pending_save: Option<PendingSave>,
    /// Body of the last `updateNote` this panel sent; its echo keeps the draft.
    last_saved: Option<String>,
}

impl PanelState {
    /// Creates an empty panel whose cooldowns mirror `windows`.
    pub fn new(windows: DebounceWindows) -> Self {
        Self {
            windows,
            notes: Vec::new(),
            current: None,
            highlighted: None,
            settings: Settings::default(),
            visible: false,
            gates: [ActionGate::default(); 3],
            banner: None,
            title: TitleField::default(),
            pending_save: None,
            last_saved: None,
        }
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn current_note(&self) -> Option<&Note> {
        self.current.as_ref()
    }

    pub fn highlighted_text(&self) -> Option<&str> {
        self.highlighted.as_deref()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Replaces the note list, keeping the first copy of each id.
    pub fn set_notes(&mut self, notes: Vec<Note>) {
        let mut seen = HashSet::new();
        self.notes = notes
            .into_iter()
            .filter(|note| seen.insert(note.id.clone()))
            .collect();
    }

    /// Shows `note` in the editor and resets the title field to it.
    pub fn set_current(&mut self, note: Option<Note>) {
        if let Some(note) = &note {
            self.upsert(note.clone());
            self.title = TitleField {
                committed: note.title.clone(),
                draft: note.title.clone(),
            };
        } else {
            self.title = TitleField::default();
        }
        if self
            .pending_save
            .as_ref()
            .is_some_and(|pending| Some(&pending.note_id) != note.as_ref().map(|n| &n.id))
        {
            self.pending_save = None;
        }
        if self.current.as_ref().map(|n| &n.id) != note.as_ref().map(|n| &n.id) {
            self.last_saved = None;
        }
        self.current = note;
    }

    pub fn set_settings(&mut self, settings: Settings) {
        self.settings = settings;
    }

    pub fn set_highlighted(&mut self, text: Option<String>) {
        self.highlighted = text
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
    }

    /// Applies one coordinator broadcast.
    pub fn apply_notification(&mut self, notification: Notification, now_ms: i64) {
        match notification {
            Notification::SetHighlightedText { text } => self.set_highlighted(Some(text)),
            Notification::ClearHighlightedText => self.highlighted = None,
            Notification::ShowPanel => self.visible = true,
            Notification::NoteUpdated { note } | Notification::NoteRenamed { note } => {
                self.refresh_note(note);
            }
            Notification::NoteCreated { note } | Notification::NoteSwitched { note } => {
                self.set_current(Some(note));
            }
            Notification::NoteDeleted { note_id } => {
                self.notes.retain(|note| note.id != note_id);
                if self.current.as_ref().is_some_and(|note| note.id == note_id) {
                    self.set_current(None);
                }
            }
            Notification::ExplanationLoading => {
                self.gates[PanelAction::Explain.slot()].in_flight = true;
            }
            Notification::ExplanationComplete { note, .. } => {
                self.gates[PanelAction::Explain.slot()].in_flight = false;
                self.refresh_note(note);
            }
            Notification::Error { error } => {
                self.gates[PanelAction::Explain.slot()].in_flight = false;
                self.show_banner(error, now_ms);
            }
            Notification::SettingsUpdated { settings } => self.settings = settings,
        }
    }

    /// Whether `action` may be started right now.
    pub fn is_enabled(&self, action: PanelAction, now_ms: i64) -> bool {
        let gate = self.gates[action.slot()];
        let has_input = match action {
            PanelAction::Add | PanelAction::Explain => self.highlighted.is_some(),
            PanelAction::Create => true,
        };
        has_input && !gate.in_flight && now_ms >= gate.cooldown_until_ms
    }

    /// Marks `action` in flight. Returns `false` when it is disabled.
    pub fn begin(&mut self, action: PanelAction, now_ms: i64) -> bool {
        if !self.is_enabled(action, now_ms) {
            return false;
        }
        self.gates[action.slot()].in_flight = true;
        true
    }

    /// Completes `action`, starting its cooldown and applying the result
    /// only on success.
    pub fn finish(&mut self, action: PanelAction, response: &Response, now_ms: i64) {
        let window = self.windows.window(action.debounce_kind()).as_millis() as i64;
        let gate = &mut self.gates[action.slot()];
        gate.in_flight = false;
        gate.cooldown_until_ms = now_ms + window;

        if response.is_success() {
            if let Some(note) = response.note.clone() {
                match action {
                    PanelAction::Create => self.set_current(Some(note)),
                    PanelAction::Add | PanelAction::Explain => {
                        self.highlighted = None;
                        self.refresh_note(note);
                    }
                }
            }
            return;
        }

        let error = response.error.clone().unwrap_or_default();
        if action == PanelAction::Create && error.contains(SILENT_CREATE_ERROR) {
            return;
        }
        self.show_banner(error, now_ms);
    }

    /// Shows a failed response as a banner; successes are left to the caller.
    pub fn report_failure(&mut self, response: &Response, now_ms: i64) {
        if !response.is_success() {
            self.show_banner(response.error.clone().unwrap_or_default(), now_ms);
        }
    }

    pub fn show_banner(&mut self, message: impl Into<String>, now_ms: i64) {
        let message = message.into();
        if message.is_empty() {
            return;
        }
        self.banner = Some(Banner {
            message,
            expires_at_ms: now_ms + BANNER_TIMEOUT_MS,
        });
    }

    /// Visible banner text; expired banners are dropped.
    pub fn banner(&mut self, now_ms: i64) -> Option<&str> {
        if self
            .banner
            .as_ref()
            .is_some_and(|banner| now_ms >= banner.expires_at_ms)
        {
            self.banner = None;
        }
        self.banner.as_ref().map(|banner| banner.message.as_str())
    }

    pub fn title_draft(&self) -> &str {
        &self.title.draft
    }

    pub fn edit_title(&mut self, draft: impl Into<String>) {
        self.title.draft = draft.into();
    }

    /// Escape: drop the draft without committing.
    pub fn revert_title(&mut self) {
        self.title.draft = self.title.committed.clone();
    }

    /// Blur or Enter: returns the rename request to send, if any.
    ///
    /// Empty drafts revert locally; unchanged drafts send nothing.
    pub fn commit_title(&mut self) -> Option<Request> {
        let note = self.current.as_ref()?;
        let draft = self.title.draft.trim().to_string();
        if draft.is_empty() || draft == self.title.committed {
            self.revert_title();
            return None;
        }
        self.title.draft = draft.clone();
        Some(Request::RenameNote {
            note_id: note.id.clone(),
            new_title: draft,
        })
    }

    /// Applies the rename outcome; failures restore the known-good title.
    pub fn finish_rename(&mut self, response: &Response, now_ms: i64) {
        match response.note.clone().filter(|_| response.is_success()) {
            Some(note) => self.refresh_note(note),
            None => {
                self.revert_title();
                self.report_failure(response, now_ms);
            }
        }
    }

    /// Records an editor change; the save fires after the quiet period.
    pub fn edit_content(&mut self, content: impl Into<String>, now_ms: i64) {
        let Some(note) = &self.current else {
            return;
        };
        self.pending_save = Some(PendingSave {
            note_id: note.id.clone(),
            content: content.into(),
            due_at_ms: now_ms + SAVE_QUIET_PERIOD_MS,
        });
    }

    pub fn save_deadline_ms(&self) -> Option<i64> {
        self.pending_save.as_ref().map(|pending| pending.due_at_ms)
    }

    /// Returns the content save once the editor has been quiet long enough.
    pub fn take_due_save(&mut self, now_ms: i64) -> Option<Request> {
        if !self
            .pending_save
            .as_ref()
            .is_some_and(|pending| now_ms >= pending.due_at_ms)
        {
            return None;
        }
        self.take_pending_save()
    }

    /// Returns the pending save regardless of its deadline.
    ///
    /// Sent ahead of add and explain so the appended item lands on top of
    /// the editor content instead of being overwritten by it later.
    pub fn take_pending_save(&mut self) -> Option<Request> {
        let pending = self.pending_save.take()?;
        self.last_saved = Some(pending.content.clone());
        Some(Request::UpdateNote {
            note_id: pending.note_id,
            content: pending.content,
        })
    }

    fn upsert(&mut self, note: Note) {
        match self.notes.iter_mut().find(|existing| existing.id == note.id) {
            Some(existing) => *existing = note,
            None => self.notes.push(note),
        }
    }

    /// Updates a note in the list and, when shown, in the editor.
    ///
    /// Unsaved editor content survives only the echo of this panel's own
    /// save. Any other body replaces the editor and drops the pending save.
    fn refresh_note(&mut self, mut note: Note) {
        self.upsert(note.clone());
        if !self.current.as_ref().is_some_and(|current| current.id == note.id) {
            return;
        }
        let own_echo = self.last_saved.as_deref() == Some(note.content.as_str());
        if let Some(pending) = self
            .pending_save
            .as_ref()
            .filter(|pending| pending.note_id == note.id)
        {
            if own_echo {
                note.content = pending.content.clone();
            } else {
                self.pending_save = None;
            }
        }
        if self.title.draft == self.title.committed {
            self.title.draft = note.title.clone();
        }
        self.title.committed = note.title.clone();
        self.current = Some(note);
    }
}
