//! Panel driver: sends user commands to the coordinator and folds
//! broadcasts into `PanelState`.
//!
//! # Responsibility
//! - Gate add/explain/create through the view model before sending.
//! - Refresh the cached note list after every note notification.
//! - Flush editor saves once the quiet period has elapsed, or right before
//!   add and explain.
//!
//! # Invariants
//! - Only successful responses change the rendered note.
//! - Requests are sent through `CoordinatorHandle`; the panel never writes
//!   the store.

pub mod state;

pub use state::{PanelAction, PanelState, BANNER_TIMEOUT_MS, SAVE_QUIET_PERIOD_MS};

use crate::clock::Clock;
use crate::coordinator::CoordinatorHandle;
use crate::notify::Notification;
use crate::protocol::{Request, Response};
use crate::service::debounce::DebounceWindows;
use log::debug;
use std::sync::Arc;

pub struct Panel {
    handle: CoordinatorHandle,
    clock: Arc<dyn Clock>,
    state: PanelState,
}

impl Panel {
    pub fn new(handle: CoordinatorHandle, clock: Arc<dyn Clock>, windows: DebounceWindows) -> Self {
        Self {
            handle,
            clock,
            state: PanelState::new(windows),
        }
    }

    pub fn state(&self) -> &PanelState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut PanelState {
        &mut self.state
    }

    /// Loads notes, the active note and settings.
    pub async fn load(&mut self) {
        self.refresh_notes().await;

        let active = self.handle.send(Request::GetActiveNote).await;
        if active.is_success() {
            self.state.set_current(active.note);
        } else {
            self.report(&active);
        }

        let settings = self.handle.send(Request::GetSettings).await;
        match settings.settings {
            Some(settings) => self.state.set_settings(settings),
            None => self.report(&settings),
        }
    }

    pub async fn refresh_notes(&mut self) {
        let response = self.handle.send(Request::GetAllNotes).await;
        match response.notes {
            Some(notes) => self.state.set_notes(notes),
            None => self.report(&response),
        }
    }

    /// Applies one broadcast, re-reading the list when notes changed.
    pub async fn on_notification(&mut self, notification: Notification) {
        let refresh = matches!(
            notification,
            Notification::NoteCreated { .. }
                | Notification::NoteDeleted { .. }
                | Notification::NoteRenamed { .. }
                | Notification::NoteUpdated { .. }
                | Notification::NoteSwitched { .. }
                | Notification::ExplanationComplete { .. }
        );
        debug!(
            "event=panel_notify module=panel status=ok type={}",
            notification.kind()
        );
        self.state.apply_notification(notification, self.clock.now_ms());
        if refresh {
            self.refresh_notes().await;
        }
    }

    /// Appends the highlighted text. Returns `None` when the button is
    /// disabled.
    pub async fn add(&mut self) -> Option<Response> {
        let text = self.state.highlighted_text()?.to_string();
        self.run(PanelAction::Add, Request::Add { text }).await
    }

    pub async fn explain(&mut self) -> Option<Response> {
        let text = self.state.highlighted_text()?.to_string();
        self.run(PanelAction::Explain, Request::Explain { text })
            .await
    }

    pub async fn create_note(&mut self) -> Option<Response> {
        self.run(PanelAction::Create, Request::CreateNote).await
    }

    pub async fn switch_note(&mut self, note_id: &str) -> Response {
        let response = self
            .handle
            .send(Request::SwitchNote {
                note_id: note_id.to_string(),
            })
            .await;
        match response.note.clone().filter(|_| response.is_success()) {
            Some(note) => self.state.set_current(Some(note)),
            None => self.report(&response),
        }
        response
    }

    /// Deletes a note, then reloads the list and the active note.
    pub async fn delete_note(&mut self, note_id: &str) -> Response {
        let response = self
            .handle
            .send(Request::DeleteNote {
                note_id: note_id.to_string(),
            })
            .await;
        if response.is_success() {
            self.load().await;
        } else {
            self.report(&response);
        }
        response
    }

    /// Blur or Enter on the title field.
    pub async fn commit_title(&mut self) -> Option<Response> {
        let request = self.state.commit_title()?;
        let response = self.handle.send(request).await;
        self.state.finish_rename(&response, self.clock.now_ms());
        Some(response)
    }

    /// Sends the pending editor save when it is due.
    pub async fn flush_due_save(&mut self) -> Option<Response> {
        let request = self.state.take_due_save(self.clock.now_ms())?;
        let response = self.handle.send(request).await;
        self.report(&response);
        Some(response)
    }

    async fn run(&mut self, action: PanelAction, request: Request) -> Option<Response> {
        if !self.state.begin(action, self.clock.now_ms()) {
            debug!(
                "event=panel_action module=panel status=skipped action={}",
                request.action()
            );
            return None;
        }
        if matches!(action, PanelAction::Add | PanelAction::Explain) {
            if let Some(save) = self.state.take_pending_save() {
                let saved = self.handle.send(save).await;
                self.report(&saved);
            }
        }
        let response = self.handle.send(request).await;
        self.state.finish(action, &response, self.clock.now_ms());
        Some(response)
    }

    fn report(&mut self, response: &Response) {
        self.state.report_failure(response, self.clock.now_ms());
    }
}
