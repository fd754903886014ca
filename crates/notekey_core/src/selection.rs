//! Page-side selection detector.
//!
//! # Responsibility
//! - Settle bursts of pointer/keyboard/selection events into one read.
//! - Resolve the selected text from the page sources in priority order.
//! - Forward new selections to the coordinator, asking for the panel first.
//!
//! # Invariants
//! - Only non-empty, trimmed text is forwarded.
//! - The same text is not forwarded twice within `DEDUPE_WINDOW_MS`.
//! - Cross-origin frames are never read.

use crate::clock::Clock;
use crate::coordinator::CoordinatorHandle;
use crate::protocol::Request;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub const RAW_EVENT_SETTLE_MS: i64 = 100;
pub const SELECTION_CHANGE_SETTLE_MS: i64 = 300;
pub const DEDUPE_WINDOW_MS: i64 = 1_000;

/// Identifier of an embedded frame on the host page.
pub type FrameId = u64;

/// Read access to whatever the host page currently has selected.
pub trait SelectionSurface: Send {
    /// Selection in the main document.
    fn document_selection(&self) -> Option<String>;
    /// Selected substring of the focused input or textarea.
    fn focused_field_selection(&self) -> Option<String>;
    /// Selection inside one attached frame.
    fn frame_selection(&self, frame: FrameId) -> Option<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionEvent {
    PointerUp,
    KeyUp,
    SelectionChange,
    FrameAttached { frame: FrameId, same_origin: bool },
    FrameDetached { frame: FrameId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AttachedFrame {
    id: FrameId,
    same_origin: bool,
}

/// Settle-and-dedupe state machine, driven by explicit timestamps.
#[derive(Debug, Default)]
pub struct SelectionDetector {
    frames: Vec<AttachedFrame>,
    deadline_ms: Option<i64>,
    last_forwarded: Option<(String, i64)>,
}

impl SelectionDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one page event. Selection events restart the settle timer.
    pub fn on_event(&mut self, event: SelectionEvent, now_ms: i64) {
        match event {
            SelectionEvent::PointerUp | SelectionEvent::KeyUp => {
                self.deadline_ms = Some(now_ms + RAW_EVENT_SETTLE_MS);
            }
            SelectionEvent::SelectionChange => {
                self.deadline_ms = Some(now_ms + SELECTION_CHANGE_SETTLE_MS);
            }
            SelectionEvent::FrameAttached { frame, same_origin } => {
                if self.frames.iter().any(|attached| attached.id == frame) {
                    return;
                }
                debug!(
                    "event=frame_attach module=selection status=ok frame={} same_origin={}",
                    frame, same_origin
                );
                self.frames.push(AttachedFrame {
                    id: frame,
                    same_origin,
                });
            }
            SelectionEvent::FrameDetached { frame } => {
                self.frames.retain(|attached| attached.id != frame);
            }
        }
    }

    /// When the pending settle timer fires, if any.
    pub fn deadline_ms(&self) -> Option<i64> {
        self.deadline_ms
    }

    pub fn attached_frames(&self) -> usize {
        self.frames.len()
    }

    /// Fires the settle timer when due and returns text to forward.
    pub fn poll(&mut self, now_ms: i64, surface: &dyn SelectionSurface) -> Option<String> {
        match self.deadline_ms {
            Some(deadline) if deadline <= now_ms => self.deadline_ms = None,
            _ => return None,
        }

        let text = self.resolve(surface)?;
        if let Some((previous, at)) = &self.last_forwarded {
            if *previous == text && now_ms - at < DEDUPE_WINDOW_MS {
                debug!("event=selection_dedupe module=selection status=skipped");
                return None;
            }
        }
        self.last_forwarded = Some((text.clone(), now_ms));
        Some(text)
    }

    /// First non-empty source: document, focused field, same-origin frames.
    pub fn resolve(&self, surface: &dyn SelectionSurface) -> Option<String> {
        non_empty(surface.document_selection())
            .or_else(|| non_empty(surface.focused_field_selection()))
            .or_else(|| {
                self.frames
                    .iter()
                    .filter(|frame| frame.same_origin)
                    .find_map(|frame| non_empty(surface.frame_selection(frame.id)))
            })
    }
}

fn non_empty(text: Option<String>) -> Option<String> {
    text.map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Feeds page events into a detector and forwards settled selections.
///
/// Returns when the event channel closes or the coordinator stops.
pub async fn run_detector<S: SelectionSurface>(
    mut events: mpsc::Receiver<SelectionEvent>,
    surface: S,
    handle: CoordinatorHandle,
    clock: Arc<dyn Clock>,
) {
    let mut detector = SelectionDetector::new();
    loop {
        let wait = detector
            .deadline_ms()
            .map(|deadline| Duration::from_millis((deadline - clock.now_ms()).max(0) as u64));

        tokio::select! {
            event = events.recv() => match event {
                Some(event) => detector.on_event(event, clock.now_ms()),
                None => break,
            },
            _ = sleep_or_pending(wait) => {
                let Some(text) = detector.poll(clock.now_ms(), &surface) else {
                    continue;
                };
                if !forward(&handle, text).await {
                    break;
                }
            }
        }
    }
    info!("event=selection_detector_stop module=selection status=ok");
}

async fn sleep_or_pending(wait: Option<Duration>) {
    match wait {
        Some(wait) => tokio::time::sleep(wait).await,
        None => std::future::pending::<()>().await,
    }
}

async fn forward(handle: &CoordinatorHandle, text: String) -> bool {
    let text_len = text.chars().count();
    let opened = handle.send(Request::OpenSidePanel).await;
    if !opened.is_success() && handle.is_closed() {
        warn!("event=selection_forward module=selection status=error error_code=coordinator_stopped");
        return false;
    }
    let relayed = handle.send(Request::SetHighlightedText { text }).await;
    debug!(
        "event=selection_forward module=selection status={} text_len={}",
        if relayed.is_success() { "ok" } else { "error" },
        text_len
    );
    !handle.is_closed()
}
