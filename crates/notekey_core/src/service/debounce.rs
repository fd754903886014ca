//! Duplicate-submission guard for add/explain/create requests.
//!
//! # Responsibility
//! - Remember the last accepted payload and timestamp per request kind.
//! - Reject a request whose payload matches the last accepted one inside
//!   that kind's trailing window.
//!
//! # Invariants
//! - Kinds are independent: an accepted add never affects explain/create.
//! - Only accepted requests update the record.
//! - Records live in memory only and are never persisted.

use std::collections::HashMap;
use std::time::Duration;

/// Request kinds subject to debounce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DebounceKind {
    AddText,
    ExplainText,
    CreateNote,
}

impl DebounceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AddText => "add_text",
            Self::ExplainText => "explain_text",
            Self::CreateNote => "create_note",
        }
    }
}

/// Trailing windows per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceWindows {
    pub add_text: Duration,
    pub explain_text: Duration,
    pub create_note: Duration,
}

impl Default for DebounceWindows {
    fn default() -> Self {
        Self {
            add_text: Duration::from_millis(1_500),
            explain_text: Duration::from_millis(2_000),
            create_note: Duration::from_millis(2_000),
        }
    }
}

impl DebounceWindows {
    pub fn window(&self, kind: DebounceKind) -> Duration {
        match kind {
            DebounceKind::AddText => self.add_text,
            DebounceKind::ExplainText => self.explain_text,
            DebounceKind::CreateNote => self.create_note,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct DebounceRecord {
    /// `None` for kinds where any request counts as a duplicate.
    payload: Option<String>,
    accepted_at_ms: i64,
}

/// Per-kind admission guard. Owned by one coordinator instance.
#[derive(Debug, Clone, Default)]
pub struct DebounceGuard {
    windows: DebounceWindows,
    records: HashMap<DebounceKind, DebounceRecord>,
}

impl DebounceGuard {
    pub fn new(windows: DebounceWindows) -> Self {
        Self {
            windows,
            records: HashMap::new(),
        }
    }

    pub fn windows(&self) -> &DebounceWindows {
        &self.windows
    }

    /// Admits or rejects one request at `now_ms`.
    ///
    /// `payload = None` matches any previous request of the same kind.
    /// Returns `true` and records the request when admitted.
    pub fn admit(&mut self, kind: DebounceKind, payload: Option<&str>, now_ms: i64) -> bool {
        let window_ms = self.windows.window(kind).as_millis() as i64;
        if let Some(last) = self.records.get(&kind) {
            let same_payload = match (payload, last.payload.as_deref()) {
                (None, _) => true,
                (Some(current), Some(previous)) => current == previous,
                (Some(_), None) => false,
            };
            let elapsed = now_ms.saturating_sub(last.accepted_at_ms);
            if same_payload && elapsed < window_ms {
                return false;
            }
        }

        self.records.insert(
            kind,
            DebounceRecord {
                payload: payload.map(str::to_string),
                accepted_at_ms: now_ms,
            },
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::{DebounceGuard, DebounceKind, DebounceWindows};

    #[test]
    fn same_text_inside_window_is_rejected() {
        let mut guard = DebounceGuard::new(DebounceWindows::default());
        assert!(guard.admit(DebounceKind::AddText, Some("hello"), 0));
        assert!(!guard.admit(DebounceKind::AddText, Some("hello"), 1_499));
    }

    #[test]
    fn same_text_after_window_is_admitted() {
        let mut guard = DebounceGuard::new(DebounceWindows::default());
        assert!(guard.admit(DebounceKind::AddText, Some("hello"), 0));
        assert!(guard.admit(DebounceKind::AddText, Some("hello"), 1_500));
    }

    #[test]
    fn different_text_is_admitted_immediately() {
        let mut guard = DebounceGuard::new(DebounceWindows::default());
        assert!(guard.admit(DebounceKind::ExplainText, Some("a"), 0));
        assert!(guard.admit(DebounceKind::ExplainText, Some("b"), 10));
        assert!(!guard.admit(DebounceKind::ExplainText, Some("b"), 20));
    }

    #[test]
    fn kinds_do_not_share_records() {
        let mut guard = DebounceGuard::new(DebounceWindows::default());
        assert!(guard.admit(DebounceKind::AddText, Some("x"), 0));
        assert!(guard.admit(DebounceKind::ExplainText, Some("x"), 0));
        assert!(guard.admit(DebounceKind::CreateNote, None, 0));
    }

    #[test]
    fn create_rejects_any_request_inside_window() {
        let mut guard = DebounceGuard::new(DebounceWindows::default());
        assert!(guard.admit(DebounceKind::CreateNote, None, 0));
        assert!(!guard.admit(DebounceKind::CreateNote, None, 1_999));
        assert!(guard.admit(DebounceKind::CreateNote, None, 2_000));
    }

    #[test]
    fn rejection_does_not_extend_window() {
        let mut guard = DebounceGuard::new(DebounceWindows::default());
        assert!(guard.admit(DebounceKind::CreateNote, None, 0));
        assert!(!guard.admit(DebounceKind::CreateNote, None, 1_000));
        assert!(guard.admit(DebounceKind::CreateNote, None, 2_000));
    }
}
