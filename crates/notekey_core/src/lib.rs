//! Core domain logic for NoteKey.
//! This crate is the single source of truth for note state and the
//! request/notification protocol.

pub mod clock;
pub mod config;
pub mod coordinator;
pub mod db;
pub mod explain;
pub mod logging;
pub mod model;
pub mod notify;
pub mod panel;
pub mod protocol;
pub mod repo;
pub mod selection;
pub mod service;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, NoteKeyConfig};
pub use coordinator::{Coordinator, CoordinatorError, CoordinatorHandle};
pub use explain::{ExplainError, ExplanationClient, GeminiClient};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::note::{Note, NoteId};
pub use model::settings::Settings;
pub use notify::{Notification, NotificationHub, Subscription};
pub use protocol::{Reply, Request, Response};
pub use repo::kv_store::{KvStore, MemoryKvStore, SqliteKvStore, StoreError};
pub use repo::note_repo::{KvNoteRepository, NoteRepository};
pub use service::debounce::DebounceWindows;
pub use service::note_service::NoteService;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
