//! Domain model for captured notes and user preferences.
//!
//! # Responsibility
//! - Define the records persisted by the store and carried by the message
//!   protocol.
//!
//! # Invariants
//! - Every note is identified by a stable `NoteId`.
//! - Field names serialize in camelCase to match the wire protocol.

pub mod note;
pub mod settings;
