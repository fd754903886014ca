//! Persistence layer: key-value store boundary and the note repository
//! built on top of it.
//!
//! # Responsibility
//! - Define the `get/set` store contract and its SQLite/in-memory backends.
//! - Map the three well-known keys (`notes`, `activeNoteId`, `settings`)
//!   onto typed note/settings APIs.
//!
//! # Invariants
//! - Reading an absent key yields an empty/default value, never an error.
//! - Every `set` is a single atomic write.

pub mod kv_store;
pub mod note_repo;
