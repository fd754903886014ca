//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into note-level operations.
//! - Hold the debounce admission policy applied in front of them.
//! - Keep the coordinator decoupled from storage details.

pub mod debounce;
pub mod note_service;
