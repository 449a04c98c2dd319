//! Use-case services over the note store.
//!
//! # Responsibility
//! - Orchestrate store calls into UI-facing save/delete flows.
//! - Keep presentation layers decoupled from storage details.

pub mod note_service;
