//! Domain model for notes, attachments and reminders.
//!
//! # Responsibility
//! - Define the canonical records persisted by the store layer.
//! - Keep graph-level ownership validation next to the data shapes.
//!
//! # Invariants
//! - Every note is identified by a stable string id, never reused.
//! - Deletion is represented by soft-delete tombstones, not hard delete.

pub mod note;
