//! Store layer contracts and SQLite persistence.
//!
//! # Responsibility
//! - Define the use-case oriented data access contract (`NoteStore`).
//! - Isolate SQLite query details from service/sync orchestration.
//!
//! # Invariants
//! - Graph writes validate ownership before any SQL runs.
//! - Store APIs return semantic errors (`NotFound`, `ReferentialViolation`)
//!   in addition to DB transport errors.

pub mod note_store;
