//! Live query views over the note store.
//!
//! # Responsibility
//! - Expose push-based read views that never block writers.
//! - Keep snapshot SQL for the read side in one place.
//!
//! # Invariants
//! - Soft-deleted notes are excluded from every view.
//! - Every committed write is reflected by a fresh snapshot emission.

mod live;
pub mod views;

pub use live::Subscription;
pub(crate) use live::ViewRegistry;
