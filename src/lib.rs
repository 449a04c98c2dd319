//! Local-first persistence core for a notes/tasks application.
//!
//! The store stays fully usable offline: reads go through live query views
//! that never touch the network, writes are atomic local graph writes that
//! mark the note dirty, and a key-deduplicated scheduler wakes the sync
//! collaborator to reconcile dirty records with the remote.

pub mod db;
pub mod logging;
pub mod model;
pub mod query;
pub mod repo;
pub mod service;
pub mod sync;

pub use logging::{default_log_level, init_logging, logging_status};
pub use model::note::{
    Attachment, AttachmentKind, GraphValidationError, Note, NoteGraph, NoteId, NoteKind, Reminder,
};
pub use query::Subscription;
pub use repo::note_store::{
    NoteStore, SqliteNoteStore, StoreError, StoreResult, DEFAULT_PURGE_RETENTION_MS,
};
pub use service::note_service::{NoteDraft, NoteService, NoteServiceError};
pub use sync::scheduler::{
    ExistingJobPolicy, JobRunOutcome, JobRunStatus, JobSchedule, JobSpec, SchedulerError,
    SyncScheduler, DEFAULT_SYNC_INTERVAL_MS, SYNC_ONCE_JOB_KEY, SYNC_PERIODIC_JOB_KEY,
};
pub use sync::worker::{NetworkMonitor, SyncFailure, SyncReport, SyncWorker};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
