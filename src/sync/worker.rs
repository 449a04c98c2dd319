//! Sync worker contract.
//!
//! # Responsibility
//! - Define the boundary the scheduler dispatches to.
//!
//! The implementation is an external collaborator: it drains
//! `NoteStore::list_pending_sync`, pushes/pulls against the remote, and is
//! the only party allowed to call `NoteStore::mark_synced`. Conflict policy
//! on concurrent remote changes is the worker's decision, not the store's.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Outcome of one successful reconciliation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Local dirty notes confirmed on the remote.
    pub pushed: u32,
    /// Remote changes applied locally.
    pub pulled: u32,
}

/// Network or remote-side failure during reconciliation.
///
/// A failed run must leave every dirty flag untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncFailure {
    /// Stable machine-readable code.
    pub code: String,
    /// Human-readable detail for logs.
    pub message: String,
    /// Whether the worker considers the failure worth retrying.
    pub retryable: bool,
}

impl SyncFailure {
    pub fn new(code: impl Into<String>, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            retryable,
        }
    }
}

impl Display for SyncFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "sync failed ({}): {} retryable={}",
            self.code, self.message, self.retryable
        )
    }
}

impl Error for SyncFailure {}

/// Boundary consumed by `SyncScheduler::run_due`.
pub trait SyncWorker {
    /// Runs one push/pull reconciliation pass against the remote.
    fn reconcile(&mut self) -> Result<SyncReport, SyncFailure>;
}

/// Network reachability probe gating job dispatch.
pub trait NetworkMonitor {
    fn is_connected(&self) -> bool;
}
