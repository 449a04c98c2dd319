//! Subscription channel and watcher registry for live views.
//!
//! # Responsibility
//! - Deliver query snapshots to observers without blocking the writer.
//! - Prune observers whose receiving side has been dropped.
//!
//! # Invariants
//! - A new observer receives the current snapshot before any delta.
//! - Refresh runs under the store's connection lock, so emissions for one
//!   note are ordered the same way its commits were.

use crossbeam::channel::{Receiver, RecvTimeoutError, TryRecvError};
use rusqlite::Connection;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Recomputes one view and pushes the snapshot. Returns `false` once the
/// observer is gone and the watcher should be dropped.
pub(crate) type RefreshFn = Box<dyn FnMut(&Connection) -> bool + Send>;

/// Live stream of query snapshots.
///
/// The stream lives until the subscription is dropped; dropping it
/// disconnects the channel and the registry releases the watcher on the
/// next refresh.
pub struct Subscription<T> {
    rx: Receiver<T>,
}

impl<T> Subscription<T> {
    pub(crate) fn new(rx: Receiver<T>) -> Self {
        Self { rx }
    }

    /// Blocks until the next snapshot. Returns `None` when the store side
    /// has been dropped.
    pub fn recv(&self) -> Option<T> {
        self.rx.recv().ok()
    }

    /// Returns the next snapshot if one is already queued.
    pub fn try_recv(&self) -> Option<T> {
        match self.rx.try_recv() {
            Ok(value) => Some(value),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Blocks up to `timeout` for the next snapshot.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<T> {
        match self.rx.recv_timeout(timeout) {
            Ok(value) => Some(value),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Drains queued snapshots and returns the most recent one, if any.
    ///
    /// Useful for observers that only care about the latest state.
    pub fn latest(&self) -> Option<T> {
        let mut newest = None;
        while let Some(value) = self.try_recv() {
            newest = Some(value);
        }
        newest
    }
}

/// Registry of active view watchers, shared by all clones of the store.
#[derive(Default)]
pub(crate) struct ViewRegistry {
    watchers: Mutex<Vec<RefreshFn>>,
}

impl ViewRegistry {
    /// Adds one watcher. The initial snapshot must already have been sent by
    /// the caller while holding the connection lock.
    pub(crate) fn register(&self, watcher: RefreshFn) {
        self.lock().push(watcher);
    }

    /// Re-runs every watcher against the current committed state, dropping
    /// the ones whose observers disconnected.
    pub(crate) fn refresh(&self, conn: &Connection) {
        self.lock().retain_mut(|watcher| watcher(conn));
    }

    /// Number of live watchers. Exposed for observability and tests.
    pub(crate) fn watcher_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<RefreshFn>> {
        // A poisoned registry only means a watcher panicked mid-refresh;
        // the vector itself is still usable.
        self.watchers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
