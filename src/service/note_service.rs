//! Note use-case service.
//!
//! # Responsibility
//! - Turn edit-flow drafts into well-formed graph writes.
//! - Own the UI-layer rules the store does not enforce (non-blank title,
//!   task-only due/completed fields).
//! - Stamp `dirty=true` and a fresh `updated_at` on every local edit.
//!
//! # Invariants
//! - Saves are full-replace graph writes; child sets are re-keyed to the
//!   note id before persistence.
//! - `created_at` of an existing note is threaded through edits unchanged.
//! - Deletes are soft and leave the note sync-eligible until acknowledged.

use crate::model::note::{Attachment, Note, NoteGraph, NoteId, NoteKind, Reminder};
use crate::repo::note_store::{NoteStore, StoreError, StoreResult};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Edit-flow input for a save. `id=None` means a fresh note.
#[derive(Debug, Clone, Default)]
pub struct NoteDraft {
    pub id: Option<NoteId>,
    pub title: String,
    pub description: String,
    pub content: String,
    pub kind: Option<NoteKind>,
    pub due_at: Option<i64>,
    pub completed: bool,
    /// Full desired attachment set; `note_id` values are re-keyed on save.
    pub attachments: Vec<Attachment>,
    /// Full desired reminder set; `note_id` values are re-keyed on save.
    pub reminders: Vec<Reminder>,
}

/// Service error for note use-cases.
#[derive(Debug)]
pub enum NoteServiceError {
    /// The edit flow requires a non-blank title.
    EmptyTitle,
    /// Target note does not exist.
    NoteNotFound(NoteId),
    /// Persistence-layer failure.
    Store(StoreError),
    /// Internal consistency mismatch between write and read-back.
    InconsistentState(&'static str),
}

impl Display for NoteServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTitle => write!(f, "note title must not be blank"),
            Self::NoteNotFound(id) => write!(f, "note not found: {id}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => write!(f, "inconsistent note state: {details}"),
        }
    }
}

impl Error for NoteServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for NoteServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(id) => Self::NoteNotFound(id),
            other => Self::Store(other),
        }
    }
}

/// Note service facade over store implementations.
pub struct NoteService<S: NoteStore> {
    store: S,
}

impl<S: NoteStore> NoteService<S> {
    /// Creates a service using the provided store implementation.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Saves one draft as an atomic graph write and returns the committed
    /// graph.
    ///
    /// Fresh drafts get a generated uuid; edits keep the note's original
    /// `created_at`. Due date and completion are zeroed for plain notes,
    /// mirroring how the edit flow treats them as task-only fields.
    pub fn save(&self, draft: NoteDraft, now_ms: i64) -> Result<NoteGraph, NoteServiceError> {
        if draft.title.trim().is_empty() {
            return Err(NoteServiceError::EmptyTitle);
        }

        let kind = draft.kind.unwrap_or(NoteKind::Note);
        let id = draft
            .id
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let created_at = match self.store.get_by_id(&id)? {
            Some(existing) => existing.created_at,
            None => now_ms,
        };

        let note = Note {
            id: id.clone(),
            title: draft.title.trim().to_string(),
            description: draft.description.trim().to_string(),
            content: draft.content.trim().to_string(),
            kind,
            created_at,
            updated_at: now_ms,
            due_at: if kind == NoteKind::Task {
                draft.due_at
            } else {
                None
            },
            completed: kind == NoteKind::Task && draft.completed,
            is_deleted: false,
            dirty: true,
        };

        let attachments = draft
            .attachments
            .into_iter()
            .map(|attachment| Attachment {
                note_id: id.clone(),
                ..attachment
            })
            .collect();
        let reminders = draft
            .reminders
            .into_iter()
            .map(|reminder| Reminder {
                note_id: id.clone(),
                ..reminder
            })
            .collect();

        let graph = NoteGraph {
            note,
            attachments,
            reminders,
        };
        self.store.upsert_graph(&graph)?;
        self.store
            .get_graph(&id)?
            .ok_or(NoteServiceError::InconsistentState(
                "saved note not found in read-back",
            ))
    }

    /// Soft-deletes one note through the graph-write path.
    ///
    /// Children are preserved so the deletion can still propagate upstream;
    /// physical removal happens via `purge_deleted` once the sync
    /// collaborator has acknowledged it.
    pub fn delete(&self, id: &str, now_ms: i64) -> Result<(), NoteServiceError> {
        let mut graph = self
            .store
            .get_graph(id)?
            .ok_or_else(|| NoteServiceError::NoteNotFound(id.to_string()))?;

        graph.note.is_deleted = true;
        graph.note.dirty = true;
        graph.note.updated_at = now_ms;
        self.store.upsert_graph(&graph)?;
        Ok(())
    }

    /// Removes one attachment, identified by `(note_id, uri)`, via a
    /// full-replace write with that attachment excluded.
    pub fn remove_attachment(
        &self,
        id: &str,
        uri: &str,
        now_ms: i64,
    ) -> Result<NoteGraph, NoteServiceError> {
        let mut graph = self
            .store
            .get_graph(id)?
            .ok_or_else(|| NoteServiceError::NoteNotFound(id.to_string()))?;

        graph
            .attachments
            .retain(|attachment| attachment.uri != uri);
        graph.note.dirty = true;
        graph.note.updated_at = now_ms;
        self.store.upsert_graph(&graph)?;

        self.store
            .get_graph(id)?
            .ok_or(NoteServiceError::InconsistentState(
                "note missing after attachment removal",
            ))
    }

    /// Gets one note graph by id, deleted rows included.
    pub fn get(&self, id: &str) -> StoreResult<Option<NoteGraph>> {
        self.store.get_graph(id)
    }

    /// Hard-removes purge-confirmed tombstones older than the retention
    /// window.
    pub fn purge_deleted(&self, retention_ms: i64, now_ms: i64) -> StoreResult<u32> {
        self.store.purge_deleted(retention_ms, now_ms)
    }
}
