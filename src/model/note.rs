//! Note domain model and graph ownership rules.
//!
//! # Responsibility
//! - Define `Note`, `Attachment`, `Reminder` and the `NoteGraph` write unit.
//! - Validate graph ownership before any persistence happens.
//!
//! # Invariants
//! - `id` is stable and never reused for another note.
//! - `created_at` is set once at creation and never mutated afterwards.
//! - `is_deleted` is the source of truth for tombstone state.
//! - Every attachment/reminder in a graph must reference its owning note.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for a note.
///
/// Kept as a type alias to make semantic intent explicit in signatures. Values
/// are uuid v4 strings generated client-side.
pub type NoteId = String;

/// Category of a note record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NoteKind {
    /// Free-form note.
    Note,
    /// Actionable task with optional due date and completion state.
    Task,
}

/// Media category of an attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttachmentKind {
    Image,
    Video,
}

/// Root entity of the store.
///
/// `due_at` and `completed` are meaningful only when `kind == NoteKind::Task`;
/// they are stored as given and ignored for plain notes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Stable global id, immutable once created.
    pub id: NoteId,
    pub title: String,
    pub description: String,
    pub content: String,
    pub kind: NoteKind,
    /// Unix epoch milliseconds, write-once.
    pub created_at: i64,
    /// Unix epoch milliseconds, refreshed on every mutating write.
    pub updated_at: i64,
    /// Task due date in epoch milliseconds.
    pub due_at: Option<i64>,
    pub completed: bool,
    /// Soft-delete tombstone kept for sync propagation until purge.
    pub is_deleted: bool,
    /// Local changes not yet confirmed present on the remote.
    pub dirty: bool,
}

impl Note {
    /// Creates a fresh note with a generated id and both timestamps at `now_ms`.
    ///
    /// New notes start `dirty` so the first sync run picks them up.
    pub fn new(kind: NoteKind, title: impl Into<String>, now_ms: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            description: String::new(),
            content: String::new(),
            kind,
            created_at: now_ms,
            updated_at: now_ms,
            due_at: None,
            completed: false,
            is_deleted: false,
            dirty: true,
        }
    }

    /// Returns whether this note should be visible to query views.
    pub fn is_active(&self) -> bool {
        !self.is_deleted
    }

    /// Validates fields the store itself enforces.
    ///
    /// Only identifier presence is checked here; non-blank titles are a
    /// UI-layer rule enforced by the service.
    pub fn validate(&self) -> Result<(), GraphValidationError> {
        if self.id.trim().is_empty() {
            return Err(GraphValidationError::EmptyNoteId);
        }
        Ok(())
    }
}

/// Media reference owned by exactly one note.
///
/// Identity for removal purposes is `(note_id, uri)`; the store keeps no
/// synthetic key. The underlying media resource lifecycle is external.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub note_id: NoteId,
    pub kind: AttachmentKind,
    /// Opaque locator of the media resource.
    pub uri: String,
    pub description: Option<String>,
}

/// Scheduled reminder owned by exactly one note. Delivery is external.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    pub note_id: NoteId,
    /// Fire time in epoch milliseconds.
    pub trigger_at: i64,
}

/// The atomic write unit: one note plus its full child sets.
///
/// A graph write fully replaces the attachment and reminder sets for the
/// note; it is never an incremental append.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteGraph {
    pub note: Note,
    pub attachments: Vec<Attachment>,
    pub reminders: Vec<Reminder>,
}

impl NoteGraph {
    /// Wraps a note with empty child sets.
    pub fn bare(note: Note) -> Self {
        Self {
            note,
            attachments: Vec::new(),
            reminders: Vec::new(),
        }
    }

    /// Validates ownership before the graph reaches SQL.
    ///
    /// # Errors
    /// - `EmptyNoteId` when the note id is blank.
    /// - `ForeignAttachment`/`ForeignReminder` when a child references a
    ///   different note than the one being written.
    pub fn validate(&self) -> Result<(), GraphValidationError> {
        self.note.validate()?;

        for attachment in &self.attachments {
            if attachment.note_id != self.note.id {
                return Err(GraphValidationError::ForeignAttachment {
                    expected: self.note.id.clone(),
                    found: attachment.note_id.clone(),
                    uri: attachment.uri.clone(),
                });
            }
        }

        for reminder in &self.reminders {
            if reminder.note_id != self.note.id {
                return Err(GraphValidationError::ForeignReminder {
                    expected: self.note.id.clone(),
                    found: reminder.note_id.clone(),
                });
            }
        }

        Ok(())
    }
}

/// Graph-level validation failures detected before commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphValidationError {
    EmptyNoteId,
    ForeignAttachment {
        expected: NoteId,
        found: NoteId,
        uri: String,
    },
    ForeignReminder {
        expected: NoteId,
        found: NoteId,
    },
}

impl Display for GraphValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyNoteId => write!(f, "note id must not be blank"),
            Self::ForeignAttachment {
                expected,
                found,
                uri,
            } => write!(
                f,
                "attachment `{uri}` references note {found}, expected {expected}"
            ),
            Self::ForeignReminder { expected, found } => {
                write!(f, "reminder references note {found}, expected {expected}")
            }
        }
    }
}

impl Error for GraphValidationError {}
