//! Note store contract and SQLite implementation.
//!
//! # Responsibility
//! - Own the atomic graph-write protocol (note + attachments + reminders).
//! - Own the dirty-flag lifecycle consumed by the sync collaborator.
//! - Hold the process-wide shared connection and notify live views on commit.
//!
//! # Invariants
//! - A graph write commits all three steps or none of them.
//! - `created_at` is never overwritten by an upsert of an existing id.
//! - `mark_synced` is the only operation that clears the dirty flag.
//! - View refresh runs under the connection lock, after commit, so observers
//!   never see a half-applied graph.

use crate::db::DbError;
use crate::model::note::{
    Attachment, AttachmentKind, GraphValidationError, Note, NoteGraph, NoteId, NoteKind, Reminder,
};
use crate::query::ViewRegistry;
use log::{error, info};
use rusqlite::{params, Connection, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Default retention window before purge-confirmed tombstones are removed.
pub const DEFAULT_PURGE_RETENTION_MS: i64 = 30 * 24 * 60 * 60 * 1000;

pub type StoreResult<T> = Result<T, StoreError>;

/// Store layer error taxonomy.
#[derive(Debug)]
pub enum StoreError {
    /// Underlying engine I/O or constraint failure; the enclosing
    /// transaction has been rolled back.
    Db(DbError),
    /// Point operation on an id that is not present.
    NotFound(NoteId),
    /// A child row references a different note than the one being written.
    /// Rejected before commit.
    ReferentialViolation(GraphValidationError),
    /// Persisted or supplied state that violates the model contract.
    InvalidData(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "note not found: {id}"),
            Self::ReferentialViolation(err) => write!(f, "referential violation: {err}"),
            Self::InvalidData(message) => write!(f, "invalid note data: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::ReferentialViolation(err) => Some(err),
            Self::NotFound(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<GraphValidationError> for StoreError {
    fn from(value: GraphValidationError) -> Self {
        match value {
            GraphValidationError::EmptyNoteId => {
                Self::InvalidData("note id must not be blank".to_string())
            }
            other => Self::ReferentialViolation(other),
        }
    }
}

/// Store contract exposed to the service layer and the sync collaborator.
pub trait NoteStore {
    /// Point lookup, deleted rows included.
    fn get_by_id(&self, id: &str) -> StoreResult<Option<Note>>;
    /// Point lookup of the full graph, deleted rows included.
    fn get_graph(&self, id: &str) -> StoreResult<Option<NoteGraph>>;
    /// Atomically replaces the note row and both child sets.
    fn upsert_graph(&self, graph: &NoteGraph) -> StoreResult<()>;
    /// Notes with unsynced local changes, oldest edit first. Soft-deleted
    /// notes stay dirty until acknowledged, so one predicate covers both.
    fn list_pending_sync(&self) -> StoreResult<Vec<Note>>;
    /// Clears the dirty flag after the remote confirmed the copy. Idempotent
    /// on already-clean notes.
    fn mark_synced(&self, id: &str) -> StoreResult<()>;
    /// Hard-removes purge-confirmed tombstones older than the retention
    /// window. Returns the number of notes removed.
    fn purge_deleted(&self, retention_ms: i64, now_ms: i64) -> StoreResult<u32>;
}

/// SQLite-backed note store over a process-wide shared connection.
///
/// Cloning shares the same connection and view registry, so every component
/// operates through one storage handle as required by the concurrency model.
#[derive(Clone)]
pub struct SqliteNoteStore {
    pub(crate) conn: Arc<Mutex<Connection>>,
    pub(crate) views: Arc<ViewRegistry>,
}

impl SqliteNoteStore {
    /// Wraps a migrated/ready connection (see `db::open_db`).
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            views: Arc::new(ViewRegistry::default()),
        }
    }

    pub(crate) fn lock_conn(&self) -> MutexGuard<'_, Connection> {
        // Poisoning cannot leave a half-applied graph behind: SQLite rolls
        // back any transaction dropped mid-flight.
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of live view watchers.
    pub fn watcher_count(&self) -> usize {
        self.views.watcher_count()
    }
}

impl NoteStore for SqliteNoteStore {
    fn get_by_id(&self, id: &str) -> StoreResult<Option<Note>> {
        let conn = self.lock_conn();
        get_note(&conn, id)
    }

    fn get_graph(&self, id: &str) -> StoreResult<Option<NoteGraph>> {
        let conn = self.lock_conn();
        let Some(note) = get_note(&conn, id)? else {
            return Ok(None);
        };
        Ok(Some(load_graph(&conn, note)?))
    }

    fn upsert_graph(&self, graph: &NoteGraph) -> StoreResult<()> {
        graph.validate()?;

        let mut conn = self.lock_conn();
        let result = write_graph(&mut conn, graph);
        match &result {
            Ok(()) => {
                info!(
                    "event=graph_write module=store status=ok note_id={} attachments={} reminders={}",
                    graph.note.id,
                    graph.attachments.len(),
                    graph.reminders.len()
                );
                self.views.refresh(&conn);
            }
            Err(err) => {
                error!(
                    "event=graph_write module=store status=error note_id={} error={}",
                    graph.note.id, err
                );
            }
        }
        result
    }

    fn list_pending_sync(&self) -> StoreResult<Vec<Note>> {
        let conn = self.lock_conn();
        let mut stmt = conn.prepare(&format!(
            "{NOTE_SELECT_SQL}
             WHERE dirty = 1
             ORDER BY updated_at ASC, id ASC;"
        ))?;

        let mut rows = stmt.query([])?;
        let mut notes = Vec::new();
        while let Some(row) = rows.next()? {
            notes.push(parse_note_row(row)?);
        }
        Ok(notes)
    }

    fn mark_synced(&self, id: &str) -> StoreResult<()> {
        let conn = self.lock_conn();
        let changed = conn.execute("UPDATE notes SET dirty = 0 WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }

        info!("event=mark_synced module=store status=ok note_id={id}");
        self.views.refresh(&conn);
        Ok(())
    }

    fn purge_deleted(&self, retention_ms: i64, now_ms: i64) -> StoreResult<u32> {
        let conn = self.lock_conn();
        // Children go with the note via FK cascade.
        let removed = conn.execute(
            "DELETE FROM notes
             WHERE is_deleted = 1
               AND dirty = 0
               AND updated_at <= ?1;",
            [now_ms.saturating_sub(retention_ms)],
        )?;

        if removed > 0 {
            info!("event=purge module=store status=ok removed={removed}");
        }
        Ok(removed as u32)
    }
}

pub(crate) const NOTE_SELECT_SQL: &str = "SELECT
    id,
    title,
    description,
    content,
    kind,
    created_at,
    updated_at,
    due_at,
    completed,
    is_deleted,
    dirty
FROM notes";

fn write_graph(conn: &mut Connection, graph: &NoteGraph) -> StoreResult<()> {
    let note = &graph.note;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    // created_at is deliberately absent from the conflict-update set; the
    // original value survives every resave of an existing id.
    tx.execute(
        "INSERT INTO notes (
            id, title, description, content, kind,
            created_at, updated_at, due_at, completed, is_deleted, dirty
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        ON CONFLICT (id) DO UPDATE SET
            title = excluded.title,
            description = excluded.description,
            content = excluded.content,
            kind = excluded.kind,
            updated_at = excluded.updated_at,
            due_at = excluded.due_at,
            completed = excluded.completed,
            is_deleted = excluded.is_deleted,
            dirty = excluded.dirty;",
        params![
            note.id,
            note.title,
            note.description,
            note.content,
            kind_to_db(note.kind),
            note.created_at,
            note.updated_at,
            note.due_at,
            bool_to_int(note.completed),
            bool_to_int(note.is_deleted),
            bool_to_int(note.dirty),
        ],
    )?;

    tx.execute("DELETE FROM attachments WHERE note_id = ?1;", [&note.id])?;
    for attachment in &graph.attachments {
        tx.execute(
            "INSERT OR REPLACE INTO attachments (note_id, kind, uri, description)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                attachment.note_id,
                attachment_kind_to_db(attachment.kind),
                attachment.uri,
                attachment.description,
            ],
        )?;
    }

    tx.execute("DELETE FROM reminders WHERE note_id = ?1;", [&note.id])?;
    for reminder in &graph.reminders {
        tx.execute(
            "INSERT INTO reminders (note_id, trigger_at) VALUES (?1, ?2);",
            params![reminder.note_id, reminder.trigger_at],
        )?;
    }

    tx.commit()?;
    Ok(())
}

pub(crate) fn get_note(conn: &Connection, id: &str) -> StoreResult<Option<Note>> {
    let mut stmt = conn.prepare(&format!("{NOTE_SELECT_SQL} WHERE id = ?1;"))?;
    let mut rows = stmt.query([id])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_note_row(row)?));
    }
    Ok(None)
}

pub(crate) fn load_graph(conn: &Connection, note: Note) -> StoreResult<NoteGraph> {
    let mut stmt = conn.prepare(
        "SELECT note_id, kind, uri, description
         FROM attachments
         WHERE note_id = ?1
         ORDER BY uri ASC;",
    )?;
    let mut rows = stmt.query([&note.id])?;
    let mut attachments = Vec::new();
    while let Some(row) = rows.next()? {
        let kind_text: String = row.get("kind")?;
        attachments.push(Attachment {
            note_id: row.get("note_id")?,
            kind: parse_attachment_kind(&kind_text).ok_or_else(|| {
                StoreError::InvalidData(format!(
                    "invalid attachment kind `{kind_text}` in attachments.kind"
                ))
            })?,
            uri: row.get("uri")?,
            description: row.get("description")?,
        });
    }

    let mut stmt = conn.prepare(
        "SELECT note_id, trigger_at
         FROM reminders
         WHERE note_id = ?1
         ORDER BY trigger_at ASC;",
    )?;
    let mut rows = stmt.query([&note.id])?;
    let mut reminders = Vec::new();
    while let Some(row) = rows.next()? {
        reminders.push(Reminder {
            note_id: row.get("note_id")?,
            trigger_at: row.get("trigger_at")?,
        });
    }

    Ok(NoteGraph {
        note,
        attachments,
        reminders,
    })
}

pub(crate) fn parse_note_row(row: &rusqlite::Row<'_>) -> StoreResult<Note> {
    let kind_text: String = row.get("kind")?;
    let kind = parse_kind(&kind_text).ok_or_else(|| {
        StoreError::InvalidData(format!("invalid note kind `{kind_text}` in notes.kind"))
    })?;

    Ok(Note {
        id: row.get("id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        content: row.get("content")?,
        kind,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        due_at: row.get("due_at")?,
        completed: int_to_bool(row.get("completed")?, "notes.completed")?,
        is_deleted: int_to_bool(row.get("is_deleted")?, "notes.is_deleted")?,
        dirty: int_to_bool(row.get("dirty")?, "notes.dirty")?,
    })
}

pub(crate) fn kind_to_db(kind: NoteKind) -> &'static str {
    match kind {
        NoteKind::Note => "note",
        NoteKind::Task => "task",
    }
}

fn parse_kind(value: &str) -> Option<NoteKind> {
    match value {
        "note" => Some(NoteKind::Note),
        "task" => Some(NoteKind::Task),
        _ => None,
    }
}

fn attachment_kind_to_db(kind: AttachmentKind) -> &'static str {
    match kind {
        AttachmentKind::Image => "image",
        AttachmentKind::Video => "video",
    }
}

fn parse_attachment_kind(value: &str) -> Option<AttachmentKind> {
    match value {
        "image" => Some(AttachmentKind::Image),
        "video" => Some(AttachmentKind::Video),
        _ => None,
    }
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

fn int_to_bool(value: i64, column: &'static str) -> StoreResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(StoreError::InvalidData(format!(
            "invalid boolean value `{other}` in {column}"
        ))),
    }
}
