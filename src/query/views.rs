//! Snapshot queries and the four observable views.
//!
//! # Responsibility
//! - Shape the read-side result sets (ordering, soft-delete exclusion).
//! - Wire snapshot queries into live subscriptions.
//!
//! # Invariants
//! - `observe_all`: active notes only, `created_at DESC`.
//! - `observe_by_kind(TASK)`: `due_at ASC` with NULLs last, then
//!   `created_at DESC`; plain notes fall back to `created_at DESC`.
//! - `search`: case-insensitive substring over title/description/content.
//! - Subscribers get the current snapshot first, then one snapshot per
//!   committed write.

use crate::model::note::{Note, NoteGraph, NoteKind};
use crate::query::live::Subscription;
use crate::repo::note_store::{
    kind_to_db, load_graph, parse_note_row, SqliteNoteStore, StoreResult, NOTE_SELECT_SQL,
};
use crossbeam::channel::unbounded;
use log::error;
use rusqlite::Connection;

impl SqliteNoteStore {
    /// Live view of all active notes with their relations.
    pub fn observe_all(&self) -> StoreResult<Subscription<Vec<NoteGraph>>> {
        self.subscribe(all_graphs)
    }

    /// Live view filtered by note kind.
    pub fn observe_by_kind(&self, kind: NoteKind) -> StoreResult<Subscription<Vec<NoteGraph>>> {
        self.subscribe(move |conn| graphs_by_kind(conn, kind))
    }

    /// Live view of one note with relations; `None` once soft-deleted.
    pub fn observe_by_id(&self, id: &str) -> StoreResult<Subscription<Option<NoteGraph>>> {
        let id = id.to_string();
        self.subscribe(move |conn| graph_by_id(conn, &id))
    }

    /// Live substring search over active notes.
    pub fn search(&self, query: &str) -> StoreResult<Subscription<Vec<Note>>> {
        let query = query.to_string();
        self.subscribe(move |conn| search_notes(conn, &query))
    }

    /// Sends the initial snapshot and registers the refresh watcher, both
    /// under the connection lock so no committed write lands in the gap.
    fn subscribe<T, F>(&self, snapshot: F) -> StoreResult<Subscription<T>>
    where
        T: Send + 'static,
        F: Fn(&Connection) -> StoreResult<T> + Send + 'static,
    {
        let conn = self.lock_conn();
        let (tx, rx) = unbounded();
        let initial = snapshot(&conn)?;
        let _ = tx.send(initial);

        self.views.register(Box::new(move |conn| match snapshot(conn) {
            Ok(value) => tx.send(value).is_ok(),
            Err(err) => {
                // Keep the subscriber; a transient failure on one refresh
                // must not silently end the stream.
                error!("event=view_refresh module=query status=error error={err}");
                true
            }
        }));

        Ok(Subscription::new(rx))
    }
}

pub(crate) fn all_graphs(conn: &Connection) -> StoreResult<Vec<NoteGraph>> {
    let mut stmt = conn.prepare(&format!(
        "{NOTE_SELECT_SQL}
         WHERE is_deleted = 0
         ORDER BY created_at DESC, id ASC;"
    ))?;
    let mut rows = stmt.query([])?;
    collect_graphs(conn, &mut rows)
}

pub(crate) fn graphs_by_kind(conn: &Connection, kind: NoteKind) -> StoreResult<Vec<NoteGraph>> {
    // Tasks sort by due date with undated tasks last; kinds other than task
    // collapse both CASE keys to constants and fall back to created_at.
    let mut stmt = conn.prepare(&format!(
        "{NOTE_SELECT_SQL}
         WHERE is_deleted = 0 AND kind = ?1
         ORDER BY
            CASE WHEN ?1 = 'task' AND due_at IS NULL THEN 1 ELSE 0 END ASC,
            CASE WHEN ?1 = 'task' THEN due_at END ASC,
            created_at DESC,
            id ASC;"
    ))?;
    let mut rows = stmt.query([kind_to_db(kind)])?;
    collect_graphs(conn, &mut rows)
}

pub(crate) fn graph_by_id(conn: &Connection, id: &str) -> StoreResult<Option<NoteGraph>> {
    let mut stmt = conn.prepare(&format!(
        "{NOTE_SELECT_SQL}
         WHERE is_deleted = 0 AND id = ?1;"
    ))?;
    let mut rows = stmt.query([id])?;
    if let Some(row) = rows.next()? {
        let note = parse_note_row(row)?;
        return Ok(Some(load_graph(conn, note)?));
    }
    Ok(None)
}

pub(crate) fn search_notes(conn: &Connection, query: &str) -> StoreResult<Vec<Note>> {
    let mut stmt = conn.prepare(&format!(
        "{NOTE_SELECT_SQL}
         WHERE is_deleted = 0 AND (
               title       LIKE '%' || ?1 || '%'
           OR  description LIKE '%' || ?1 || '%'
           OR  content     LIKE '%' || ?1 || '%'
         )
         ORDER BY created_at DESC, id ASC;"
    ))?;

    let mut rows = stmt.query([query])?;
    let mut notes = Vec::new();
    while let Some(row) = rows.next()? {
        notes.push(parse_note_row(row)?);
    }
    Ok(notes)
}

fn collect_graphs(
    conn: &Connection,
    rows: &mut rusqlite::Rows<'_>,
) -> StoreResult<Vec<NoteGraph>> {
    let mut notes = Vec::new();
    while let Some(row) = rows.next()? {
        notes.push(parse_note_row(row)?);
    }

    let mut graphs = Vec::with_capacity(notes.len());
    for note in notes {
        graphs.push(load_graph(conn, note)?);
    }
    Ok(graphs)
}
