use carnet::db::open_db_in_memory;
use carnet::{
    Attachment, AttachmentKind, NoteDraft, NoteKind, NoteService, NoteServiceError, NoteStore,
    Reminder, SqliteNoteStore,
};

fn service() -> (NoteService<SqliteNoteStore>, SqliteNoteStore) {
    let store = SqliteNoteStore::new(open_db_in_memory().unwrap());
    (NoteService::new(store.clone()), store)
}

fn draft(title: &str) -> NoteDraft {
    NoteDraft {
        title: title.to_string(),
        ..NoteDraft::default()
    }
}

#[test]
fn save_creates_a_dirty_note_with_generated_id() {
    let (service, _store) = service();
    let saved = service.save(draft("  First note  "), 1_000).unwrap();

    assert!(!saved.note.id.is_empty());
    assert_eq!(saved.note.title, "First note");
    assert_eq!(saved.note.created_at, 1_000);
    assert_eq!(saved.note.updated_at, 1_000);
    assert!(saved.note.dirty);
    assert!(!saved.note.is_deleted);
}

#[test]
fn save_rejects_blank_titles() {
    let (service, _store) = service();
    let err = service.save(draft("   "), 1_000).unwrap_err();
    assert!(matches!(err, NoteServiceError::EmptyTitle));
}

#[test]
fn editing_keeps_the_original_created_at() {
    let (service, _store) = service();
    let created = service.save(draft("v1"), 1_000).unwrap();

    let edited = service
        .save(
            NoteDraft {
                id: Some(created.note.id.clone()),
                title: "v2".to_string(),
                ..NoteDraft::default()
            },
            5_000,
        )
        .unwrap();

    assert_eq!(edited.note.created_at, 1_000);
    assert_eq!(edited.note.updated_at, 5_000);
    assert_eq!(edited.note.title, "v2");
}

#[test]
fn task_only_fields_are_zeroed_for_plain_notes() {
    let (service, _store) = service();
    let saved = service
        .save(
            NoteDraft {
                title: "note with stray task fields".to_string(),
                kind: Some(NoteKind::Note),
                due_at: Some(9_999),
                completed: true,
                ..NoteDraft::default()
            },
            1_000,
        )
        .unwrap();

    assert_eq!(saved.note.due_at, None);
    assert!(!saved.note.completed);

    let task = service
        .save(
            NoteDraft {
                title: "real task".to_string(),
                kind: Some(NoteKind::Task),
                due_at: Some(9_999),
                completed: true,
                ..NoteDraft::default()
            },
            1_000,
        )
        .unwrap();
    assert_eq!(task.note.due_at, Some(9_999));
    assert!(task.note.completed);
}

#[test]
fn save_rekeys_children_to_the_note_id() {
    let (service, _store) = service();
    // The edit flow collects attachments before the note id exists.
    let saved = service
        .save(
            NoteDraft {
                title: "with media".to_string(),
                attachments: vec![Attachment {
                    note_id: String::new(),
                    kind: AttachmentKind::Image,
                    uri: "file:///a.png".to_string(),
                    description: None,
                }],
                reminders: vec![Reminder {
                    note_id: String::new(),
                    trigger_at: 7_000,
                }],
                ..NoteDraft::default()
            },
            1_000,
        )
        .unwrap();

    assert_eq!(saved.attachments[0].note_id, saved.note.id);
    assert_eq!(saved.reminders[0].note_id, saved.note.id);
}

#[test]
fn remove_attachment_is_a_full_replace_write_without_it() {
    let (service, _store) = service();
    let saved = service
        .save(
            NoteDraft {
                title: "two images".to_string(),
                attachments: vec![
                    Attachment {
                        note_id: String::new(),
                        kind: AttachmentKind::Image,
                        uri: "file:///keep.png".to_string(),
                        description: None,
                    },
                    Attachment {
                        note_id: String::new(),
                        kind: AttachmentKind::Image,
                        uri: "file:///drop.png".to_string(),
                        description: None,
                    },
                ],
                ..NoteDraft::default()
            },
            1_000,
        )
        .unwrap();

    let after = service
        .remove_attachment(&saved.note.id, "file:///drop.png", 2_000)
        .unwrap();
    assert_eq!(after.attachments.len(), 1);
    assert_eq!(after.attachments[0].uri, "file:///keep.png");
    assert_eq!(after.note.updated_at, 2_000);
    assert!(after.note.dirty);
}

#[test]
fn delete_is_soft_and_marks_the_note_dirty() {
    let (service, store) = service();
    let saved = service.save(draft("doomed"), 1_000).unwrap();
    store.mark_synced(&saved.note.id).unwrap();

    service.delete(&saved.note.id, 2_000).unwrap();

    let tombstone = store.get_by_id(&saved.note.id).unwrap().unwrap();
    assert!(tombstone.is_deleted);
    assert!(tombstone.dirty);
    assert_eq!(tombstone.updated_at, 2_000);

    let err = service.delete("missing", 3_000).unwrap_err();
    assert!(matches!(err, NoteServiceError::NoteNotFound(_)));
}

#[test]
fn purge_passthrough_removes_acknowledged_tombstones() {
    let (service, store) = service();
    let saved = service.save(draft("doomed"), 1_000).unwrap();
    service.delete(&saved.note.id, 1_000).unwrap();
    store.mark_synced(&saved.note.id).unwrap();

    let removed = service.purge_deleted(1_000, 10_000).unwrap();
    assert_eq!(removed, 1);
    assert!(store.get_by_id(&saved.note.id).unwrap().is_none());
}
