//! Integration tests for the Todoo core
//!
//! These tests exercise the full stack on a real on-disk database:
//! pool construction, migrations, the store, the lifecycle engine, and
//! the service layer with a fake external scheduler.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};
use tempfile::TempDir;
use uuid::Uuid;

use todoo_core::database::create_pool;
use todoo_core::services::{AlarmScheduler, NotesService};
use todoo_core::{AppError, Category, NewNote, NoteStore, Result, SortOption};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "todoo_core=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

#[derive(Clone, Default)]
struct FakeScheduler {
    scheduled: Arc<Mutex<Vec<(i64, Uuid)>>>,
    cancelled: Arc<Mutex<Vec<Uuid>>>,
}

impl AlarmScheduler for FakeScheduler {
    async fn schedule(&self, note_id: i64, _fire_at: DateTime<Utc>, _title: &str) -> Result<Uuid> {
        let handle = Uuid::new_v4();
        self.scheduled.lock().unwrap().push((note_id, handle));
        Ok(handle)
    }

    async fn cancel(&self, handle: Uuid) -> Result<()> {
        self.cancelled.lock().unwrap().push(handle);
        Ok(())
    }
}

async fn create_test_store() -> (NoteStore, TempDir) {
    init_tracing();
    let temp_dir = TempDir::new().unwrap();
    let pool = create_pool(&temp_dir.path().join("todoo.sqlite"))
        .await
        .unwrap();
    (NoteStore::new(pool), temp_dir)
}

fn req(title: &str, date: DateTime<Utc>) -> NewNote {
    NewNote {
        parent_id: None,
        title: title.to_string(),
        description: String::new(),
        date,
        recurrence_rule: None,
    }
}

#[tokio::test]
async fn test_reopening_database_preserves_notes() {
    init_tracing();
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("todoo.sqlite");

    let first = create_pool(&db_path).await.unwrap();
    let store = NoteStore::new(first.clone());
    let note = store
        .insert(req("survives restart", Utc::now() + Duration::hours(2)))
        .await
        .unwrap();
    first.close().await;

    // Second startup runs the migrator again over the populated file.
    let second = create_pool(&db_path).await.unwrap();
    let store = NoteStore::new(second);

    let fetched = store.get_by_id(note.id).await.unwrap().unwrap();
    assert_eq!(fetched, note);
}

#[tokio::test]
async fn test_pay_rent_end_to_end() {
    let (store, _temp) = create_test_store().await;

    // Fixed instants: categorized queries take an explicit reference
    // time, so nothing here depends on the wall clock.
    let now = Utc.with_ymd_and_hms(2025, 6, 14, 10, 0, 0).unwrap();
    let due = now + Duration::hours(1);
    let note = store.insert(req("Pay rent", due)).await.unwrap();

    // Before the due date passes: today only, not overdue, not
    // upcoming (due before tomorrow).
    let today = store
        .fetch_by_category_at(Category::Today, SortOption::DueDate, now)
        .await
        .unwrap();
    assert!(today.iter().any(|n| n.id == note.id));

    for category in [Category::Overdue, Category::Upcoming, Category::Done] {
        let notes = store
            .fetch_by_category_at(category, SortOption::DueDate, now)
            .await
            .unwrap();
        assert!(
            !notes.iter().any(|n| n.id == note.id),
            "unexpectedly in {}",
            category.as_str()
        );
    }

    // After the due date passes without completion, a reclassification
    // query places it in overdue, and it stays in today: same calendar
    // day, intentional multi-membership.
    let later = due + Duration::hours(2);
    let overdue = store
        .fetch_by_category_at(Category::Overdue, SortOption::DueDate, later)
        .await
        .unwrap();
    assert!(overdue.iter().any(|n| n.id == note.id));

    let still_today = store
        .fetch_by_category_at(Category::Today, SortOption::DueDate, later)
        .await
        .unwrap();
    assert!(still_today.iter().any(|n| n.id == note.id));
}

#[tokio::test]
async fn test_completion_moves_note_to_done() {
    let (store, _temp) = create_test_store().await;
    let scheduler = FakeScheduler::default();
    let service = NotesService::new(store.clone(), scheduler);
    let now = Utc::now();

    let note = service
        .add_note(req("Water plants", now + Duration::hours(1)))
        .await
        .unwrap();

    let completed = service.toggle_complete(note.id).await.unwrap();
    assert!(completed.is_completed);
    assert!(completed.completed_at.is_some());

    let done = store
        .fetch_by_category(Category::Done, SortOption::Created)
        .await
        .unwrap();
    assert!(done.iter().any(|n| n.id == note.id));

    let reopened = service.toggle_complete(note.id).await.unwrap();
    assert!(!reopened.is_completed);
    assert_eq!(reopened.completed_at, None);
}

#[tokio::test]
async fn test_alarm_lifecycle_with_service() {
    let (store, _temp) = create_test_store().await;
    let scheduler = FakeScheduler::default();
    let service = NotesService::new(store.clone(), scheduler.clone());

    let note = service
        .add_note(req("Dentist", Utc::now() + Duration::days(1)))
        .await
        .unwrap();

    let bound = service.set_alarm(note.id).await.unwrap();
    let handle = bound.alarm_id.unwrap();
    assert!(bound.is_alarm_scheduled);
    assert_eq!(scheduler.scheduled.lock().unwrap()[0].0, note.id);

    // Hard delete releases the external alarm.
    service.delete_note(note.id).await.unwrap();
    assert!(store.get_by_id(note.id).await.unwrap().is_none());
    assert_eq!(scheduler.cancelled.lock().unwrap().as_slice(), &[handle]);
}

#[tokio::test]
async fn test_alarm_for_past_note_is_rejected() {
    let (store, _temp) = create_test_store().await;
    let scheduler = FakeScheduler::default();
    let service = NotesService::new(store, scheduler.clone());

    let note = service
        .add_note(req("Yesterday's meeting", Utc::now() - Duration::days(1)))
        .await
        .unwrap();

    let err = service.set_alarm(note.id).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidDate { .. }));
    assert!(scheduler.scheduled.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_soft_delete_grace_and_reprieve() {
    let (store, _temp) = create_test_store().await;
    let scheduler = FakeScheduler::default();
    let service = NotesService::new(store.clone(), scheduler);
    let now = Utc::now();

    // One note rides out its grace period, the other is reprieved by
    // archival.
    let doomed = service
        .add_note(req("doomed", now + Duration::hours(1)))
        .await
        .unwrap();
    service
        .mark_for_deletion_at(doomed.id, now - Duration::minutes(1))
        .await
        .unwrap();

    let reprieved = service
        .add_note(req("reprieved", now + Duration::hours(1)))
        .await
        .unwrap();
    service
        .mark_for_deletion_at(reprieved.id, now - Duration::minutes(1))
        .await
        .unwrap();
    service.archive_note(reprieved.id).await.unwrap();

    let outcome = service.foreground_sweep(now).await.unwrap();
    assert_eq!(outcome.purged, 1);

    assert!(store.get_by_id(doomed.id).await.unwrap().is_none());
    let survivor = store.get_by_id(reprieved.id).await.unwrap().unwrap();
    assert!(survivor.is_archived);
    assert!(!survivor.is_marked_for_deletion);
}

#[tokio::test]
async fn test_sub_notes_round_trip() {
    let (store, _temp) = create_test_store().await;
    let now = Utc::now();

    let parent = store.insert(req("Trip", now + Duration::days(3))).await.unwrap();
    let child = store
        .insert(NewNote {
            parent_id: Some(parent.id),
            title: "Book hotel".to_string(),
            description: "near the station".to_string(),
            date: now + Duration::days(1),
            recurrence_rule: None,
        })
        .await
        .unwrap();

    let children = store.children(parent.id).await.unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].id, child.id);

    // Deleting the child leaves the parent untouched.
    store.delete(child.id).await.unwrap();
    assert!(store.get_by_id(parent.id).await.unwrap().is_some());
    assert!(store.children(parent.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_search_tracks_updates() {
    let (store, _temp) = create_test_store().await;
    let now = Utc::now();

    let mut note = store
        .insert(NewNote {
            parent_id: None,
            title: "Groceries".to_string(),
            description: "apples".to_string(),
            date: now + Duration::hours(4),
            recurrence_rule: None,
        })
        .await
        .unwrap();

    assert_eq!(store.search("apples").await.unwrap().len(), 1);

    note.description = "oranges".to_string();
    store.update(&note).await.unwrap();

    assert!(store.search("apples").await.unwrap().is_empty());
    assert_eq!(store.search("oranges").await.unwrap().len(), 1);

    store.delete(note.id).await.unwrap();
    assert!(store.search("oranges").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_reminder_category_via_recurrence() {
    let (store, _temp) = create_test_store().await;
    let now = Utc::now();

    store
        .insert(NewNote {
            parent_id: None,
            title: "Standup".to_string(),
            description: String::new(),
            date: now + Duration::days(1),
            recurrence_rule: Some("FREQ=DAILY".to_string()),
        })
        .await
        .unwrap();
    store
        .insert(req("One-off", now + Duration::days(1)))
        .await
        .unwrap();

    let reminders = store
        .fetch_by_category(Category::Reminder, SortOption::DueDate)
        .await
        .unwrap();
    assert_eq!(reminders.len(), 1);
    assert_eq!(reminders[0].title, "Standup");
}
