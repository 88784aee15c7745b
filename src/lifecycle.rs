//! Note lifecycle engine
//!
//! Pure state transitions over an in-memory [`Note`]. No I/O happens
//! here; callers persist the mutated record through the store and talk
//! to the external alarm scheduler themselves.
//!
//! The transitions run along four independent axes: completion (a
//! toggle), archival (one-way in normal flow), deletion (soft mark with
//! a grace deadline, reprieved by archival), and alarm binding.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::database::Note;
use crate::error::{AppError, Result};

/// Flip completion. Completing stamps `completed_at`; reopening clears
/// it. Alarm fields are left alone.
pub fn toggle_complete(note: &mut Note, now: DateTime<Utc>) {
    note.is_completed = !note.is_completed;
    note.completed_at = note.is_completed.then_some(now);
}

/// Bind an external alarm handle. The due date must still be in the
/// future; scheduling an alarm for a past date is a caller error and
/// leaves the note untouched.
pub fn schedule_alarm(note: &mut Note, handle: Uuid, now: DateTime<Utc>) -> Result<()> {
    if note.date <= now {
        return Err(AppError::InvalidDate { due: note.date });
    }
    note.is_alarm_scheduled = true;
    note.alarm_id = Some(handle);
    Ok(())
}

/// Drop the alarm binding. Callers must cancel the external handle
/// before hard-deleting or archiving a note with a live alarm; a
/// dangling platform alarm pointing at a removed note is a bug.
pub fn clear_alarm(note: &mut Note) {
    note.is_alarm_scheduled = false;
    note.alarm_id = None;
}

/// Archive the note. Archival reprieves a pending soft-delete: the
/// deletion mark and grace deadline are cleared.
pub fn archive(note: &mut Note, now: DateTime<Utc>) {
    note.is_archived = true;
    note.archived_at = Some(now);
    note.is_marked_for_deletion = false;
    note.deletion_scheduled_at = None;
}

/// Soft-delete: mark the note and record when the grace period expires.
pub fn mark_for_deletion(note: &mut Note, at: DateTime<Utc>) {
    note.is_marked_for_deletion = true;
    note.deletion_scheduled_at = Some(at);
}

/// Sweep pass run on app foreground: archive every overdue, open,
/// unmarked note, flagged as system-driven. Returns how many notes
/// changed.
pub fn auto_archive_overdue(notes: &mut [Note], now: DateTime<Utc>) -> usize {
    let mut archived = 0;
    for note in notes.iter_mut() {
        if note.date < now
            && !note.is_completed
            && !note.is_archived
            && !note.is_marked_for_deletion
        {
            archive(note, now);
            note.is_auto_archived = true;
            archived += 1;
        }
    }
    if archived > 0 {
        tracing::info!("Auto-archived {} overdue notes", archived);
    }
    archived
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn note(date: DateTime<Utc>) -> Note {
        Note {
            id: 1,
            parent_id: None,
            title: "test".to_string(),
            description: String::new(),
            date,
            is_completed: false,
            completed_at: None,
            is_alarm_scheduled: false,
            alarm_id: None,
            created_at: Utc::now(),
            is_archived: false,
            archived_at: None,
            is_auto_archived: false,
            recurrence_rule: None,
            is_marked_for_deletion: false,
            deletion_scheduled_at: None,
            pending_alarm_change: None,
        }
    }

    #[test]
    fn toggle_complete_maintains_completed_at_invariant() {
        let now = Utc::now();
        let mut n = note(now + Duration::hours(1));

        toggle_complete(&mut n, now);
        assert!(n.is_completed);
        assert_eq!(n.completed_at, Some(now));

        toggle_complete(&mut n, now);
        assert!(!n.is_completed);
        assert_eq!(n.completed_at, None);
    }

    #[test]
    fn schedule_alarm_rejects_past_due_date() {
        let now = Utc::now();
        let mut n = note(now - Duration::minutes(5));

        let err = schedule_alarm(&mut n, Uuid::new_v4(), now).unwrap_err();
        assert!(matches!(err, AppError::InvalidDate { .. }));
        assert!(!n.is_alarm_scheduled);
        assert_eq!(n.alarm_id, None);
    }

    #[test]
    fn schedule_then_clear_alarm() {
        let now = Utc::now();
        let mut n = note(now + Duration::hours(2));
        let handle = Uuid::new_v4();

        schedule_alarm(&mut n, handle, now).unwrap();
        assert!(n.is_alarm_scheduled);
        assert_eq!(n.alarm_id, Some(handle));

        clear_alarm(&mut n);
        assert!(!n.is_alarm_scheduled);
        assert_eq!(n.alarm_id, None);
    }

    #[test]
    fn archive_cancels_pending_deletion() {
        let now = Utc::now();
        let mut n = note(now + Duration::hours(1));
        mark_for_deletion(&mut n, now + Duration::days(7));
        assert!(n.is_marked_for_deletion);

        archive(&mut n, now);
        assert!(n.is_archived);
        assert_eq!(n.archived_at, Some(now));
        assert!(!n.is_marked_for_deletion);
        assert_eq!(n.deletion_scheduled_at, None);
    }

    #[test]
    fn auto_archive_skips_completed_and_marked_notes() {
        let now = Utc::now();
        let mut overdue = note(now - Duration::days(1));
        let mut completed = note(now - Duration::days(1));
        completed.is_completed = true;
        let mut marked = note(now - Duration::days(1));
        marked.is_marked_for_deletion = true;
        let future = note(now + Duration::days(1));

        let mut notes = vec![overdue.clone(), completed, marked, future];
        let count = auto_archive_overdue(&mut notes, now);

        assert_eq!(count, 1);
        assert!(notes[0].is_archived);
        assert!(notes[0].is_auto_archived);
        assert!(!notes[1].is_archived);
        assert!(!notes[2].is_archived);
        assert!(!notes[3].is_archived);

        // user-driven archive by comparison does not set the flag
        archive(&mut overdue, now);
        assert!(!overdue.is_auto_archived);
    }
}
