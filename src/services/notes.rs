//! Notes service
//!
//! Orchestrates the note store, the pure lifecycle engine, and the
//! external alarm scheduler. The store record is the authoritative
//! alarm state; external calls run under a deadline and alarm binding
//! changes go through a two-phase intent so a crash between the store
//! write and the scheduler call can be reconciled on the next launch.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::scheduler::{with_deadline, AlarmScheduler};
use crate::config::{DELETION_GRACE_PERIOD, MAINTENANCE_INTERVAL};
use crate::database::{NewNote, Note, NoteStore, PendingAlarmChange};
use crate::error::{AppError, Result};
use crate::lifecycle;
use crate::category::{Category, SortOption};

/// Counts reported by a maintenance sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepOutcome {
    pub auto_archived: usize,
    pub completed_removed: u64,
    pub purged: u64,
}

/// Service for managing notes
pub struct NotesService<S> {
    store: NoteStore,
    scheduler: Arc<S>,
}

// Not derived: the scheduler sits behind an Arc, so cloning the service
// never needs S itself to be Clone.
impl<S> Clone for NotesService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            scheduler: Arc::clone(&self.scheduler),
        }
    }
}

impl<S: AlarmScheduler> NotesService<S> {
    pub fn new(store: NoteStore, scheduler: S) -> Self {
        Self {
            store,
            scheduler: Arc::new(scheduler),
        }
    }

    /// Create a new note with lifecycle defaults.
    pub async fn add_note(&self, req: NewNote) -> Result<Note> {
        tracing::info!("Creating new note: {}", req.title);
        self.store.insert(req).await
    }

    /// Fetch a note, failing if the id does not exist.
    pub async fn get_note(&self, id: i64) -> Result<Note> {
        self.store
            .get_by_id(id)
            .await?
            .ok_or(AppError::NoteNotFound(id))
    }

    pub async fn list_notes(&self) -> Result<Vec<Note>> {
        self.store.get_all().await
    }

    pub async fn notes_by_category(
        &self,
        category: Category,
        sort: SortOption,
    ) -> Result<Vec<Note>> {
        self.store.fetch_by_category(category, sort).await
    }

    pub async fn search_notes(&self, query: &str) -> Result<Vec<Note>> {
        self.store.search(query).await
    }

    pub async fn sub_notes(&self, parent_id: i64) -> Result<Vec<Note>> {
        self.store.children(parent_id).await
    }

    pub async fn update_note(&self, note: &Note) -> Result<()> {
        self.store.update(note).await
    }

    /// Flip completion and persist. Alarms are left untouched.
    pub async fn toggle_complete(&self, id: i64) -> Result<Note> {
        let mut note = self.get_note(id).await?;
        lifecycle::toggle_complete(&mut note, Utc::now());
        self.store.update(&note).await?;
        Ok(note)
    }

    /// Bind an external alarm to the note's due date.
    ///
    /// Two-phase: the schedule intent is persisted first, then the
    /// external scheduler is called under a deadline, then the binding
    /// is confirmed and the intent cleared. If the scheduler call fails
    /// the intent is rolled back and no binding is recorded.
    pub async fn set_alarm(&self, id: i64) -> Result<Note> {
        let mut note = self.get_note(id).await?;
        let now = Utc::now();
        if note.date <= now {
            return Err(AppError::InvalidDate { due: note.date });
        }

        note.pending_alarm_change = Some(PendingAlarmChange::Schedule);
        self.store.update(&note).await?;

        let scheduled = with_deadline(
            "alarm scheduler",
            self.scheduler.schedule(note.id, note.date, &note.title),
        )
        .await;

        let handle = match scheduled {
            Ok(handle) => handle,
            Err(e) => {
                note.pending_alarm_change = None;
                if let Err(rollback) = self.store.update(&note).await {
                    tracing::error!("Failed to roll back alarm intent for note {}: {}", id, rollback);
                }
                return Err(e);
            }
        };

        lifecycle::schedule_alarm(&mut note, handle, now)?;
        note.pending_alarm_change = None;
        self.store.update(&note).await?;

        tracing::info!("Alarm {} bound to note {}", handle, note.id);
        Ok(note)
    }

    /// Release the note's alarm binding and cancel the external alarm.
    ///
    /// The external cancel is best-effort: cancel is idempotent on the
    /// collaborator side and the store record is authoritative, so a
    /// failed or timed-out cancel still clears the binding.
    pub async fn clear_alarm(&self, id: i64) -> Result<Note> {
        let mut note = self.get_note(id).await?;
        if !note.is_alarm_scheduled && note.alarm_id.is_none() {
            return Ok(note);
        }

        note.pending_alarm_change = Some(PendingAlarmChange::Clear);
        self.store.update(&note).await?;

        self.cancel_external(&note).await;

        lifecycle::clear_alarm(&mut note);
        note.pending_alarm_change = None;
        self.store.update(&note).await?;
        Ok(note)
    }

    /// Archive a note. A bound alarm will no longer fire for anything
    /// the user can see, so it is cleared first; archival also reprieves
    /// any pending soft-delete.
    pub async fn archive_note(&self, id: i64) -> Result<Note> {
        let mut note = self.get_note(id).await?;

        if note.is_alarm_scheduled {
            self.cancel_external(&note).await;
            lifecycle::clear_alarm(&mut note);
        }

        lifecycle::archive(&mut note, Utc::now());
        self.store.update(&note).await?;

        tracing::info!("Archived note: {}", id);
        Ok(note)
    }

    /// Soft-delete with the default grace period.
    pub async fn mark_for_deletion(&self, id: i64) -> Result<Note> {
        self.mark_for_deletion_at(id, Utc::now() + DELETION_GRACE_PERIOD)
            .await
    }

    /// Soft-delete with an explicit grace deadline.
    pub async fn mark_for_deletion_at(&self, id: i64, at: DateTime<Utc>) -> Result<Note> {
        let mut note = self.get_note(id).await?;
        lifecycle::mark_for_deletion(&mut note, at);
        self.store.update(&note).await?;

        tracing::info!("Note {} marked for deletion at {}", id, at);
        Ok(note)
    }

    /// Hard delete. Any live external alarm is cancelled first so the
    /// collaborator can release its resource; deleting a missing id is
    /// a no-op.
    pub async fn delete_note(&self, id: i64) -> Result<()> {
        if let Some(note) = self.store.get_by_id(id).await? {
            if note.is_alarm_scheduled {
                self.cancel_external(&note).await;
            }
        }
        self.store.delete(id).await
    }

    /// Crash recovery for the two-phase alarm protocol. Schedule intents
    /// are re-issued when the due date is still in the future (scheduler
    /// implementations key alarms by note id, so this replaces any
    /// orphan); clear intents re-issue the cancel. Either way the intent
    /// column ends up empty.
    pub async fn reconcile_pending_alarms(&self) -> Result<()> {
        let dangling = self.store.pending_alarm_changes().await?;
        if dangling.is_empty() {
            return Ok(());
        }
        tracing::info!("Reconciling {} dangling alarm intents", dangling.len());

        for mut note in dangling {
            match note.pending_alarm_change {
                Some(PendingAlarmChange::Schedule) if note.date > Utc::now() => {
                    note.pending_alarm_change = None;
                    self.store.update(&note).await?;
                    if let Err(e) = self.set_alarm(note.id).await {
                        tracing::warn!("Could not re-issue alarm for note {}: {}", note.id, e);
                    }
                }
                Some(PendingAlarmChange::Clear) => {
                    self.cancel_external(&note).await;
                    lifecycle::clear_alarm(&mut note);
                    note.pending_alarm_change = None;
                    self.store.update(&note).await?;
                }
                _ => {
                    // Stale schedule intent for a now-past due date.
                    note.pending_alarm_change = None;
                    self.store.update(&note).await?;
                }
            }
        }
        Ok(())
    }

    /// Maintenance pass run on app launch/foreground: auto-archive
    /// overdue notes, garbage-collect expired completed notes, and purge
    /// soft-deletes past their grace period.
    pub async fn foreground_sweep(&self, now: DateTime<Utc>) -> Result<SweepOutcome> {
        let mut notes = self.store.get_all().await?;
        let was_archived: Vec<bool> = notes.iter().map(|n| n.is_archived).collect();

        let auto_archived = lifecycle::auto_archive_overdue(&mut notes, now);

        for (note, was) in notes.iter_mut().zip(was_archived) {
            if was || !note.is_archived {
                continue;
            }
            if note.is_alarm_scheduled {
                self.cancel_external(note).await;
                lifecycle::clear_alarm(note);
            }
            self.store.update(note).await?;
        }

        for note in self.store.expired_deletions(now).await? {
            if note.is_alarm_scheduled {
                self.cancel_external(&note).await;
            }
        }

        let completed_removed = self.store.cleanup_expired_completed().await?;
        let purged = self.store.purge_scheduled_deletions(now).await?;

        let outcome = SweepOutcome {
            auto_archived,
            completed_removed,
            purged,
        };
        tracing::debug!("Maintenance sweep finished: {:?}", outcome);
        Ok(outcome)
    }

    /// Cancel the note's external alarm, best-effort.
    async fn cancel_external(&self, note: &Note) {
        let Some(handle) = note.alarm_id else {
            return;
        };
        if let Err(e) = with_deadline("alarm cancel", self.scheduler.cancel(handle)).await {
            tracing::warn!(
                "Best-effort alarm cancel failed for note {} (handle {}): {}",
                note.id,
                handle,
                e
            );
        }
    }
}

impl<S: AlarmScheduler + 'static> NotesService<S> {
    /// Spawn the periodic maintenance loop. The same sweep also runs
    /// explicitly on app foreground via [`NotesService::foreground_sweep`].
    pub fn start_maintenance(&self) -> tokio::task::JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move {
            tracing::info!("Starting maintenance loop");
            let mut interval = tokio::time::interval(MAINTENANCE_INTERVAL);
            loop {
                interval.tick().await;
                if let Err(e) = service.foreground_sweep(Utc::now()).await {
                    tracing::error!("Maintenance sweep failed: {}", e);
                }
            }
        })
    }
}
