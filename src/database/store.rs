//! Note store
//!
//! Durable CRUD plus categorized retrieval; sole owner of the
//! persistence format. Timestamps travel through sqlx's chrono binding
//! as one canonical ISO-8601 text encoding, so date-range predicates
//! compare correctly as text.
//!
//! Writes retry once on a transient SQLite busy/locked error; anything
//! else surfaces as [`AppError::Database`].

use std::future::Future;

use chrono::Utc;
use sqlx::SqlitePool;

use super::models::{NewNote, Note};
use crate::category::{Category, SortOption};
use crate::config::COMPLETED_NOTE_RETENTION;
use crate::error::{AppError, Result};

/// Store over the notes table, cloneable, built from an injected pool.
#[derive(Clone)]
pub struct NoteStore {
    pool: SqlitePool,
}

impl NoteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new note. The id on the returned note is assigned by
    /// the database; the request carries no identity.
    pub async fn insert(&self, req: NewNote) -> Result<Note> {
        let created_at = Utc::now();

        let note = with_lock_retry(|| {
            sqlx::query_as::<_, Note>(
                r#"
                INSERT INTO notes (parent_id, title, description, date, created_at, recurrence_rule)
                VALUES (?, ?, ?, ?, ?, ?)
                RETURNING *
                "#,
            )
            .bind(req.parent_id)
            .bind(&req.title)
            .bind(&req.description)
            .bind(req.date)
            .bind(created_at)
            .bind(&req.recurrence_rule)
            .fetch_one(&self.pool)
        })
        .await?;

        tracing::debug!("Created note: {}", note.id);
        Ok(note)
    }

    /// Fetch a single note; a missing row is `Ok(None)`, never an error.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Note>> {
        let note = sqlx::query_as::<_, Note>("SELECT * FROM notes WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(note)
    }

    /// Full scan. Row decoding tolerates rows written by older app
    /// versions (absent optional columns, NULLs in late-added flags).
    pub async fn get_all(&self) -> Result<Vec<Note>> {
        let notes = sqlx::query_as::<_, Note>("SELECT * FROM notes")
            .fetch_all(&self.pool)
            .await?;

        Ok(notes)
    }

    /// Full-row replace keyed by id. `created_at` is immutable and is
    /// never written back. Updating a missing id is an error, not a
    /// silent no-op.
    pub async fn update(&self, note: &Note) -> Result<()> {
        let rows = with_lock_retry(|| {
            sqlx::query(
                r#"
                UPDATE notes SET
                    parent_id = ?,
                    title = ?,
                    description = ?,
                    date = ?,
                    is_completed = ?,
                    completed_at = ?,
                    is_alarm_scheduled = ?,
                    alarm_id = ?,
                    is_archived = ?,
                    archived_at = ?,
                    is_auto_archived = ?,
                    recurrence_rule = ?,
                    is_marked_for_deletion = ?,
                    deletion_scheduled_at = ?,
                    pending_alarm_change = ?
                WHERE id = ?
                "#,
            )
            .bind(note.parent_id)
            .bind(&note.title)
            .bind(&note.description)
            .bind(note.date)
            .bind(note.is_completed)
            .bind(note.completed_at)
            .bind(note.is_alarm_scheduled)
            .bind(note.alarm_id.map(|u| u.to_string()))
            .bind(note.is_archived)
            .bind(note.archived_at)
            .bind(note.is_auto_archived)
            .bind(&note.recurrence_rule)
            .bind(note.is_marked_for_deletion)
            .bind(note.deletion_scheduled_at)
            .bind(note.pending_alarm_change.map(|p| p.as_str()))
            .bind(note.id)
            .execute(&self.pool)
        })
        .await?
        .rows_affected();

        if rows == 0 {
            return Err(AppError::NoteNotFound(note.id));
        }

        tracing::debug!("Updated note: {}", note.id);
        Ok(())
    }

    /// Hard delete. Deleting an id that does not exist is not an error.
    pub async fn delete(&self, id: i64) -> Result<()> {
        let rows = with_lock_retry(|| {
            sqlx::query("DELETE FROM notes WHERE id = ?")
                .bind(id)
                .execute(&self.pool)
        })
        .await?
        .rows_affected();

        if rows > 0 {
            tracing::debug!("Deleted note: {}", id);
        }
        Ok(())
    }

    /// Categorized query evaluated against the current instant.
    pub async fn fetch_by_category(
        &self,
        category: Category,
        sort: SortOption,
    ) -> Result<Vec<Note>> {
        self.fetch_by_category_at(category, sort, Utc::now()).await
    }

    /// Categorized query with an explicit reference instant. The WHERE
    /// clause comes from the classifier so that SQL and in-memory
    /// classification cannot drift apart.
    pub async fn fetch_by_category_at(
        &self,
        category: Category,
        sort: SortOption,
        now: chrono::DateTime<Utc>,
    ) -> Result<Vec<Note>> {
        let (clause, binds) = category.sql_filter(now);
        let sql = format!(
            "SELECT * FROM notes WHERE {clause} ORDER BY {}",
            sort.order_clause()
        );

        let mut query = sqlx::query_as::<_, Note>(&sql);
        for instant in binds {
            query = query.bind(instant);
        }

        let notes = query.fetch_all(&self.pool).await?;
        tracing::debug!(
            "Fetched {} notes for category {}",
            notes.len(),
            category.as_str()
        );
        Ok(notes)
    }

    /// Garbage-collect completed, unarchived notes whose completion
    /// fell out of the retention window. Returns the number removed.
    pub async fn cleanup_expired_completed(&self) -> Result<u64> {
        let cutoff = Utc::now() - COMPLETED_NOTE_RETENTION;

        let removed = with_lock_retry(|| {
            sqlx::query(
                "DELETE FROM notes
                 WHERE is_completed = 1 AND is_archived = 0 AND completed_at < ?",
            )
            .bind(cutoff)
            .execute(&self.pool)
        })
        .await?
        .rows_affected();

        if removed > 0 {
            tracing::info!("Cleaned up {} expired completed notes", removed);
        }
        Ok(removed)
    }

    /// Hard-delete soft-deleted notes whose grace period has expired.
    pub async fn purge_scheduled_deletions(&self, now: chrono::DateTime<Utc>) -> Result<u64> {
        let removed = with_lock_retry(|| {
            sqlx::query(
                "DELETE FROM notes
                 WHERE is_marked_for_deletion = 1 AND deletion_scheduled_at <= ?",
            )
            .bind(now)
            .execute(&self.pool)
        })
        .await?
        .rows_affected();

        if removed > 0 {
            tracing::info!("Purged {} notes past their deletion grace period", removed);
        }
        Ok(removed)
    }

    /// Soft-deleted notes whose grace period has expired, fetched before
    /// a purge so the caller can release any bound external alarms.
    pub async fn expired_deletions(&self, now: chrono::DateTime<Utc>) -> Result<Vec<Note>> {
        let notes = sqlx::query_as::<_, Note>(
            "SELECT * FROM notes
             WHERE is_marked_for_deletion = 1 AND deletion_scheduled_at <= ?",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(notes)
    }

    /// Sub-notes of a parent, derived by a flat filter over parent_id.
    pub async fn children(&self, parent_id: i64) -> Result<Vec<Note>> {
        let notes =
            sqlx::query_as::<_, Note>("SELECT * FROM notes WHERE parent_id = ? ORDER BY date ASC")
                .bind(parent_id)
                .fetch_all(&self.pool)
                .await?;

        Ok(notes)
    }

    /// Notes with an unconfirmed alarm intent, for crash recovery.
    pub async fn pending_alarm_changes(&self) -> Result<Vec<Note>> {
        let notes =
            sqlx::query_as::<_, Note>("SELECT * FROM notes WHERE pending_alarm_change IS NOT NULL")
                .fetch_all(&self.pool)
                .await?;

        Ok(notes)
    }

    /// Full-text search over title and description, excluding archived
    /// notes. The query is quoted so user input is matched literally
    /// instead of being parsed as FTS syntax.
    pub async fn search(&self, query: &str) -> Result<Vec<Note>> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }
        let literal = format!("\"{}\"", trimmed.replace('"', "\"\""));

        let notes = sqlx::query_as::<_, Note>(
            r#"
            SELECT n.* FROM notes_fts
            JOIN notes n ON n.id = notes_fts.rowid
            WHERE notes_fts MATCH ? AND n.is_archived = 0
            ORDER BY rank
            "#,
        )
        .bind(literal)
        .fetch_all(&self.pool)
        .await?;

        Ok(notes)
    }
}

/// Run a write, retrying exactly once when SQLite reports a transient
/// busy/locked condition.
async fn with_lock_retry<T, F, Fut>(op: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = std::result::Result<T, sqlx::Error>>,
{
    match op().await {
        Err(e) if is_transient_lock(&e) => {
            tracing::warn!("Transient database lock, retrying once: {}", e);
            Ok(op().await?)
        }
        result => Ok(result?),
    }
}

fn is_transient_lock(err: &sqlx::Error) -> bool {
    // SQLITE_BUSY = 5, SQLITE_LOCKED = 6; extended codes keep the
    // primary code in the low byte.
    match err {
        sqlx::Error::Database(db) => db
            .code()
            .and_then(|code| code.parse::<i64>().ok())
            .map(|code| matches!(code & 0xff, 5 | 6))
            .unwrap_or(false),
        _ => false,
    }
}
