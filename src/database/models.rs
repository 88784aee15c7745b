//! Database models
//!
//! Rust structs representing the persisted note entity. Row decoding is
//! defensive: columns added by later migrations are NULL on rows written
//! before the column existed, so every late-addition field falls back to
//! a safe default instead of failing the whole read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};
use uuid::Uuid;

/// A to-do note, optionally nested one level under a parent note.
///
/// `id == 0` means "not yet persisted"; the store assigns the real id
/// on insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: i64,
    /// Self-referential parent link; `None` for a root note. Children
    /// are always derived by filtering on this field, never held as
    /// owned sub-objects.
    pub parent_id: Option<i64>,
    pub title: String,
    pub description: String,
    /// Due/alarm date; drives all categorization.
    pub date: DateTime<Utc>,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub is_alarm_scheduled: bool,
    /// Handle of the externally bound alarm; `Some` iff
    /// `is_alarm_scheduled` (maintained by the lifecycle engine).
    pub alarm_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub is_archived: bool,
    pub archived_at: Option<DateTime<Utc>>,
    /// Distinguishes system-driven archival (overdue sweep) from a
    /// user action.
    pub is_auto_archived: bool,
    /// Opaque recurrence descriptor; presence flags the note as a
    /// "reminder".
    pub recurrence_rule: Option<String>,
    pub is_marked_for_deletion: bool,
    /// Grace-period expiry; once passed, the note is eligible for hard
    /// deletion by the purge sweep.
    pub deletion_scheduled_at: Option<DateTime<Utc>>,
    /// Unconfirmed alarm intent, used for crash recovery of the
    /// two-phase schedule/clear protocol.
    pub pending_alarm_change: Option<PendingAlarmChange>,
}

/// In-flight alarm intent recorded before the external scheduler is
/// called, cleared once the call is confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PendingAlarmChange {
    Schedule,
    Clear,
}

impl PendingAlarmChange {
    pub fn as_str(self) -> &'static str {
        match self {
            PendingAlarmChange::Schedule => "schedule",
            PendingAlarmChange::Clear => "clear",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "schedule" => Some(PendingAlarmChange::Schedule),
            "clear" => Some(PendingAlarmChange::Clear),
            _ => None,
        }
    }
}

/// Create note request
#[derive(Debug, Clone, Deserialize)]
pub struct NewNote {
    pub parent_id: Option<i64>,
    pub title: String,
    pub description: String,
    pub date: DateTime<Utc>,
    pub recurrence_rule: Option<String>,
}

impl<'r> FromRow<'r, SqliteRow> for Note {
    fn from_row(row: &'r SqliteRow) -> std::result::Result<Self, sqlx::Error> {
        // id must decode; everything else degrades to a default.
        let id: i64 = row.try_get("id")?;

        let date = row
            .try_get::<DateTime<Utc>, _>("date")
            .unwrap_or_else(|_| Utc::now());
        let created_at = row
            .try_get::<DateTime<Utc>, _>("created_at")
            .unwrap_or_else(|_| Utc::now());

        let alarm_id = row
            .try_get::<Option<String>, _>("alarm_id")
            .unwrap_or(None)
            .and_then(|s| Uuid::parse_str(&s).ok());

        let pending_alarm_change = row
            .try_get::<Option<String>, _>("pending_alarm_change")
            .unwrap_or(None)
            .and_then(|s| PendingAlarmChange::parse(&s));

        Ok(Note {
            id,
            parent_id: row.try_get("parent_id").unwrap_or(None),
            title: row.try_get("title").unwrap_or_default(),
            description: row.try_get("description").unwrap_or_default(),
            date,
            is_completed: row.try_get("is_completed").unwrap_or(false),
            completed_at: row.try_get("completed_at").unwrap_or(None),
            is_alarm_scheduled: row.try_get("is_alarm_scheduled").unwrap_or(false),
            alarm_id,
            created_at,
            is_archived: row.try_get("is_archived").unwrap_or(false),
            archived_at: row.try_get("archived_at").unwrap_or(None),
            is_auto_archived: row.try_get("is_auto_archived").unwrap_or(false),
            recurrence_rule: row.try_get("recurrence_rule").unwrap_or(None),
            is_marked_for_deletion: row.try_get("is_marked_for_deletion").unwrap_or(false),
            deletion_scheduled_at: row.try_get("deletion_scheduled_at").unwrap_or(None),
            pending_alarm_change,
        })
    }
}
