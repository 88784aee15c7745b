//! Filter categories and sort orders
//!
//! A category is a read-time projection of a note's mutable temporal
//! fields. Categories are computed independently and may overlap: a
//! same-day note whose time has already passed is legitimately both
//! "today" and "overdue", and the UI shows it in both sections. Calendar
//! day boundaries are computed in UTC.

use chrono::{DateTime, Days, Utc};
use serde::{Deserialize, Serialize};

use crate::config::COMPLETED_NOTE_RETENTION;
use crate::database::Note;

/// Display bucket for grouping notes, computed at query time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Overdue,
    Today,
    Reminder,
    Upcoming,
    Done,
    Archived,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Overdue,
        Category::Today,
        Category::Reminder,
        Category::Upcoming,
        Category::Done,
        Category::Archived,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Overdue => "overdue",
            Category::Today => "today",
            Category::Reminder => "reminder",
            Category::Upcoming => "upcoming",
            Category::Done => "done",
            Category::Archived => "archived",
        }
    }

    /// Pure membership predicate. Must stay in agreement with
    /// [`Category::sql_filter`]; the store's categorized queries use the
    /// SQL form, tests cross-check both.
    pub fn matches(self, note: &Note, now: DateTime<Utc>) -> bool {
        match self {
            Category::Overdue => {
                note.date < now && !note.is_completed && !note.is_archived
            }
            Category::Today => {
                note.date.date_naive() == now.date_naive()
                    && !note.is_completed
                    && !note.is_archived
            }
            Category::Reminder => note.recurrence_rule.is_some() && !note.is_archived,
            Category::Upcoming => {
                note.date >= start_of_tomorrow(now)
                    && !note.is_completed
                    && !note.is_archived
            }
            Category::Done => {
                note.is_completed
                    && !note.is_archived
                    && note
                        .completed_at
                        .is_some_and(|at| at >= now - COMPLETED_NOTE_RETENTION)
            }
            Category::Archived => note.is_archived,
        }
    }

    /// Every category the note belongs to right now.
    pub fn classify(note: &Note, now: DateTime<Utc>) -> Vec<Category> {
        Category::ALL
            .into_iter()
            .filter(|c| c.matches(note, now))
            .collect()
    }

    /// WHERE clause and bound instants for the categorized query.
    pub(crate) fn sql_filter(self, now: DateTime<Utc>) -> (&'static str, Vec<DateTime<Utc>>) {
        match self {
            Category::Overdue => (
                "date < ? AND is_completed = 0 AND is_archived = 0",
                vec![now],
            ),
            Category::Today => (
                "date >= ? AND date < ? AND is_completed = 0 AND is_archived = 0",
                vec![start_of_day(now), start_of_tomorrow(now)],
            ),
            Category::Reminder => ("recurrence_rule IS NOT NULL AND is_archived = 0", vec![]),
            Category::Upcoming => (
                "date >= ? AND is_completed = 0 AND is_archived = 0",
                vec![start_of_tomorrow(now)],
            ),
            Category::Done => (
                "is_completed = 1 AND is_archived = 0 AND completed_at >= ?",
                vec![now - COMPLETED_NOTE_RETENTION],
            ),
            Category::Archived => ("is_archived = 1", vec![]),
        }
    }
}

/// Sort order for categorized queries, orthogonal to the category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOption {
    /// Due date ascending, soonest alarm first.
    DueDate,
    /// Creation date descending, newest first.
    Created,
    /// Case-insensitive lexical title order.
    Title,
}

impl SortOption {
    pub(crate) fn order_clause(self) -> &'static str {
        match self {
            SortOption::DueDate => "date ASC",
            SortOption::Created => "created_at DESC",
            SortOption::Title => "title COLLATE NOCASE ASC",
        }
    }
}

/// UTC midnight of the given instant's calendar day.
fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .expect("midnight is always valid")
        .and_utc()
}

fn start_of_tomorrow(now: DateTime<Utc>) -> DateTime<Utc> {
    start_of_day(now) + Days::new(1)
}
