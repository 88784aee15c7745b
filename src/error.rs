//! Error types for the Todoo core
//!
//! All errors use thiserror for structured error handling.
//! Write failures are surfaced to the caller rather than logged and
//! swallowed; the caller decides what to show the user.

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Note not found: {0}")]
    NoteNotFound(i64),

    #[error("Cannot schedule alarm for past due date: {due}")]
    InvalidDate { due: DateTime<Utc> },

    #[error("Alarm scheduler error: {0}")]
    Scheduler(String),

    /// Permission failure reported by an external alarm or notification
    /// collaborator, propagated untouched.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
}

impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
