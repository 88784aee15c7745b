//! Database schema and migrations
//!
//! Schema evolution is strictly forward and additive. Every step is
//! individually idempotent (create-if-absent, add-column-if-absent), so
//! the migrator can run unconditionally on every startup against any
//! historical shape of the database without data loss. There are no
//! down-migrations.
//!
//! Uses SQLite with WAL mode for better concurrency and crash safety.

use crate::error::Result;
use sqlx::sqlite::SqlitePool;

/// Bring the store to the current schema shape.
pub async fn initialize_database(pool: &SqlitePool) -> Result<()> {
    tracing::info!("Initializing database schema");

    // Enable WAL mode for better performance and crash safety
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(pool)
        .await?;

    // Enable foreign keys (parent_id references notes.id)
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(pool)
        .await?;

    // Base table, first shipped revision: title/description/due date
    // and the completion flag.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS notes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            parent_id INTEGER REFERENCES notes(id),
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            date TEXT NOT NULL,
            is_completed INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Completion timestamp and alarm binding.
    add_column_if_missing(pool, "notes", "completed_at", "TEXT").await?;
    add_column_if_missing(
        pool,
        "notes",
        "is_alarm_scheduled",
        "INTEGER NOT NULL DEFAULT 0",
    )
    .await?;
    add_column_if_missing(pool, "notes", "alarm_id", "TEXT").await?;

    // Archival and recurrence.
    add_column_if_missing(pool, "notes", "is_archived", "INTEGER NOT NULL DEFAULT 0").await?;
    add_column_if_missing(pool, "notes", "recurrence_rule", "TEXT").await?;

    // Soft deletion with grace period.
    add_column_if_missing(
        pool,
        "notes",
        "is_marked_for_deletion",
        "INTEGER NOT NULL DEFAULT 0",
    )
    .await?;
    add_column_if_missing(pool, "notes", "deletion_scheduled_at", "TEXT").await?;

    // Auto-archive bookkeeping, latest revision.
    add_column_if_missing(pool, "notes", "archived_at", "TEXT").await?;
    add_column_if_missing(
        pool,
        "notes",
        "is_auto_archived",
        "INTEGER NOT NULL DEFAULT 0",
    )
    .await?;

    // Two-phase alarm intent for crash recovery.
    add_column_if_missing(pool, "notes", "pending_alarm_change", "TEXT").await?;

    // Indexes back the categorized queries and the child lookup.
    for sql in [
        "CREATE INDEX IF NOT EXISTS idx_notes_date ON notes(date)",
        "CREATE INDEX IF NOT EXISTS idx_notes_is_completed ON notes(is_completed)",
        "CREATE INDEX IF NOT EXISTS idx_notes_is_archived ON notes(is_archived)",
        "CREATE INDEX IF NOT EXISTS idx_notes_recurrence_rule ON notes(recurrence_rule)",
        "CREATE INDEX IF NOT EXISTS idx_notes_parent_id ON notes(parent_id)",
    ] {
        sqlx::query(sql).execute(pool).await?;
    }

    create_search_index(pool).await?;

    tracing::info!("Database initialization complete");
    Ok(())
}

/// Add a column unless it already exists. A duplicate add is a silent
/// no-op rather than a startup failure.
async fn add_column_if_missing(
    pool: &SqlitePool,
    table: &str,
    column: &str,
    declaration: &str,
) -> Result<()> {
    let exists: Option<i64> = sqlx::query_scalar(&format!(
        "SELECT 1 FROM pragma_table_info('{table}') WHERE name = ?"
    ))
    .bind(column)
    .fetch_optional(pool)
    .await?;

    if exists.is_some() {
        tracing::debug!("Column {}.{} already present, skipping", table, column);
        return Ok(());
    }

    sqlx::query(&format!(
        "ALTER TABLE {table} ADD COLUMN {column} {declaration}"
    ))
    .execute(pool)
    .await?;

    tracing::info!("Added column {}.{}", table, column);
    Ok(())
}

/// Full-text index over title and description. SQLite external-content
/// FTS5 tables do not track the content table by themselves, so sync
/// happens through insert/update/delete triggers.
async fn create_search_index(pool: &SqlitePool) -> Result<()> {
    let already_present: Option<i64> =
        sqlx::query_scalar("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'notes_fts'")
            .fetch_optional(pool)
            .await?;

    sqlx::query(
        r#"
        CREATE VIRTUAL TABLE IF NOT EXISTS notes_fts USING fts5(
            title,
            description,
            content='notes',
            content_rowid='id'
        )
        "#,
    )
    .execute(pool)
    .await?;

    for sql in [
        r#"
        CREATE TRIGGER IF NOT EXISTS notes_fts_insert AFTER INSERT ON notes BEGIN
            INSERT INTO notes_fts(rowid, title, description)
            VALUES (new.id, new.title, new.description);
        END
        "#,
        r#"
        CREATE TRIGGER IF NOT EXISTS notes_fts_delete AFTER DELETE ON notes BEGIN
            INSERT INTO notes_fts(notes_fts, rowid, title, description)
            VALUES ('delete', old.id, old.title, old.description);
        END
        "#,
        r#"
        CREATE TRIGGER IF NOT EXISTS notes_fts_update AFTER UPDATE ON notes BEGIN
            INSERT INTO notes_fts(notes_fts, rowid, title, description)
            VALUES ('delete', old.id, old.title, old.description);
            INSERT INTO notes_fts(rowid, title, description)
            VALUES (new.id, new.title, new.description);
        END
        "#,
    ] {
        sqlx::query(sql).execute(pool).await?;
    }

    // A freshly created index must pick up rows written before full-text
    // search existed.
    if already_present.is_none() {
        sqlx::query("INSERT INTO notes_fts(notes_fts) VALUES ('rebuild')")
            .execute(pool)
            .await?;
        tracing::info!("Built full-text index over existing notes");
    }

    Ok(())
}
