//! Database module
//!
//! Pool construction, schema migration, models, and the note store.
//! The pool is created once from an injected file path and handed to
//! collaborators; there is no process-wide singleton.

pub mod models;
pub mod schema;
pub mod store;

pub use models::{NewNote, Note, PendingAlarmChange};
pub use schema::initialize_database;
pub use store::NoteStore;

use crate::config::{DB_BUSY_TIMEOUT, DB_MAX_CONNECTIONS};
use crate::error::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;

/// Build connection options shared by migration and application connections.
fn connect_options(db_path: &Path) -> std::result::Result<SqliteConnectOptions, sqlx::Error> {
    SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=rwc", db_path.display())).map(
        |opts| {
            opts.create_if_missing(true)
                .busy_timeout(DB_BUSY_TIMEOUT)
                .journal_mode(SqliteJournalMode::Wal)
                .foreign_keys(true)
        },
    )
}

/// Create and initialize a database connection pool.
///
/// Migrations run first on a dedicated single-connection pool that is
/// closed before the application pool opens. Connections opened before
/// an ALTER TABLE ADD COLUMN can cache the old column count; opening
/// every application connection after migrations have committed avoids
/// those stale-schema reads.
pub async fn create_pool(db_path: &Path) -> Result<SqlitePool> {
    tracing::info!("Creating database connection pool at: {:?}", db_path);

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let migration_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(connect_options(db_path)?)
        .await?;

    initialize_database(&migration_pool).await?;
    migration_pool.close().await;

    let pool = SqlitePoolOptions::new()
        .max_connections(DB_MAX_CONNECTIONS)
        .connect_with(connect_options(db_path)?)
        .await?;

    tracing::info!("Database pool created successfully");

    Ok(pool)
}
