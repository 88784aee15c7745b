//! Application configuration constants
//!
//! Central location for retention windows, timeouts, and pool limits
//! used throughout the core.

use std::time::Duration;

// ===== Retention Windows =====

/// How long a completed, unarchived note is kept before the cleanup
/// sweep hard-deletes it.
pub const COMPLETED_NOTE_RETENTION: chrono::Duration = chrono::Duration::days(1);

/// Default grace period between marking a note for deletion and its
/// eligibility for hard removal.
pub const DELETION_GRACE_PERIOD: chrono::Duration = chrono::Duration::days(7);

// ===== External Scheduler Limits =====

/// Upper bound on any single call to an external alarm/notification
/// scheduler. The store record is authoritative; a slow collaborator
/// must not stall a lifecycle operation indefinitely.
pub const SCHEDULER_CALL_TIMEOUT: Duration = Duration::from_secs(5);

// ===== Database Limits =====

/// SQLite busy timeout shared by every connection.
pub const DB_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection cap for the application pool. Writes are serialized by
/// SQLite itself; this only bounds concurrent readers.
pub const DB_MAX_CONNECTIONS: u32 = 5;

/// Interval between periodic maintenance sweeps.
pub const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(60);
