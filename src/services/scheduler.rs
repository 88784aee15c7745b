//! External alarm scheduler interface
//!
//! The platform alarm subsystem and the notification fallback are
//! consumed through [`AlarmScheduler`]. The store record stays
//! authoritative: every call out is bounded by a timeout and treated as
//! best-effort where the protocol allows it.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::SCHEDULER_CALL_TIMEOUT;
use crate::error::{AppError, Result};

/// A platform collaborator that fires an alert at a fixed instant.
///
/// `cancel` must be idempotent: cancelling an already-cancelled handle
/// is not an error. Implementations are expected to key their platform
/// resources by `note_id`, so re-issuing a schedule for the same note
/// replaces any orphaned alarm (this is what crash recovery relies on).
///
/// The futures are required to be `Send` so services built on top can
/// run inside spawned tasks; implementations can still use `async fn`.
pub trait AlarmScheduler: Send + Sync {
    fn schedule(
        &self,
        note_id: i64,
        fire_at: DateTime<Utc>,
        title: &str,
    ) -> impl Future<Output = Result<Uuid>> + Send;

    fn cancel(&self, handle: Uuid) -> impl Future<Output = Result<()>> + Send;
}

/// Redundant delivery: every schedule goes to the primary alarm
/// subsystem and to a fallback notification path. The primary handle is
/// the one callers hold; fallback failures are logged, never fatal.
pub struct FallbackScheduler<P, F> {
    primary: P,
    fallback: F,
    /// primary handle -> fallback handle, so cancel reaches both.
    fallback_handles: Mutex<HashMap<Uuid, Uuid>>,
}

impl<P: AlarmScheduler, F: AlarmScheduler> FallbackScheduler<P, F> {
    pub fn new(primary: P, fallback: F) -> Self {
        Self {
            primary,
            fallback,
            fallback_handles: Mutex::new(HashMap::new()),
        }
    }
}

impl<P: AlarmScheduler, F: AlarmScheduler> AlarmScheduler for FallbackScheduler<P, F> {
    async fn schedule(&self, note_id: i64, fire_at: DateTime<Utc>, title: &str) -> Result<Uuid> {
        let handle = self.primary.schedule(note_id, fire_at, title).await?;

        match self.fallback.schedule(note_id, fire_at, title).await {
            Ok(fallback_handle) => {
                self.fallback_handles
                    .lock()
                    .expect("fallback handle map poisoned")
                    .insert(handle, fallback_handle);
            }
            Err(e) => {
                tracing::warn!("Fallback scheduling failed for note {}: {}", note_id, e);
            }
        }

        Ok(handle)
    }

    async fn cancel(&self, handle: Uuid) -> Result<()> {
        let fallback_handle = self
            .fallback_handles
            .lock()
            .expect("fallback handle map poisoned")
            .remove(&handle);

        self.primary.cancel(handle).await?;

        if let Some(fb) = fallback_handle {
            if let Err(e) = self.fallback.cancel(fb).await {
                tracing::warn!("Fallback cancel failed for handle {}: {}", fb, e);
            }
        }

        Ok(())
    }
}

/// Bound an external scheduler call. Elapsing the deadline is a
/// scheduler error; the caller decides whether that is fatal.
pub(crate) async fn with_deadline<T, Fut>(what: &str, fut: Fut) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    match tokio::time::timeout(SCHEDULER_CALL_TIMEOUT, fut).await {
        Ok(result) => result,
        Err(_) => Err(AppError::Scheduler(format!(
            "{what} did not answer within {:?}",
            SCHEDULER_CALL_TIMEOUT
        ))),
    }
}
