//! Service layer
//!
//! High-level orchestration over the store, the lifecycle engine, and
//! the external alarm/notification collaborators.

pub mod notes;
pub mod scheduler;

pub use notes::{NotesService, SweepOutcome};
pub use scheduler::{AlarmScheduler, FallbackScheduler};
