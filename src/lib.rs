//! Todoo core
//!
//! Note persistence and scheduling-state management for the Todoo
//! to-do app: schema migration, the note store, the pure lifecycle
//! engine, and the category classifier. Platform alarm and notification
//! subsystems are consumed through the [`services::AlarmScheduler`]
//! interface; everything UI-facing lives elsewhere.

pub mod category;
pub mod config;
pub mod database;
pub mod error;
pub mod lifecycle;
pub mod services;

pub use category::{Category, SortOption};
pub use database::{create_pool, NewNote, Note, NoteStore};
pub use error::{AppError, Result};
pub use services::{AlarmScheduler, NotesService};
