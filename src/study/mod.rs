//! Spaced repetition study engine
//!
//! This module provides:
//! - The FSRS memory model and the card state machine built on it
//! - The daily study queue with per-user new card budgets
//! - Reviewing, previewing and undoing reviews
//! - Study sessions with aggregated results
//! - SQLite persistence behind narrow store traits

pub mod cards;
pub mod clock;
pub mod config;
pub mod context;
pub mod dashboard;
pub mod error;
pub mod fsrs;
pub mod input;
pub mod models;
pub mod queue;
pub mod review;
pub mod service;
pub mod session;
pub mod storage;
pub mod store;
pub mod timezone;
pub mod undo;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, SrsConfig};
pub use context::RequestContext;
pub use error::{StudyError, StudyResult, ValidationError};
pub use input::*;
pub use models::*;
pub use service::StudyService;
pub use storage::SqliteStudyStore;
pub use store::{StudyRepository, StudyStores};
