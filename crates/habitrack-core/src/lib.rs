//! # Habitrack Core Library
//!
//! Core logic for a daily habit tracker. The CLI is a thin layer over the
//! same library.
//!
//! ## Architecture
//!
//! - **Habits**: goal types, completion rule, streak walk with excluded days,
//!   per-habit statistics
//! - **Timer**: a persisted stopped/running/paused state machine for time
//!   habits, driven by a small action protocol
//! - **Storage**: SQLite record store with versioned migrations and
//!   TOML-based configuration
//! - **Maintenance**: re-bucketing log dates across timezones, duplicate
//!   repair, purging logs dated in the future
//!
//! ## Key Components
//!
//! - [`HabitService`]: request-path operations for one caller
//! - [`HabitDb`]: habit and log persistence
//! - [`LogReconciler`]: timezone re-bucketing pass
//! - [`Config`]: application configuration management
//! - [`Clock`]: injectable source of "now"

pub mod clock;
pub mod error;
pub mod habit;
pub mod maintenance;
pub mod service;
pub mod storage;
pub mod timer;

pub use clock::{parse_timezone, Clock, FixedClock, ManualClock, SystemClock};
pub use error::{ConfigError, CoreError, DatabaseError, ValidationError};
pub use habit::{compute_streak, GoalType, Habit, HabitLog, HabitStats, HabitUpdate, NewHabit};
pub use maintenance::{DuplicateReport, FuturePurgeReport, LogReconciler, ReconciliationReport};
pub use service::{HabitOverview, HabitService, LogOutcome};
pub use storage::{Config, HabitDb};
pub use timer::{HabitTimer, TimerAction, TimerResponse, TimerState, TimerStatus};
