//! Timer action protocol.
//!
//! A shell sends `{"action": "start" | "pause" | "resume" | "stop" | "reset"}`
//! and receives one of the [`TimerResponse`] shapes; the status query returns a
//! [`TimerStatus`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::engine::{HabitTimer, TimerState};
use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerAction {
    Start,
    Pause,
    Resume,
    Stop,
    Reset,
}

impl TimerAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerAction::Start => "start",
            TimerAction::Pause => "pause",
            TimerAction::Resume => "resume",
            TimerAction::Stop => "stop",
            TimerAction::Reset => "reset",
        }
    }
}

impl fmt::Display for TimerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimerAction {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(TimerAction::Start),
            "pause" => Ok(TimerAction::Pause),
            "resume" => Ok(TimerAction::Resume),
            "stop" => Ok(TimerAction::Stop),
            "reset" => Ok(TimerAction::Reset),
            other => Err(CoreError::InvalidAction(other.to_string())),
        }
    }
}

/// Wire form of a timer action request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerRequest {
    pub action: String,
}

impl TimerRequest {
    pub fn parse_action(&self) -> Result<TimerAction, CoreError> {
        self.action.parse()
    }
}

/// Result of a timer action. Elapsed/remaining are seconds; `value` is minutes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TimerResponse {
    Running { elapsed: f64, remaining: f64 },
    Paused { elapsed: f64, remaining: f64 },
    Stopped { elapsed: f64, remaining: f64 },
    Completed { value: f64, message: String },
    Reset,
}

impl TimerResponse {
    fn progress(timer: &HabitTimer, now: DateTime<Utc>, target_secs: f64) -> Self {
        let elapsed = timer.elapsed(now);
        let remaining = timer.remaining(now, target_secs);
        match timer.state() {
            TimerState::Running => TimerResponse::Running { elapsed, remaining },
            TimerState::Paused => TimerResponse::Paused { elapsed, remaining },
            TimerState::Stopped => TimerResponse::Stopped { elapsed, remaining },
        }
    }

    /// Minutes to record for a completed session.
    pub fn logged_minutes(&self) -> Option<f64> {
        match self {
            TimerResponse::Completed { value, .. } => Some(*value),
            _ => None,
        }
    }
}

/// Snapshot returned by the status query. Everything is derived at call time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerStatus {
    pub state: TimerState,
    pub elapsed: f64,
    pub remaining: f64,
    pub is_complete: bool,
    pub target_minutes: f64,
}

impl TimerStatus {
    pub fn of(timer: &HabitTimer, now: DateTime<Utc>, target_minutes: f64) -> Self {
        let target_secs = target_minutes * 60.0;
        Self {
            state: timer.state(),
            elapsed: timer.elapsed(now),
            remaining: timer.remaining(now, target_secs),
            is_complete: timer.is_complete(now, target_secs),
            target_minutes,
        }
    }
}

/// Apply `action` to `timer` at `now`.
///
/// Stop yields [`TimerResponse::Completed`] carrying the minutes the caller
/// must record in today's log; every other action is a pure state change.
pub fn apply_action(
    timer: &mut HabitTimer,
    action: TimerAction,
    now: DateTime<Utc>,
    target_secs: f64,
) -> TimerResponse {
    match action {
        TimerAction::Start => {
            timer.start(now);
            TimerResponse::progress(timer, now, target_secs)
        }
        TimerAction::Pause => {
            timer.pause(now);
            TimerResponse::progress(timer, now, target_secs)
        }
        TimerAction::Resume => {
            timer.resume(now);
            TimerResponse::progress(timer, now, target_secs)
        }
        TimerAction::Stop => {
            let minutes = timer.stop(now) / 60.0;
            TimerResponse::Completed {
                value: minutes,
                message: format!("Logged {minutes:.1} minutes"),
            }
        }
        TimerAction::Reset => {
            timer.reset();
            TimerResponse::Reset
        }
    }
}
