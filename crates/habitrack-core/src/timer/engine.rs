//! Habit timer state machine.
//!
//! The timer is a wall-clock-based state machine with no internal thread and
//! no ticking: elapsed time is always derived from the stored start instant
//! and the accumulated seconds at the moment it is asked for.
//!
//! ## State Transitions
//!
//! ```text
//! Stopped --start/resume--> Running --pause--> Paused --start/resume--> Running
//!    ^                         |                  |
//!    +------- stop/reset ------+------------------+
//! ```
//!
//! Every action is defined in every state. Pausing while not running is a
//! no-op. Starting does not clear accumulated time, so start after a pause
//! behaves like resume.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    #[default]
    Stopped,
    Running,
    Paused,
}

impl TimerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerState::Stopped => "stopped",
            TimerState::Running => "running",
            TimerState::Paused => "paused",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "stopped" => Some(TimerState::Stopped),
            "running" => Some(TimerState::Running),
            "paused" => Some(TimerState::Paused),
            _ => None,
        }
    }
}

/// Persisted timer fields of a habit.
///
/// Invariant: `timer_started_at.is_some()` iff `timer_state == Running`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct HabitTimer {
    #[serde(default)]
    pub timer_state: TimerState,
    #[serde(default)]
    pub timer_started_at: Option<DateTime<Utc>>,
    /// Seconds banked by earlier running intervals.
    #[serde(default)]
    pub accumulated_time: f64,
}

impl HabitTimer {
    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> TimerState {
        self.timer_state
    }

    /// Seconds of tracked time as of `now`.
    pub fn elapsed(&self, now: DateTime<Utc>) -> f64 {
        match self.timer_state {
            TimerState::Running => self.accumulated_time + self.in_flight(now),
            TimerState::Paused => self.accumulated_time,
            TimerState::Stopped => 0.0,
        }
    }

    /// Seconds left until `target_secs`, never negative.
    pub fn remaining(&self, now: DateTime<Utc>, target_secs: f64) -> f64 {
        (target_secs - self.elapsed(now)).max(0.0)
    }

    pub fn is_complete(&self, now: DateTime<Utc>, target_secs: f64) -> bool {
        self.elapsed(now) >= target_secs
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Begin (or continue) timing. Accumulated time is kept.
    pub fn start(&mut self, now: DateTime<Utc>) {
        self.run_from(now);
    }

    /// Bank the in-flight interval and freeze. No-op unless running.
    pub fn pause(&mut self, now: DateTime<Utc>) -> bool {
        if self.timer_state != TimerState::Running {
            return false;
        }
        self.flush_elapsed(now);
        self.timer_state = TimerState::Paused;
        self.timer_started_at = None;
        true
    }

    pub fn resume(&mut self, now: DateTime<Utc>) {
        self.run_from(now);
    }

    /// Finish the session: returns the elapsed seconds and resets the timer.
    pub fn stop(&mut self, now: DateTime<Utc>) -> f64 {
        let elapsed = self.elapsed(now);
        self.reset();
        elapsed
    }

    pub fn reset(&mut self) {
        self.timer_state = TimerState::Stopped;
        self.timer_started_at = None;
        self.accumulated_time = 0.0;
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn run_from(&mut self, now: DateTime<Utc>) {
        // Already running: bank the current interval before restamping.
        if self.timer_state == TimerState::Running {
            self.flush_elapsed(now);
        }
        self.timer_state = TimerState::Running;
        self.timer_started_at = Some(now);
    }

    fn flush_elapsed(&mut self, now: DateTime<Utc>) {
        self.accumulated_time += self.in_flight(now);
    }

    fn in_flight(&self, now: DateTime<Utc>) -> f64 {
        match self.timer_started_at {
            Some(started) => seconds_between(started, now),
            None => 0.0,
        }
    }
}

/// Seconds from `from` to `to`, clamped at zero for clocks that moved back.
fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    ((to - from).num_milliseconds() as f64 / 1000.0).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn start_pause_resume() {
        let mut timer = HabitTimer::default();
        assert_eq!(timer.state(), TimerState::Stopped);

        timer.start(t0());
        assert_eq!(timer.state(), TimerState::Running);
        assert_eq!(timer.timer_started_at, Some(t0()));

        assert!(timer.pause(t0() + Duration::seconds(30)));
        assert_eq!(timer.state(), TimerState::Paused);
        assert_eq!(timer.timer_started_at, None);
        assert_eq!(timer.accumulated_time, 30.0);

        timer.resume(t0() + Duration::seconds(100));
        assert_eq!(timer.state(), TimerState::Running);
        assert_eq!(timer.elapsed(t0() + Duration::seconds(110)), 40.0);
    }

    #[test]
    fn paused_time_is_frozen() {
        let mut timer = HabitTimer::default();
        timer.start(t0());
        timer.pause(t0() + Duration::seconds(45));
        assert_eq!(timer.elapsed(t0() + Duration::hours(3)), 45.0);
    }

    #[test]
    fn pause_when_not_running_is_noop() {
        let mut timer = HabitTimer::default();
        assert!(!timer.pause(t0()));
        assert_eq!(timer, HabitTimer::default());

        timer.start(t0());
        timer.pause(t0() + Duration::seconds(10));
        let snapshot = timer.clone();
        assert!(!timer.pause(t0() + Duration::seconds(50)));
        assert_eq!(timer, snapshot);
    }

    #[test]
    fn start_after_pause_keeps_accumulated() {
        let mut timer = HabitTimer::default();
        timer.start(t0());
        timer.pause(t0() + Duration::seconds(20));
        timer.start(t0() + Duration::seconds(60));
        assert_eq!(timer.elapsed(t0() + Duration::seconds(65)), 25.0);
    }

    #[test]
    fn restarting_while_running_loses_nothing() {
        let mut timer = HabitTimer::default();
        timer.start(t0());
        timer.resume(t0() + Duration::seconds(15));
        timer.start(t0() + Duration::seconds(20));
        assert_eq!(timer.accumulated_time, 20.0);
        assert_eq!(timer.elapsed(t0() + Duration::seconds(30)), 30.0);
    }

    #[test]
    fn stop_returns_elapsed_and_resets() {
        let mut timer = HabitTimer::default();
        timer.start(t0());
        timer.pause(t0() + Duration::seconds(60));
        timer.resume(t0() + Duration::seconds(120));
        let elapsed = timer.stop(t0() + Duration::seconds(180));
        assert_eq!(elapsed, 120.0);
        assert_eq!(timer, HabitTimer::default());
    }

    #[test]
    fn reset_from_any_state() {
        for setup in 0..3 {
            let mut timer = HabitTimer::default();
            if setup >= 1 {
                timer.start(t0());
            }
            if setup >= 2 {
                timer.pause(t0() + Duration::seconds(5));
            }
            timer.reset();
            assert_eq!(timer.state(), TimerState::Stopped);
            assert_eq!(timer.elapsed(t0() + Duration::seconds(60)), 0.0);
        }
    }

    #[test]
    fn remaining_and_completion() {
        let mut timer = HabitTimer::default();
        timer.start(t0());
        let target = 10.0 * 60.0;
        assert_eq!(timer.remaining(t0() + Duration::minutes(4), target), 360.0);
        assert!(!timer.is_complete(t0() + Duration::minutes(4), target));
        assert_eq!(timer.remaining(t0() + Duration::minutes(12), target), 0.0);
        assert!(timer.is_complete(t0() + Duration::minutes(10), target));
    }

    #[test]
    fn clock_moving_backwards_never_yields_negative_time() {
        let mut timer = HabitTimer::default();
        timer.start(t0());
        assert_eq!(timer.elapsed(t0() - Duration::seconds(30)), 0.0);
    }
}
