//! Request-path operations on a caller's habits.
//!
//! [`HabitService`] ties the store, the clock and the calendar timezone
//! together. Every operation takes the caller's user id and treats habits
//! owned by someone else exactly like missing ones.
//!
//! State-changing operations run inside [`HabitDb::immediate`]; timer writes
//! additionally compare-and-swap on the habit version and are retried on
//! conflict.

use std::sync::Arc;

use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::{CoreError, DatabaseError};
use crate::habit::streak::index_by_date;
use crate::maintenance::DATE_BASIS_KEY;
use crate::habit::{
    compute_streak, habit_stats, is_completed_today, Habit, HabitLog, HabitStats, HabitUpdate,
    NewHabit,
};
use crate::storage::{Config, HabitDb};
use crate::timer::{apply_action, TimerAction, TimerResponse, TimerStatus};

/// One row of the habit overview.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HabitOverview {
    pub habit: Habit,
    pub today_log: Option<HabitLog>,
    pub completed_today: bool,
    pub streak: u32,
}

/// Result of logging a value for today.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LogOutcome {
    Recorded { log: HabitLog },
    /// An excluded day was cleared by logging a non-positive value.
    Reactivated { habit_id: i64, date: NaiveDate },
}

pub struct HabitService {
    db: HabitDb,
    clock: Arc<dyn Clock>,
    tz: Tz,
    max_retries: u32,
}

impl HabitService {
    pub fn new(db: HabitDb, clock: Arc<dyn Clock>, tz: Tz) -> Self {
        Self {
            db,
            clock,
            tz,
            max_retries: 3,
        }
    }

    /// Build with the system clock and the configured calendar timezone.
    pub fn from_config(db: HabitDb, config: &Config) -> Result<Self, CoreError> {
        let tz = config.calendar_timezone()?;
        db.set_busy_timeout(config.busy_timeout())?;
        if let Some(basis) = date_basis_mismatch(&db, tz)? {
            warn!(
                calendar = tz.name(),
                basis = %basis,
                "stored log dates are bucketed in a different zone than calendar.timezone"
            );
        }
        Ok(Self::new(db, Arc::new(SystemClock), tz).with_max_retries(config.timer.max_retries))
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn db(&self) -> &HabitDb {
        &self.db
    }

    /// Calendar date of "now" in the service's timezone.
    pub fn today(&self) -> NaiveDate {
        self.clock.today(self.tz)
    }

    // === Habits ===

    pub fn create_habit(&self, new: &NewHabit) -> Result<Habit, CoreError> {
        let habit = self.db.insert_new_habit(new, self.clock.now())?;
        info!(habit_id = habit.id, user_id = habit.user_id, goal = %habit.goal_type, "habit created");
        Ok(habit)
    }

    /// The habit `habit_id`, if it belongs to `user_id`.
    pub fn habit(&self, user_id: i64, habit_id: i64) -> Result<Habit, CoreError> {
        owned_habit(&self.db, user_id, habit_id)
    }

    pub fn update_habit(
        &self,
        user_id: i64,
        habit_id: i64,
        update: &HabitUpdate,
    ) -> Result<Habit, CoreError> {
        self.db.immediate(|db| {
            let mut habit = owned_habit(db, user_id, habit_id)?;
            if update.is_empty() {
                return Ok(habit);
            }
            update.apply_to(&mut habit)?;
            db.update_habit(&habit)?;
            debug!(habit_id, "habit updated");
            Ok(habit)
        })
    }

    /// Delete a habit and all its logs.
    pub fn delete_habit(&self, user_id: i64, habit_id: i64) -> Result<(), CoreError> {
        self.db.immediate(|db| {
            owned_habit(db, user_id, habit_id)?;
            db.delete_habit(habit_id)?;
            info!(habit_id, "habit deleted");
            Ok(())
        })
    }

    /// Every habit of `user_id` with today's log, completion and streak.
    pub fn list_habits(&self, user_id: i64) -> Result<Vec<HabitOverview>, CoreError> {
        let today = self.today();
        let habits = self.db.list_habits(user_id)?;
        let mut overview = Vec::with_capacity(habits.len());
        for habit in habits {
            let logs = index_by_date(self.db.logs_for_habit(habit.id)?);
            let today_log = logs.get(&today).cloned();
            overview.push(HabitOverview {
                completed_today: is_completed_today(&habit, today_log.as_ref()),
                streak: compute_streak(&habit, &logs, today),
                today_log,
                habit,
            });
        }
        Ok(overview)
    }

    // === Logs ===

    /// Record today's value from raw user input.
    ///
    /// The log is no longer excluded afterwards. Logging a non-positive value
    /// on an excluded day removes that day's log instead.
    pub fn log_value(
        &self,
        user_id: i64,
        habit_id: i64,
        raw: Option<&str>,
    ) -> Result<LogOutcome, CoreError> {
        let today = self.today();
        self.db.immediate(|db| {
            let habit = owned_habit(db, user_id, habit_id)?;
            let value = habit.goal_type.coerce_input(raw);

            if value <= 0.0 {
                if let Some(existing) = db.get_log(habit_id, today)? {
                    if existing.excluded {
                        db.delete_log(existing.id)?;
                        info!(habit_id, date = %today, "day reactivated");
                        return Ok(LogOutcome::Reactivated {
                            habit_id,
                            date: today,
                        });
                    }
                }
            }

            let log = db.upsert_log(habit_id, today, value, false)?;
            debug!(habit_id, date = %today, value, "value logged");
            Ok(LogOutcome::Recorded { log })
        })
    }

    /// Mark today as excluded: it no longer counts for or against the streak.
    pub fn exclude_today(&self, user_id: i64, habit_id: i64) -> Result<HabitLog, CoreError> {
        let today = self.today();
        self.db.immediate(|db| {
            owned_habit(db, user_id, habit_id)?;
            let log = db.upsert_log(habit_id, today, 0.0, true)?;
            info!(habit_id, date = %today, "day excluded");
            Ok(log)
        })
    }

    pub fn streak(&self, user_id: i64, habit_id: i64) -> Result<u32, CoreError> {
        let habit = self.habit(user_id, habit_id)?;
        let logs = index_by_date(self.db.logs_for_habit(habit_id)?);
        Ok(compute_streak(&habit, &logs, self.today()))
    }

    // === Timer ===

    /// Apply a timer action given by name.
    ///
    /// The action is parsed before anything is read or written, so an
    /// unknown name leaves the habit untouched. `stop` writes today's log
    /// with the elapsed minutes in the same transaction as the timer reset.
    pub fn timer_action(
        &self,
        user_id: i64,
        habit_id: i64,
        action: &str,
    ) -> Result<TimerResponse, CoreError> {
        let action: TimerAction = action.parse()?;
        let mut attempt = 0;
        loop {
            match self.try_timer_action(user_id, habit_id, action) {
                Err(CoreError::Database(
                    err @ (DatabaseError::Conflict { .. } | DatabaseError::Locked),
                )) if attempt < self.max_retries => {
                    attempt += 1;
                    warn!(habit_id, %action, attempt, error = %err, "timer write lost a race; retrying");
                }
                other => return other,
            }
        }
    }

    fn try_timer_action(
        &self,
        user_id: i64,
        habit_id: i64,
        action: TimerAction,
    ) -> Result<TimerResponse, CoreError> {
        self.db.immediate(|db| {
            let mut habit = owned_habit(db, user_id, habit_id)?;
            let now = self.clock.now();
            let target_secs = habit.target_seconds();
            let response = apply_action(&mut habit.timer, action, now, target_secs);

            if let Some(minutes) = response.logged_minutes() {
                let today = now.with_timezone(&self.tz).date_naive();
                db.upsert_log(habit_id, today, minutes, false)?;
            }
            habit.version = db.update_timer(&habit)?;
            info!(habit_id, %action, state = habit.timer.state().as_str(), "timer action applied");
            Ok(response)
        })
    }

    pub fn timer_status(&self, user_id: i64, habit_id: i64) -> Result<TimerStatus, CoreError> {
        let habit = self.habit(user_id, habit_id)?;
        Ok(TimerStatus::of(&habit.timer, self.clock.now(), habit.target))
    }

    // === Statistics ===

    pub fn statistics(&self, user_id: i64) -> Result<Vec<HabitStats>, CoreError> {
        let today = self.today();
        self.db
            .list_habits(user_id)?
            .iter()
            .map(|habit| -> Result<HabitStats, CoreError> {
                let logs = index_by_date(self.db.logs_for_habit(habit.id)?);
                Ok(habit_stats(habit, &logs, today, self.tz))
            })
            .collect()
    }
}

/// The recorded log date basis, if a reconciliation pass set one that is not `tz`.
fn date_basis_mismatch(db: &HabitDb, tz: Tz) -> Result<Option<String>, CoreError> {
    Ok(db
        .kv_get(DATE_BASIS_KEY)?
        .filter(|basis| basis.as_str() != tz.name()))
}

fn owned_habit(db: &HabitDb, user_id: i64, habit_id: i64) -> Result<Habit, CoreError> {
    match db.get_habit(habit_id)? {
        Some(habit) if habit.user_id == user_id => Ok(habit),
        _ => Err(CoreError::NotFound { habit_id }),
    }
}
