//! Per-habit statistics.

use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use super::exclusion::is_counted;
use super::streak::{compute_streak, LogsByDate};
use super::Habit;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HabitStats {
    pub habit_id: i64,
    pub name: String,
    /// Calendar days from creation through today, inclusive.
    pub days_since_creation: i64,
    pub total_logs: usize,
    /// Counted logs that meet the completion rule.
    pub completed: usize,
    /// `completed / total_logs`, percent, one decimal.
    pub success_rate: f64,
    /// `total_logs / days_since_creation`, percent, one decimal.
    pub logging_rate: f64,
    pub current_streak: u32,
}

/// Statistics as of `today`, a calendar date in `tz`.
///
/// The creation day is taken in the same zone as `today`.
pub fn habit_stats(habit: &Habit, logs: &LogsByDate, today: NaiveDate, tz: Tz) -> HabitStats {
    let created = habit.created_at.with_timezone(&tz).date_naive();
    let days_since_creation = (today - created).num_days() + 1;
    let total_logs = logs.len();
    let completed = logs
        .values()
        .filter(|log| is_counted(log) && habit.is_value_complete(log.value))
        .count();

    HabitStats {
        habit_id: habit.id,
        name: habit.name.clone(),
        days_since_creation,
        total_logs,
        completed,
        success_rate: percent(completed as f64, total_logs as f64),
        logging_rate: percent(total_logs as f64, days_since_creation as f64),
        current_streak: compute_streak(habit, logs, today),
    }
}

fn percent(part: f64, whole: f64) -> f64 {
    if whole <= 0.0 {
        return 0.0;
    }
    (part / whole * 1000.0).round() / 10.0
}
