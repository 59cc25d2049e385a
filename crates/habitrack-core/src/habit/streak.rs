//! Consecutive-day streak calculation.
//!
//! The walk starts at "today" and moves backward one calendar day at a time:
//!
//! ```text
//! absent  -> stop
//! excluded -> skip (no count, no stop)
//! complete -> count, continue
//! failing -> stop
//! ```
//!
//! Today is special: if it has no log yet, or its log is failing, the walk
//! starts at yesterday so an unfinished today never zeroes an existing streak.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use super::exclusion::is_counted;
use super::{Habit, HabitLog};

/// Logs of a single habit keyed by calendar date.
pub type LogsByDate = BTreeMap<NaiveDate, HabitLog>;

/// Index logs by date. Later entries win on duplicate dates.
pub fn index_by_date(logs: impl IntoIterator<Item = HabitLog>) -> LogsByDate {
    logs.into_iter().map(|log| (log.date, log)).collect()
}

/// Number of consecutive completed days ending today (or yesterday, when
/// today is not done yet).
pub fn compute_streak(habit: &Habit, logs: &LogsByDate, today: NaiveDate) -> u32 {
    let Some(&first_logged) = logs.keys().next() else {
        return 0;
    };
    // Hard floor for the walk: nothing before creation (or before the first
    // log, if reconciliation moved one earlier) can extend the streak.
    let floor = first_logged.min(habit.created_at.date_naive());

    let mut cursor = match logs.get(&today) {
        Some(log) if !is_counted(log) || habit.is_value_complete(log.value) => today,
        _ => match today.pred_opt() {
            Some(yesterday) => yesterday,
            None => return 0,
        },
    };

    let mut streak = 0;
    while cursor >= floor {
        let Some(log) = logs.get(&cursor) else {
            break;
        };
        if is_counted(log) {
            if !habit.is_value_complete(log.value) {
                break;
            }
            streak += 1;
        }
        match cursor.pred_opt() {
            Some(prev) => cursor = prev,
            None => break,
        }
    }
    streak
}

/// Whether today's log (if any) completes the habit. Excluded days are never
/// complete.
pub fn is_completed_today(habit: &Habit, today_log: Option<&HabitLog>) -> bool {
    match today_log {
        Some(log) if is_counted(log) => habit.is_value_complete(log.value),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::habit::test_support::{day, habit, log};
    use crate::habit::GoalType;

    fn run(values: &[(NaiveDate, f64, bool)]) -> LogsByDate {
        index_by_date(
            values
                .iter()
                .enumerate()
                .map(|(i, &(d, v, e))| log(i as i64 + 1, d, v, e)),
        )
    }

    #[test]
    fn no_logs_means_zero() {
        let h = habit(GoalType::Boolean, 1.0);
        assert_eq!(compute_streak(&h, &LogsByDate::new(), day(2024, 5, 10)), 0);
    }

    #[test]
    fn contiguous_run_ending_today() {
        let h = habit(GoalType::Boolean, 1.0);
        let logs = run(&[
            (day(2024, 5, 8), 1.0, false),
            (day(2024, 5, 9), 1.0, false),
            (day(2024, 5, 10), 1.0, false),
        ]);
        assert_eq!(compute_streak(&h, &logs, day(2024, 5, 10)), 3);
    }

    #[test]
    fn absent_today_keeps_yesterdays_streak() {
        let h = habit(GoalType::Boolean, 1.0);
        let logs = run(&[(day(2024, 5, 8), 1.0, false), (day(2024, 5, 9), 1.0, false)]);
        assert_eq!(compute_streak(&h, &logs, day(2024, 5, 10)), 2);
    }

    #[test]
    fn failing_today_keeps_yesterdays_streak() {
        let h = habit(GoalType::Numeric, 5.0);
        let logs = run(&[
            (day(2024, 5, 9), 6.0, false),
            (day(2024, 5, 10), 2.0, false),
        ]);
        assert_eq!(compute_streak(&h, &logs, day(2024, 5, 10)), 1);
    }

    #[test]
    fn gap_ends_the_streak() {
        let h = habit(GoalType::Boolean, 1.0);
        let logs = run(&[
            (day(2024, 5, 6), 1.0, false),
            (day(2024, 5, 8), 1.0, false),
            (day(2024, 5, 9), 1.0, false),
        ]);
        assert_eq!(compute_streak(&h, &logs, day(2024, 5, 9)), 2);
    }

    #[test]
    fn failing_day_in_the_past_stops_the_walk() {
        let h = habit(GoalType::Time, 30.0);
        let logs = run(&[
            (day(2024, 5, 7), 45.0, false),
            (day(2024, 5, 8), 10.0, false),
            (day(2024, 5, 9), 30.0, false),
        ]);
        assert_eq!(compute_streak(&h, &logs, day(2024, 5, 9)), 1);
    }

    #[test]
    fn excluded_days_are_transparent() {
        let h = habit(GoalType::Boolean, 1.0);
        let logs = run(&[
            (day(2024, 5, 7), 1.0, false),
            (day(2024, 5, 8), 0.0, true),
            (day(2024, 5, 9), 1.0, false),
        ]);
        assert_eq!(compute_streak(&h, &logs, day(2024, 5, 9)), 2);
    }

    #[test]
    fn excluded_today_does_not_break_run() {
        let h = habit(GoalType::Boolean, 1.0);
        let logs = run(&[
            (day(2024, 5, 8), 1.0, false),
            (day(2024, 5, 9), 1.0, false),
            (day(2024, 5, 10), 0.0, true),
        ]);
        assert_eq!(compute_streak(&h, &logs, day(2024, 5, 10)), 2);
    }

    #[test]
    fn long_excluded_run_terminates() {
        let h = habit(GoalType::Boolean, 1.0);
        let mut logs = LogsByDate::new();
        let today = day(2024, 3, 1);
        let mut d = today;
        for i in 0..500 {
            logs.insert(d, log(i, d, 0.0, true));
            d = d.pred_opt().unwrap();
        }
        assert_eq!(compute_streak(&h, &logs, today), 0);
    }

    #[test]
    fn completed_today_rules() {
        let h = habit(GoalType::Numeric, 3.0);
        assert!(!is_completed_today(&h, None));
        assert!(is_completed_today(&h, Some(&log(1, day(2024, 5, 1), 3.0, false))));
        assert!(!is_completed_today(&h, Some(&log(1, day(2024, 5, 1), 2.0, false))));
        assert!(!is_completed_today(&h, Some(&log(1, day(2024, 5, 1), 9.0, true))));
    }
}
