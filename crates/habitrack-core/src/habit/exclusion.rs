//! Exclusion policy.
//!
//! An excluded day neither counts as a completion nor breaks a streak. A day
//! with no log at all is "absent", which is a different condition: absence
//! breaks the streak.

use super::HabitLog;

/// Whether `log` takes part in completion/streak evaluation.
pub fn is_counted(log: &HabitLog) -> bool {
    !log.excluded
}
