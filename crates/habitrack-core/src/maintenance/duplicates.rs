//! Detection and repair of duplicate `(habit_id, date)` logs.
//!
//! Stores created before the unique index may hold several logs for the same
//! habit and day. Repair keeps the most recent record (highest id) and deletes
//! the rest, then re-runs migrations so the unique index can be created.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::CoreError;
use crate::habit::HabitLog;
use crate::storage::HabitDb;

/// One habit/day that has more than one log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub habit_id: i64,
    pub date: NaiveDate,
    pub kept_log_id: i64,
    pub deleted_log_ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateReport {
    pub applied: bool,
    pub groups: Vec<DuplicateGroup>,
    /// Logs removed, or that would be removed on apply.
    pub deleted_count: usize,
}

impl DuplicateReport {
    pub fn message(&self) -> String {
        if self.groups.is_empty() {
            return "No duplicate habit logs found.".to_string();
        }
        let verb = if self.applied { "Deleted" } else { "Would delete" };
        format!(
            "{verb} {} duplicate log(s) across {} habit/day pair(s).",
            self.deleted_count,
            self.groups.len()
        )
    }
}

/// Group `logs` by habit and date, returning only groups with duplicates.
///
/// Output is ordered by habit id, then date.
pub fn find_duplicates(logs: &[HabitLog]) -> Vec<DuplicateGroup> {
    let mut by_day: BTreeMap<(i64, NaiveDate), Vec<i64>> = BTreeMap::new();
    for log in logs {
        by_day.entry((log.habit_id, log.date)).or_default().push(log.id);
    }

    by_day
        .into_iter()
        .filter(|(_, ids)| ids.len() > 1)
        .filter_map(|((habit_id, date), mut ids)| {
            ids.sort_unstable();
            let kept_log_id = ids.pop()?;
            Some(DuplicateGroup {
                habit_id,
                date,
                kept_log_id,
                deleted_log_ids: ids,
            })
        })
        .collect()
}

/// Scan the store for duplicates; delete them when `apply` is set.
pub fn repair_duplicates(db: &HabitDb, apply: bool) -> Result<DuplicateReport, CoreError> {
    let report = db.immediate(|db| -> Result<DuplicateReport, CoreError> {
        let groups = find_duplicates(&db.all_logs()?);
        let deleted_count = groups.iter().map(|g| g.deleted_log_ids.len()).sum();

        for group in &groups {
            warn!(
                habit_id = group.habit_id,
                date = %group.date,
                count = group.deleted_log_ids.len() + 1,
                "duplicate habit logs"
            );
            if apply {
                for &id in &group.deleted_log_ids {
                    db.delete_log(id)?;
                }
            }
        }

        Ok(DuplicateReport {
            applied: apply,
            groups,
            deleted_count,
        })
    })?;

    if apply && report.deleted_count > 0 {
        db.remigrate()?;
    }
    info!(
        applied = apply,
        groups = report.groups.len(),
        deleted = report.deleted_count,
        "duplicate scan finished"
    );
    Ok(report)
}
