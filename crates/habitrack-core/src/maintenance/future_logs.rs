//! Removal of logs dated after today.
//!
//! Such logs can only come from clock skew or a bad import; they would
//! otherwise sit outside every streak walk forever.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::CoreError;
use crate::habit::HabitLog;
use crate::storage::HabitDb;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuturePurgeReport {
    pub today: NaiveDate,
    pub applied: bool,
    pub logs: Vec<HabitLog>,
}

impl FuturePurgeReport {
    pub fn message(&self) -> String {
        match (self.logs.len(), self.applied) {
            (0, _) => "No future habit logs found.".to_string(),
            (n, true) => format!("Deleted {n} habit log(s) dated after {}.", self.today),
            (n, false) => format!("Would delete {n} habit log(s) dated after {}.", self.today),
        }
    }
}

/// Find logs dated strictly after `today`; delete them when `apply` is set.
pub fn purge_future_logs(
    db: &HabitDb,
    today: NaiveDate,
    apply: bool,
) -> Result<FuturePurgeReport, CoreError> {
    db.immediate(|db| {
        let logs = db.logs_after(today)?;
        if apply {
            for log in &logs {
                db.delete_log(log.id)?;
            }
        }
        info!(applied = apply, found = logs.len(), %today, "future log scan finished");
        Ok(FuturePurgeReport {
            today,
            applied: apply,
            logs,
        })
    })
}
