//! Timezone re-bucketing of historical habit logs.
//!
//! Log dates were once derived from "today" in one timezone (the source) and
//! must be reinterpreted in another (the target). For each log, midnight of
//! its stored date in the source zone is converted to the target zone, and the
//! resulting calendar date is where the log belongs.
//!
//! When a moved log lands on a date that already has a log for the same habit,
//! the two are merged: values are summed and exclusion flags OR-ed into the
//! surviving record, and the moved record is deleted. Summation is sound for
//! time habits; for boolean/numeric habits it can overshoot the target.
//!
//! ## Usage
//! ```rust,ignore
//! let reconciler = LogReconciler::new(chrono_tz::UTC, chrono_tz::America::Asuncion);
//! let report = reconciler.run(&db, false)?; // dry run
//! println!("{}", report.message());
//! ```

use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clock::parse_timezone;
use crate::error::CoreError;
use crate::habit::HabitLog;
use crate::storage::HabitDb;

/// kv key recording the zone stored log dates are currently bucketed in.
pub const DATE_BASIS_KEY: &str = "log_date_basis";

/// First instant of `date` in `tz`.
///
/// Midnight itself may not exist (DST gap at 00:00) or may occur twice; the
/// earliest valid local time on or after midnight is used.
fn start_of_day(date: NaiveDate, tz: Tz) -> DateTime<Tz> {
    let midnight = date.and_time(NaiveTime::MIN);
    let mut candidate = midnight;
    // Gaps are at most a couple of hours; scan the day in 15 minute steps.
    for _ in 0..96 {
        if let Some(instant) = tz.from_local_datetime(&candidate).earliest() {
            return instant;
        }
        candidate += Duration::minutes(15);
    }
    tz.from_utc_datetime(&midnight)
}

/// Calendar date in `target` of the start of `stored` in `source`.
pub fn corrected_date(stored: NaiveDate, source: Tz, target: Tz) -> NaiveDate {
    start_of_day(stored, source)
        .with_timezone(&target)
        .date_naive()
}

/// A log whose date is rewritten in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateUpdate {
    pub log_id: i64,
    pub habit_id: i64,
    pub old_date: NaiveDate,
    pub new_date: NaiveDate,
}

/// A log folded into another log that already occupies its corrected date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeDetail {
    pub deleted_log_id: i64,
    pub habit_id: i64,
    pub old_date: NaiveDate,
    pub new_date: NaiveDate,
    pub kept_log_id: i64,
    /// Value of the kept log after the merge.
    pub merged_value: f64,
    /// Exclusion flag of the kept log after the merge.
    pub merged_excluded: bool,
}

/// One step of a reconciliation pass, in execution order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ReconcileOp {
    Update(DateUpdate),
    Merge(MergeDetail),
}

/// Outcome of a reconciliation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationReport {
    /// Zone the stored dates were interpreted in.
    pub source_tz: String,
    pub target_tz: String,
    /// False for a dry run: nothing was written.
    pub applied: bool,
    pub updated_count: usize,
    pub merged_count: usize,
    /// Date rewrites; pending when `applied` is false.
    pub updates: Vec<DateUpdate>,
    pub merged_details: Vec<MergeDetail>,
}

impl ReconciliationReport {
    pub fn is_noop(&self) -> bool {
        self.updated_count == 0 && self.merged_count == 0
    }

    /// Human-readable summary line.
    pub fn message(&self) -> String {
        let verb = if self.applied { "Updated" } else { "Would update" };
        let merge_verb = if self.applied { "merged" } else { "would merge" };
        format!(
            "{verb} {} habit log(s), {merge_verb} {} duplicate(s) ({} -> {}).",
            self.updated_count, self.merged_count, self.source_tz, self.target_tz
        )
    }
}

/// Ordered list of operations produced by planning over a log snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconciliationPlan {
    pub ops: Vec<ReconcileOp>,
}

impl ReconciliationPlan {
    pub fn updates(&self) -> impl Iterator<Item = &DateUpdate> {
        self.ops.iter().filter_map(|op| match op {
            ReconcileOp::Update(u) => Some(u),
            ReconcileOp::Merge(_) => None,
        })
    }

    pub fn merges(&self) -> impl Iterator<Item = &MergeDetail> {
        self.ops.iter().filter_map(|op| match op {
            ReconcileOp::Merge(m) => Some(m),
            ReconcileOp::Update(_) => None,
        })
    }

    fn report(&self, source: Tz, target: Tz, applied: bool) -> ReconciliationReport {
        let updates: Vec<DateUpdate> = self.updates().cloned().collect();
        let merged_details: Vec<MergeDetail> = self.merges().cloned().collect();
        ReconciliationReport {
            source_tz: source.name().to_string(),
            target_tz: target.name().to_string(),
            applied,
            updated_count: updates.len(),
            merged_count: merged_details.len(),
            updates,
            merged_details,
        }
    }
}

/// Re-buckets log dates from a source timezone to a target timezone.
#[derive(Debug, Clone, Copy)]
pub struct LogReconciler {
    source: Tz,
    target: Tz,
}

impl LogReconciler {
    pub fn new(source: Tz, target: Tz) -> Self {
        Self { source, target }
    }

    /// Build from IANA names.
    pub fn from_names(source: &str, target: &str) -> Result<Self, CoreError> {
        Ok(Self::new(parse_timezone(source)?, parse_timezone(target)?))
    }

    pub fn source(&self) -> Tz {
        self.source
    }

    pub fn target(&self) -> Tz {
        self.target
    }

    /// Plan the pass over `logs`. Pure: nothing is written.
    ///
    /// Logs are processed in ascending id order. Conflict lookups see the
    /// effect of every earlier step of the same pass, so the plan is exactly
    /// what applying it will do.
    pub fn plan(&self, logs: &[HabitLog]) -> ReconciliationPlan {
        let mut ordered: Vec<&HabitLog> = logs.iter().collect();
        ordered.sort_by_key(|log| log.id);

        // (habit_id, date) -> id of the log occupying that day.
        let mut occupied: HashMap<(i64, NaiveDate), i64> = HashMap::new();
        // id -> current (date, value, excluded) in the working set.
        let mut working: HashMap<i64, (NaiveDate, f64, bool)> = HashMap::new();
        for log in &ordered {
            occupied.entry((log.habit_id, log.date)).or_insert(log.id);
            working.insert(log.id, (log.date, log.value, log.excluded));
        }

        let mut plan = ReconciliationPlan::default();
        for log in ordered {
            let Some(&(stored, value, excluded)) = working.get(&log.id) else {
                continue;
            };
            let new_date = corrected_date(stored, self.source, self.target);
            if new_date == stored {
                continue;
            }

            if occupied.get(&(log.habit_id, stored)) == Some(&log.id) {
                occupied.remove(&(log.habit_id, stored));
            }

            let conflict = occupied
                .get(&(log.habit_id, new_date))
                .copied()
                .filter(|&other| other != log.id);

            match conflict {
                None => {
                    debug!(log_id = log.id, habit_id = log.habit_id, %stored, %new_date, "date update");
                    occupied.insert((log.habit_id, new_date), log.id);
                    if let Some(entry) = working.get_mut(&log.id) {
                        entry.0 = new_date;
                    }
                    plan.ops.push(ReconcileOp::Update(DateUpdate {
                        log_id: log.id,
                        habit_id: log.habit_id,
                        old_date: stored,
                        new_date,
                    }));
                }
                Some(kept_log_id) => {
                    working.remove(&log.id);
                    let Some(kept) = working.get_mut(&kept_log_id) else {
                        continue;
                    };
                    kept.1 += value;
                    kept.2 = kept.2 || excluded;
                    debug!(
                        log_id = log.id,
                        kept_log_id,
                        habit_id = log.habit_id,
                        %stored,
                        %new_date,
                        "merge into existing log"
                    );
                    plan.ops.push(ReconcileOp::Merge(MergeDetail {
                        deleted_log_id: log.id,
                        habit_id: log.habit_id,
                        old_date: stored,
                        new_date,
                        kept_log_id,
                        merged_value: kept.1,
                        merged_excluded: kept.2,
                    }));
                }
            }
        }
        plan
    }

    /// Run a full pass against the store under one exclusive transaction.
    ///
    /// With `apply = false` the report is produced and nothing is written.
    /// With `apply = true` every operation is executed and the store's date
    /// basis is set to the target zone; any storage error rolls back the
    /// whole pass.
    ///
    /// If an earlier applied pass recorded a date basis, stored dates are
    /// reinterpreted from that basis rather than from `source`, which is what
    /// makes a repeated pass a no-op.
    pub fn run(&self, db: &HabitDb, apply: bool) -> Result<ReconciliationReport, CoreError> {
        db.immediate(|db| {
            let source = match db.kv_get(DATE_BASIS_KEY)? {
                Some(basis) => {
                    let basis = parse_timezone(&basis)?;
                    if basis != self.source {
                        warn!(
                            requested = self.source.name(),
                            recorded = basis.name(),
                            "store dates already re-bucketed; using recorded basis"
                        );
                    }
                    basis
                }
                None => self.source,
            };
            let effective = LogReconciler::new(source, self.target);

            let logs = db.all_logs()?;
            let plan = effective.plan(&logs);

            if apply {
                for op in &plan.ops {
                    match op {
                        ReconcileOp::Update(u) => db.set_log_date(u.log_id, u.new_date)?,
                        ReconcileOp::Merge(m) => {
                            db.set_log_value(m.kept_log_id, m.merged_value, m.merged_excluded)?;
                            db.delete_log(m.deleted_log_id)?;
                        }
                    }
                }
                db.kv_set(DATE_BASIS_KEY, self.target.name())?;
            }

            let report = plan.report(source, self.target, apply);
            info!(
                applied = apply,
                scanned = logs.len(),
                updated = report.updated_count,
                merged = report.merged_count,
                source = source.name(),
                target = self.target.name(),
                "log reconciliation pass finished"
            );
            Ok(report)
        })
    }
}
