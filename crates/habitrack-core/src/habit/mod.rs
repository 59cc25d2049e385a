//! Habit and habit-log domain types.
//!
//! A [`Habit`] carries its completion rule (`goal_type` + `target`) and the
//! persisted timer fields. A [`HabitLog`] is one day's recorded value; there is
//! at most one log per `(habit_id, date)`.

pub mod exclusion;
pub mod stats;
pub mod streak;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::timer::HabitTimer;

pub use exclusion::is_counted;
pub use stats::{habit_stats, HabitStats};
pub use streak::{compute_streak, is_completed_today, LogsByDate};

/// How a habit's logged value is judged.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum GoalType {
    /// Done / not done. Completed when `value >= 1`.
    #[default]
    Boolean,
    /// Completed when `value >= target`.
    Numeric,
    /// Minutes. Completed when `value >= target`; drives the habit timer.
    Time,
}

impl GoalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalType::Boolean => "boolean",
            GoalType::Numeric => "numeric",
            GoalType::Time => "time",
        }
    }

    /// Turn raw user input into a log value for this goal type.
    ///
    /// Boolean habits: missing input means "done"; empty or non-positive
    /// numeric input means "not done"; any other text means "done".
    /// Numeric/time habits: unparsable or missing input becomes `0.0`.
    pub fn coerce_input(&self, raw: Option<&str>) -> f64 {
        match self {
            GoalType::Boolean => match raw.map(str::trim) {
                None => 1.0,
                Some("") => 0.0,
                Some(s) => match s.parse::<f64>() {
                    Ok(v) if v.is_finite() && v > 0.0 => 1.0,
                    Ok(_) => 0.0,
                    Err(_) => 1.0,
                },
            },
            GoalType::Numeric | GoalType::Time => {
                raw.map(|s| parse_value_or(s, 0.0)).unwrap_or(0.0)
            }
        }
    }
}

impl fmt::Display for GoalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GoalType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "boolean" | "bool" => Ok(GoalType::Boolean),
            "numeric" | "number" => Ok(GoalType::Numeric),
            "time" => Ok(GoalType::Time),
            other => Err(ValidationError::UnknownGoalType(other.to_string())),
        }
    }
}

/// Parse a float, falling back to `default` on anything unparsable or
/// non-finite.
pub fn parse_value_or(raw: &str, default: f64) -> f64 {
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => default,
    }
}

/// A user-defined recurring goal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Habit {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub goal_type: GoalType,
    /// Threshold for numeric/time habits (minutes for time). Ignored for boolean.
    pub target: f64,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub timer: HabitTimer,
    /// Bumped on every timer write; used for compare-and-swap updates.
    #[serde(default)]
    pub version: i64,
}

impl Habit {
    /// Whether `value` satisfies this habit's completion rule.
    pub fn is_value_complete(&self, value: f64) -> bool {
        match self.goal_type {
            GoalType::Boolean => value >= 1.0,
            GoalType::Numeric | GoalType::Time => value >= self.target,
        }
    }

    /// Timer target in seconds. The target is expressed in minutes.
    pub fn target_seconds(&self) -> f64 {
        self.target * 60.0
    }
}

/// One day's recorded value for one habit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HabitLog {
    pub id: i64,
    pub habit_id: i64,
    pub date: NaiveDate,
    pub value: f64,
    #[serde(default)]
    pub excluded: bool,
}

/// Fields needed to create a habit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewHabit {
    pub user_id: i64,
    pub name: String,
    #[serde(default)]
    pub goal_type: GoalType,
    /// Defaults to 1.0 when omitted.
    #[serde(default)]
    pub target: Option<f64>,
}

impl NewHabit {
    pub const DEFAULT_TARGET: f64 = 1.0;

    pub fn new(user_id: i64, name: impl Into<String>, goal_type: GoalType) -> Self {
        Self {
            user_id,
            name: name.into(),
            goal_type,
            target: None,
        }
    }

    pub fn with_target(mut self, target: f64) -> Self {
        self.target = Some(target);
        self
    }

    /// Trimmed name and resolved target, or the first validation failure.
    pub fn validated(&self) -> Result<(String, f64), ValidationError> {
        let name = validate_name(&self.name)?;
        let target = self.target.unwrap_or(Self::DEFAULT_TARGET);
        validate_target(target)?;
        Ok((name, target))
    }
}

/// Partial update of a habit's editable fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HabitUpdate {
    pub name: Option<String>,
    pub goal_type: Option<GoalType>,
    pub target: Option<f64>,
}

impl HabitUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.goal_type.is_none() && self.target.is_none()
    }

    /// Apply onto `habit`, validating each provided field.
    pub fn apply_to(&self, habit: &mut Habit) -> Result<(), ValidationError> {
        if let Some(ref name) = self.name {
            habit.name = validate_name(name)?;
        }
        if let Some(goal_type) = self.goal_type {
            habit.goal_type = goal_type;
        }
        if let Some(target) = self.target {
            validate_target(target)?;
            habit.target = target;
        }
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<String, ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    Ok(trimmed.to_string())
}

fn validate_target(target: f64) -> Result<(), ValidationError> {
    if !target.is_finite() || target < 0.0 {
        return Err(ValidationError::InvalidTarget(target));
    }
    Ok(())
}
