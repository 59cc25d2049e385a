//! SQLite-based habit and habit-log storage.
//!
//! Provides persistent storage for:
//! - Habits, including their timer fields
//! - Daily habit logs, one per habit per date
//! - Key-value store for store metadata
//!
//! Methods here are single statements or small statement groups and never
//! open transactions themselves; callers that need atomicity wrap them in
//! [`HabitDb::immediate`].

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};

use super::data_dir;
use super::migrations;
use crate::error::{CoreError, DatabaseError};
use crate::habit::{GoalType, Habit, HabitLog, NewHabit};
use crate::timer::{HabitTimer, TimerState};

const DATE_FORMAT: &str = "%Y-%m-%d";

const HABIT_COLUMNS: &str = "id, user_id, name, goal_type, target, created_at,
     timer_state, timer_started_at, accumulated_time, version";

const LOG_COLUMNS: &str = "id, habit_id, date, value, excluded";

fn conversion_error(col: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(col, Type::Text, message.into())
}

fn parse_date(col: usize, raw: &str) -> Result<NaiveDate, rusqlite::Error> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|e| conversion_error(col, format!("bad date '{raw}': {e}")))
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_instant(col: usize, raw: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(col, format!("bad timestamp '{raw}': {e}")))
}

fn row_to_habit(row: &rusqlite::Row) -> Result<Habit, rusqlite::Error> {
    let goal_type: String = row.get(3)?;
    let created_at: String = row.get(5)?;
    let timer_state: String = row.get(6)?;
    let timer_started_at: Option<String> = row.get(7)?;

    Ok(Habit {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        goal_type: goal_type
            .parse::<GoalType>()
            .map_err(|e| conversion_error(3, e.to_string()))?,
        target: row.get(4)?,
        created_at: parse_instant(5, &created_at)?,
        timer: HabitTimer {
            timer_state: TimerState::parse(&timer_state)
                .ok_or_else(|| conversion_error(6, format!("bad timer state '{timer_state}'")))?,
            timer_started_at: timer_started_at
                .as_deref()
                .map(|raw| parse_instant(7, raw))
                .transpose()?,
            accumulated_time: row.get(8)?,
        },
        version: row.get(9)?,
    })
}

fn row_to_log(row: &rusqlite::Row) -> Result<HabitLog, rusqlite::Error> {
    let date: String = row.get(2)?;
    Ok(HabitLog {
        id: row.get(0)?,
        habit_id: row.get(1)?,
        date: parse_date(2, &date)?,
        value: row.get(3)?,
        excluded: row.get(4)?,
    })
}

/// SQLite record store for habits and their logs.
pub struct HabitDb {
    conn: Connection,
}

impl HabitDb {
    /// Open the database at `<data_dir>/habitrack.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, CoreError> {
        let path = data_dir()?.join("habitrack.db");
        Self::open_path(&path)
    }

    /// Open (or create) the database file at `path`.
    pub fn open_path(path: &Path) -> Result<Self, CoreError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self, CoreError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    /// How long a statement waits on another connection's lock before
    /// failing with [`DatabaseError::Locked`].
    pub fn set_busy_timeout(&self, timeout: Duration) -> Result<(), CoreError> {
        self.conn.busy_timeout(timeout)?;
        Ok(())
    }

    fn from_connection(conn: Connection) -> Result<Self, CoreError> {
        let db = Self { conn };
        db.migrate()
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS habits (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id    INTEGER NOT NULL,
                name       TEXT NOT NULL,
                goal_type  TEXT NOT NULL DEFAULT 'boolean',
                target     REAL NOT NULL DEFAULT 1.0,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS habit_logs (
                id       INTEGER PRIMARY KEY AUTOINCREMENT,
                habit_id INTEGER NOT NULL REFERENCES habits(id) ON DELETE CASCADE,
                date     TEXT NOT NULL,
                value    REAL NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_habits_user ON habits(user_id);
            CREATE INDEX IF NOT EXISTS idx_habit_logs_date ON habit_logs(date);",
        )?;

        migrations::migrate(&self.conn)
    }

    /// Run `f` inside a `BEGIN IMMEDIATE` transaction.
    ///
    /// The write lock is taken up front, so no other writer can interleave
    /// between the reads and writes `f` performs. Any error, including a
    /// failed `COMMIT`, rolls the whole transaction back.
    pub fn immediate<T, E>(&self, f: impl FnOnce(&Self) -> Result<T, E>) -> Result<T, E>
    where
        E: From<rusqlite::Error>,
    {
        self.conn.execute_batch("BEGIN IMMEDIATE TRANSACTION;")?;
        let result = f(self).and_then(|value| {
            self.conn.execute_batch("COMMIT;")?;
            Ok(value)
        });
        // A failed COMMIT can leave the transaction open; never hand the
        // connection back mid-transaction.
        if result.is_err() && !self.conn.is_autocommit() {
            let _ = self.conn.execute_batch("ROLLBACK;");
        }
        result
    }

    // === Habit CRUD ===

    /// Insert a habit. Fields must already be validated.
    pub fn create_habit(
        &self,
        user_id: i64,
        name: &str,
        goal_type: GoalType,
        target: f64,
        created_at: DateTime<Utc>,
    ) -> Result<Habit, rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO habits (user_id, name, goal_type, target, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![user_id, name, goal_type.as_str(), target, created_at.to_rfc3339()],
        )?;
        Ok(Habit {
            id: self.conn.last_insert_rowid(),
            user_id,
            name: name.to_string(),
            goal_type,
            target,
            created_at,
            timer: HabitTimer::default(),
            version: 0,
        })
    }

    /// Validate and insert a habit.
    pub fn insert_new_habit(
        &self,
        new: &NewHabit,
        created_at: DateTime<Utc>,
    ) -> Result<Habit, CoreError> {
        let (name, target) = new.validated()?;
        Ok(self.create_habit(new.user_id, &name, new.goal_type, target, created_at)?)
    }

    pub fn get_habit(&self, id: i64) -> Result<Option<Habit>, rusqlite::Error> {
        self.conn
            .query_row(
                &format!("SELECT {HABIT_COLUMNS} FROM habits WHERE id = ?1"),
                params![id],
                row_to_habit,
            )
            .optional()
    }

    pub fn list_habits(&self, user_id: i64) -> Result<Vec<Habit>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {HABIT_COLUMNS} FROM habits WHERE user_id = ?1 ORDER BY id"
        ))?;
        let rows = stmt.query_map(params![user_id], row_to_habit)?;
        rows.collect()
    }

    pub fn list_all_habits(&self) -> Result<Vec<Habit>, rusqlite::Error> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {HABIT_COLUMNS} FROM habits ORDER BY id"))?;
        let rows = stmt.query_map([], row_to_habit)?;
        rows.collect()
    }

    /// Persist name, goal type and target.
    pub fn update_habit(&self, habit: &Habit) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "UPDATE habits SET name = ?1, goal_type = ?2, target = ?3 WHERE id = ?4",
            params![habit.name, habit.goal_type.as_str(), habit.target, habit.id],
        )?;
        Ok(())
    }

    /// Delete a habit and all of its logs. Returns false if it did not exist.
    pub fn delete_habit(&self, id: i64) -> Result<bool, rusqlite::Error> {
        self.conn
            .execute("DELETE FROM habit_logs WHERE habit_id = ?1", params![id])?;
        let deleted = self
            .conn
            .execute("DELETE FROM habits WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    /// Write the timer fields if the stored version is still `habit.version`.
    ///
    /// Returns the new version.
    ///
    /// # Errors
    /// [`DatabaseError::Conflict`] when another writer got there first.
    pub fn update_timer(&self, habit: &Habit) -> Result<i64, DatabaseError> {
        let timer = &habit.timer;
        let updated = self.conn.execute(
            "UPDATE habits
             SET timer_state = ?1, timer_started_at = ?2, accumulated_time = ?3,
                 version = version + 1
             WHERE id = ?4 AND version = ?5",
            params![
                timer.timer_state.as_str(),
                timer.timer_started_at.map(|t| t.to_rfc3339()),
                timer.accumulated_time,
                habit.id,
                habit.version,
            ],
        )?;
        if updated == 0 {
            return Err(DatabaseError::Conflict {
                habit_id: habit.id,
                expected: habit.version,
            });
        }
        Ok(habit.version + 1)
    }

    // === Log access ===

    pub fn get_log(&self, habit_id: i64, date: NaiveDate) -> Result<Option<HabitLog>, rusqlite::Error> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {LOG_COLUMNS} FROM habit_logs
                     WHERE habit_id = ?1 AND date = ?2 ORDER BY id DESC LIMIT 1"
                ),
                params![habit_id, format_date(date)],
                row_to_log,
            )
            .optional()
    }

    /// All logs of one habit, oldest date first.
    pub fn logs_for_habit(&self, habit_id: i64) -> Result<Vec<HabitLog>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {LOG_COLUMNS} FROM habit_logs WHERE habit_id = ?1 ORDER BY date, id"
        ))?;
        let rows = stmt.query_map(params![habit_id], row_to_log)?;
        rows.collect()
    }

    /// Logs of one habit with `from <= date <= to`, oldest first.
    pub fn logs_in_range(
        &self,
        habit_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<HabitLog>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {LOG_COLUMNS} FROM habit_logs
             WHERE habit_id = ?1 AND date >= ?2 AND date <= ?3
             ORDER BY date, id"
        ))?;
        let rows = stmt.query_map(
            params![habit_id, format_date(from), format_date(to)],
            row_to_log,
        )?;
        rows.collect()
    }

    /// Every log in the store, ascending id.
    pub fn all_logs(&self) -> Result<Vec<HabitLog>, rusqlite::Error> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {LOG_COLUMNS} FROM habit_logs ORDER BY id"))?;
        let rows = stmt.query_map([], row_to_log)?;
        rows.collect()
    }

    /// Logs dated strictly after `date`, ascending id.
    pub fn logs_after(&self, date: NaiveDate) -> Result<Vec<HabitLog>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {LOG_COLUMNS} FROM habit_logs WHERE date > ?1 ORDER BY id"
        ))?;
        let rows = stmt.query_map(params![format_date(date)], row_to_log)?;
        rows.collect()
    }

    /// Create or overwrite the log for `(habit_id, date)`.
    ///
    /// Never blind-inserts: an existing row for the day is updated in place.
    pub fn upsert_log(
        &self,
        habit_id: i64,
        date: NaiveDate,
        value: f64,
        excluded: bool,
    ) -> Result<HabitLog, rusqlite::Error> {
        if let Some(existing) = self.get_log(habit_id, date)? {
            self.conn.execute(
                "UPDATE habit_logs SET value = ?1, excluded = ?2 WHERE id = ?3",
                params![value, excluded, existing.id],
            )?;
            return Ok(HabitLog {
                value,
                excluded,
                ..existing
            });
        }

        self.conn.execute(
            "INSERT INTO habit_logs (habit_id, date, value, excluded) VALUES (?1, ?2, ?3, ?4)",
            params![habit_id, format_date(date), value, excluded],
        )?;
        Ok(HabitLog {
            id: self.conn.last_insert_rowid(),
            habit_id,
            date,
            value,
            excluded,
        })
    }

    pub fn set_log_date(&self, id: i64, date: NaiveDate) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "UPDATE habit_logs SET date = ?1 WHERE id = ?2",
            params![format_date(date), id],
        )?;
        Ok(())
    }

    pub fn set_log_value(&self, id: i64, value: f64, excluded: bool) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "UPDATE habit_logs SET value = ?1, excluded = ?2 WHERE id = ?3",
            params![value, excluded, id],
        )?;
        Ok(())
    }

    pub fn delete_log(&self, id: i64) -> Result<bool, rusqlite::Error> {
        let deleted = self
            .conn
            .execute("DELETE FROM habit_logs WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    // === Metadata ===

    pub fn schema_version(&self) -> i32 {
        migrations::get_schema_version(&self.conn)
    }

    /// Re-run pending migrations (e.g. the unique index after a duplicate repair).
    pub fn remigrate(&self) -> Result<(), CoreError> {
        migrations::migrate(&self.conn)
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(())
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, rusqlite::Error> {
        self.conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn created() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn seeded() -> (HabitDb, Habit) {
        let db = HabitDb::open_memory().unwrap();
        let habit = db
            .create_habit(1, "Stretch", GoalType::Time, 10.0, created())
            .unwrap();
        (db, habit)
    }

    #[test]
    fn create_and_get_habit() {
        let (db, habit) = seeded();
        let loaded = db.get_habit(habit.id).unwrap().unwrap();
        assert_eq!(loaded, habit);
        assert!(db.get_habit(999).unwrap().is_none());
    }

    #[test]
    fn list_habits_filters_by_owner() {
        let (db, _) = seeded();
        db.create_habit(2, "Other", GoalType::Boolean, 1.0, created())
            .unwrap();
        assert_eq!(db.list_habits(1).unwrap().len(), 1);
        assert_eq!(db.list_all_habits().unwrap().len(), 2);
    }

    #[test]
    fn upsert_keeps_one_log_per_day() {
        let (db, habit) = seeded();
        let first = db.upsert_log(habit.id, day(5), 3.0, false).unwrap();
        let second = db.upsert_log(habit.id, day(5), 12.0, true).unwrap();
        assert_eq!(first.id, second.id);

        let logs = db.logs_for_habit(habit.id).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].value, 12.0);
        assert!(logs[0].excluded);
    }

    #[test]
    fn range_query_is_inclusive() {
        let (db, habit) = seeded();
        for d in 1..=6 {
            db.upsert_log(habit.id, day(d), d as f64, false).unwrap();
        }
        let logs = db.logs_in_range(habit.id, day(2), day(4)).unwrap();
        let dates: Vec<_> = logs.iter().map(|l| l.date).collect();
        assert_eq!(dates, vec![day(2), day(3), day(4)]);
    }

    #[test]
    fn delete_habit_cascades_logs() {
        let (db, habit) = seeded();
        db.upsert_log(habit.id, day(1), 1.0, false).unwrap();
        assert!(db.delete_habit(habit.id).unwrap());
        assert!(db.all_logs().unwrap().is_empty());
        assert!(!db.delete_habit(habit.id).unwrap());
    }

    #[test]
    fn timer_update_uses_version_cas() {
        let (db, mut habit) = seeded();
        habit.timer.start(created());
        let v1 = db.update_timer(&habit).unwrap();
        assert_eq!(v1, 1);

        // Stale writer still holding version 0.
        let err = db.update_timer(&habit).unwrap_err();
        assert!(matches!(err, DatabaseError::Conflict { expected: 0, .. }));

        let loaded = db.get_habit(habit.id).unwrap().unwrap();
        assert_eq!(loaded.timer.timer_state, TimerState::Running);
        assert_eq!(loaded.timer.timer_started_at, Some(created()));
        assert_eq!(loaded.version, 1);
    }

    #[test]
    fn immediate_rolls_back_on_error() {
        let (db, habit) = seeded();
        let result: Result<(), CoreError> = db.immediate(|db| {
            db.upsert_log(habit.id, day(3), 1.0, false)?;
            Err(CoreError::InvalidAction("boom".into()))
        });
        assert!(result.is_err());
        assert!(db.all_logs().unwrap().is_empty());
    }

    #[test]
    fn kv_store() {
        let db = HabitDb::open_memory().unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
        db.kv_set("test", "hello").unwrap();
        assert_eq!(db.kv_get("test").unwrap().unwrap(), "hello");
    }

    #[test]
    fn file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("habits.db");
        {
            let db = HabitDb::open_path(&path).unwrap();
            let habit = db
                .create_habit(1, "Journal", GoalType::Boolean, 1.0, created())
                .unwrap();
            db.upsert_log(habit.id, day(2), 1.0, false).unwrap();
        }
        let db = HabitDb::open_path(&path).unwrap();
        assert_eq!(db.schema_version(), 3);
        assert_eq!(db.all_logs().unwrap().len(), 1);
    }

    #[test]
    fn failed_commit_rolls_back_and_frees_connection() {
        let (db, habit) = seeded();
        // With deferred foreign keys the dangling log is only rejected at COMMIT.
        let result: Result<(), CoreError> = db.immediate(|db| {
            db.conn.execute_batch("PRAGMA defer_foreign_keys = ON;")?;
            db.upsert_log(999, day(4), 1.0, false)?;
            Ok(())
        });
        assert!(result.is_err());
        assert!(db.conn.is_autocommit());
        assert!(db.all_logs().unwrap().is_empty());

        let next: Result<HabitLog, CoreError> =
            db.immediate(|db| Ok(db.upsert_log(habit.id, day(4), 1.0, false)?));
        assert_eq!(next.unwrap().habit_id, habit.id);
    }
}
