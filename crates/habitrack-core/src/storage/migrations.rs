//! Database schema migrations for habitrack.
//!
//! Migrations are versioned and applied automatically when opening the database.
//! The `schema_version` table tracks the current migration version.
//!
//! - v1: baseline `habits` / `habit_logs` tables (created by `HabitDb::migrate`)
//! - v2: day exclusion, timer fields and the optimistic-lock version column
//! - v3: unique `(habit_id, date)` index on logs

use rusqlite::{Connection, Result as SqliteResult};
use tracing::{info, warn};

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 3;

/// Apply all pending migrations to bring the database to the current schema version.
///
/// v3 is deferred (not an error) while the log table still holds duplicate
/// `(habit_id, date)` rows; it is retried on every open.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn);

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }
    if current_version < 3 {
        migrate_v3(conn)?;
    }

    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Get the current schema version from the database.
///
/// Returns 0 if no version is set (initial database).
pub fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .unwrap_or_else(|e| {
        if !matches!(e, rusqlite::Error::QueryReturnedNoRows) {
            warn!(error = %e, "failed to read schema_version");
        }
        0
    })
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Migration v1: baseline. Tables already exist.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    set_schema_version(conn, 1)
}

/// Migration v2: exclusion flag, timer fields and version counter.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "ALTER TABLE habit_logs ADD COLUMN excluded INTEGER NOT NULL DEFAULT 0;
         ALTER TABLE habits ADD COLUMN timer_state TEXT NOT NULL DEFAULT 'stopped';
         ALTER TABLE habits ADD COLUMN timer_started_at TEXT;
         ALTER TABLE habits ADD COLUMN accumulated_time REAL NOT NULL DEFAULT 0;
         ALTER TABLE habits ADD COLUMN version INTEGER NOT NULL DEFAULT 0;",
    )?;

    set_schema_version(&tx, 2)?;
    tx.commit()
}

/// Migration v3: one log per habit per day.
fn migrate_v3(conn: &Connection) -> SqliteResult<()> {
    let duplicate_dates = count_duplicate_dates(conn)?;
    if duplicate_dates > 0 {
        warn!(
            duplicate_dates,
            "habit_logs contains duplicate (habit, date) rows; unique index deferred \
             until duplicates are repaired (maintenance duplicates --apply)"
        );
        return Ok(());
    }

    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_habit_logs_habit_date
         ON habit_logs(habit_id, date);",
    )?;
    set_schema_version(&tx, 3)?;
    tx.commit()?;
    info!("schema migrated to v3");
    Ok(())
}

/// Number of `(habit_id, date)` pairs with more than one log.
pub fn count_duplicate_dates(conn: &Connection) -> SqliteResult<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM (
             SELECT 1 FROM habit_logs GROUP BY habit_id, date HAVING COUNT(*) > 1
         )",
        [],
        |row| row.get(0),
    )
}
