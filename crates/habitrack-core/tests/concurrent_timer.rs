//! Two connections driving the same habit timer through one database file.

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration as StdDuration;

use chrono::{Duration, TimeZone, Utc};
use habitrack_core::{
    Clock, CoreError, DatabaseError, GoalType, HabitDb, HabitService, ManualClock, NewHabit,
    TimerResponse, TimerState,
};
use tempfile::TempDir;

const USER: i64 = 3;

struct Shared {
    _dir: TempDir,
    path: std::path::PathBuf,
    clock: Arc<ManualClock>,
}

impl Shared {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("habitrack.db");
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap(),
        ));
        Self {
            _dir: dir,
            path,
            clock,
        }
    }

    fn service(&self) -> HabitService {
        let db = HabitDb::open_path(&self.path).unwrap();
        db.set_busy_timeout(StdDuration::from_secs(5)).unwrap();
        HabitService::new(db, self.clock.clone(), chrono_tz::UTC)
    }
}

fn time_habit(svc: &HabitService) -> i64 {
    svc.create_habit(&NewHabit::new(USER, "Guitar", GoalType::Time).with_target(10.0))
        .unwrap()
        .id
}

#[test]
fn second_pause_from_another_connection_adds_nothing() {
    let shared = Shared::new();
    let a = shared.service();
    let b = shared.service();
    let habit_id = time_habit(&a);

    a.timer_action(USER, habit_id, "start").unwrap();
    shared.clock.advance(Duration::seconds(60));

    a.timer_action(USER, habit_id, "pause").unwrap();
    let again = b.timer_action(USER, habit_id, "pause").unwrap();
    assert_eq!(
        again,
        TimerResponse::Paused {
            elapsed: 60.0,
            remaining: 540.0
        }
    );

    let stored = b.db().get_habit(habit_id).unwrap().unwrap();
    assert_eq!(stored.timer.timer_state, TimerState::Paused);
    assert_eq!(stored.timer.accumulated_time, 60.0);
    // start, pause, and the no-op pause each commit one version.
    assert_eq!(stored.version, 3);
}

#[test]
fn racing_pauses_bank_one_interval() {
    let shared = Shared::new();
    let habit_id = time_habit(&shared.service());
    shared
        .service()
        .timer_action(USER, habit_id, "start")
        .unwrap();
    shared.clock.advance(Duration::seconds(60));

    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = (0..2)
        .map(|_| {
            let svc = shared.service();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                svc.timer_action(USER, habit_id, "pause")
                    .map_err(|e| e.to_string())
            })
        })
        .collect();
    for handle in handles {
        let response = handle.join().unwrap().unwrap();
        assert!(matches!(response, TimerResponse::Paused { elapsed, .. } if elapsed == 60.0));
    }

    let stored = shared.service().db().get_habit(habit_id).unwrap().unwrap();
    assert_eq!(stored.timer.accumulated_time, 60.0);
    assert_eq!(stored.timer.timer_state, TimerState::Paused);
}

#[test]
fn stale_version_write_is_rejected() {
    let shared = Shared::new();
    let a = shared.service();
    let b = shared.service();
    let habit_id = time_habit(&a);

    let mut stale = b.db().get_habit(habit_id).unwrap().unwrap();
    a.timer_action(USER, habit_id, "start").unwrap();

    stale.timer.start(shared.clock.now());
    let err = b.db().update_timer(&stale).unwrap_err();
    assert!(matches!(
        err,
        DatabaseError::Conflict { habit_id: id, expected: 0 } if id == habit_id
    ));
}

#[test]
fn held_write_lock_exhausts_retries_then_clears() {
    let shared = Shared::new();
    let svc = shared.service().with_max_retries(2);
    let habit_id = time_habit(&svc);
    svc.db().set_busy_timeout(StdDuration::ZERO).unwrap();

    let holder = rusqlite::Connection::open(&shared.path).unwrap();
    holder.execute_batch("BEGIN IMMEDIATE TRANSACTION;").unwrap();

    let err = svc.timer_action(USER, habit_id, "start").unwrap_err();
    assert!(matches!(err, CoreError::Database(DatabaseError::Locked)));

    holder.execute_batch("COMMIT;").unwrap();
    let status = svc.timer_action(USER, habit_id, "start").unwrap();
    assert!(matches!(status, TimerResponse::Running { .. }));
    assert_eq!(
        svc.timer_status(USER, habit_id).unwrap().state,
        TimerState::Running
    );
}
