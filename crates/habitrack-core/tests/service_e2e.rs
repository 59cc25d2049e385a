//! End-to-end tests through `HabitService` with a manually driven clock.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use habitrack_core::{
    GoalType, HabitDb, HabitService, LogOutcome, ManualClock, NewHabit, TimerResponse, TimerState,
};

const USER: i64 = 7;

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 10, 18, 0, 0).unwrap()
}

fn setup() -> (HabitService, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(start()));
    let service = HabitService::new(
        HabitDb::open_memory().unwrap(),
        clock.clone(),
        chrono_tz::UTC,
    );
    (service, clock)
}

#[test]
fn streak_with_exclusion_and_gap() {
    let (svc, clock) = setup();
    let habit = svc
        .create_habit(&NewHabit::new(USER, "Meditate", GoalType::Boolean))
        .unwrap();

    // Days -3..0, one log per day.
    let mut day_minus_three = None;
    for day in 0..4 {
        if let LogOutcome::Recorded { log } = svc.log_value(USER, habit.id, None).unwrap() {
            if day == 0 {
                day_minus_three = Some(log.id);
            }
        }
        if day < 3 {
            clock.advance(Duration::days(1));
        }
    }
    assert_eq!(svc.streak(USER, habit.id).unwrap(), 4);

    // Exclude day -1. Excluded days are skipped without being counted, so 4 drops to 3.
    clock.advance(Duration::days(-1));
    svc.exclude_today(USER, habit.id).unwrap();
    clock.advance(Duration::days(1));
    assert_eq!(svc.streak(USER, habit.id).unwrap(), 3);

    // Remove day -3: today, -1 (skipped), -2.
    svc.db().delete_log(day_minus_three.unwrap()).unwrap();
    assert_eq!(svc.streak(USER, habit.id).unwrap(), 2);
}

#[test]
fn unfinished_today_does_not_break_streak() {
    let (svc, clock) = setup();
    let habit = svc
        .create_habit(&NewHabit::new(USER, "Pushups", GoalType::Numeric).with_target(20.0))
        .unwrap();
    for _ in 0..3 {
        svc.log_value(USER, habit.id, Some("25")).unwrap();
        clock.advance(Duration::days(1));
    }
    assert_eq!(svc.streak(USER, habit.id).unwrap(), 3);

    svc.log_value(USER, habit.id, Some("5")).unwrap();
    assert_eq!(svc.streak(USER, habit.id).unwrap(), 3);
    assert!(!svc.list_habits(USER).unwrap()[0].completed_today);
}

#[test]
fn timer_pause_resume_stop_accumulates() {
    let (svc, clock) = setup();
    let habit = svc
        .create_habit(&NewHabit::new(USER, "Piano", GoalType::Time).with_target(1.0))
        .unwrap();

    svc.timer_action(USER, habit.id, "start").unwrap();
    clock.advance(Duration::seconds(90));
    let paused = svc.timer_action(USER, habit.id, "pause").unwrap();
    assert_eq!(
        paused,
        TimerResponse::Paused {
            elapsed: 90.0,
            remaining: 0.0
        }
    );

    // Paused time does not advance.
    clock.advance(Duration::minutes(10));
    let status = svc.timer_status(USER, habit.id).unwrap();
    assert_eq!(status.state, TimerState::Paused);
    assert_eq!(status.elapsed, 90.0);
    assert!(status.is_complete);

    svc.timer_action(USER, habit.id, "resume").unwrap();
    clock.advance(Duration::seconds(30));
    let stopped = svc.timer_action(USER, habit.id, "stop").unwrap();
    assert_eq!(stopped.logged_minutes(), Some(2.0));

    let overview = svc.list_habits(USER).unwrap();
    assert_eq!(overview[0].today_log.as_ref().unwrap().value, 2.0);
    assert!(overview[0].completed_today);

    let status = svc.timer_status(USER, habit.id).unwrap();
    assert_eq!(status.state, TimerState::Stopped);
    assert_eq!(status.elapsed, 0.0);
}

#[test]
fn reset_from_running_writes_no_log() {
    let (svc, clock) = setup();
    let habit = svc
        .create_habit(&NewHabit::new(USER, "Piano", GoalType::Time).with_target(15.0))
        .unwrap();
    svc.timer_action(USER, habit.id, "start").unwrap();
    clock.advance(Duration::minutes(4));

    let reset = svc.timer_action(USER, habit.id, "reset").unwrap();
    assert_eq!(reset, TimerResponse::Reset);
    assert!(svc.db().all_logs().unwrap().is_empty());

    let status = svc.timer_status(USER, habit.id).unwrap();
    assert_eq!(status.state, TimerState::Stopped);
    assert_eq!(status.elapsed, 0.0);
    assert_eq!(status.remaining, 900.0);
}

#[test]
fn statistics_over_a_week() {
    let (svc, clock) = setup();
    let habit = svc
        .create_habit(&NewHabit::new(USER, "Walk", GoalType::Boolean))
        .unwrap();
    // Log on 4 of 7 days; one of them "not done".
    for day in 0..7 {
        match day {
            1 | 3 | 6 => svc.log_value(USER, habit.id, None).map(|_| ()).unwrap(),
            4 => svc.log_value(USER, habit.id, Some("0")).map(|_| ()).unwrap(),
            _ => {}
        }
        if day < 6 {
            clock.advance(Duration::days(1));
        }
    }

    let stats = svc.statistics(USER).unwrap();
    assert_eq!(stats.len(), 1);
    let s = &stats[0];
    assert_eq!(s.days_since_creation, 7);
    assert_eq!(s.total_logs, 4);
    assert_eq!(s.completed, 3);
    assert_eq!(s.success_rate, 75.0);
    assert_eq!(s.logging_rate, 57.1);
    assert_eq!(s.current_streak, 1);
}

#[test]
fn calendar_timezone_decides_today() {
    // 02:00 UTC is still the previous evening in Asuncion.
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 5, 11, 2, 0, 0).unwrap(),
    ));
    let svc = HabitService::new(
        HabitDb::open_memory().unwrap(),
        clock,
        chrono_tz::America::Asuncion,
    );
    let habit = svc
        .create_habit(&NewHabit::new(USER, "Read", GoalType::Boolean))
        .unwrap();
    let LogOutcome::Recorded { log } = svc.log_value(USER, habit.id, None).unwrap() else {
        panic!("expected a recorded log");
    };
    assert_eq!(log.date.to_string(), "2024-05-10");
}
