mod action;
mod engine;

pub use action::{apply_action, TimerAction, TimerRequest, TimerResponse, TimerStatus};
pub use engine::{HabitTimer, TimerState};
