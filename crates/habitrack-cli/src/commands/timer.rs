use habitrack_core::Config;

use super::{open_service, print_json, CommandResult};

/// Apply a named timer action and print the protocol response.
pub fn action(config: &Config, user_id: i64, habit_id: i64, action: &str) -> CommandResult {
    let service = open_service(config)?;
    print_json(&service.timer_action(user_id, habit_id, action)?)
}

pub fn status(config: &Config, user_id: i64, habit_id: i64) -> CommandResult {
    let service = open_service(config)?;
    print_json(&service.timer_status(user_id, habit_id)?)
}
