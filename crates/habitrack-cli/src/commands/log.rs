use habitrack_core::Config;

use super::{open_service, print_json, CommandResult};

pub fn log(config: &Config, user_id: i64, habit_id: i64, value: Option<&str>) -> CommandResult {
    let service = open_service(config)?;
    print_json(&service.log_value(user_id, habit_id, value)?)
}

pub fn exclude(config: &Config, user_id: i64, habit_id: i64) -> CommandResult {
    let service = open_service(config)?;
    print_json(&service.exclude_today(user_id, habit_id)?)
}
