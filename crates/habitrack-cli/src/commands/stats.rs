use habitrack_core::Config;

use super::{open_service, print_json, CommandResult};

pub fn run(config: &Config, user_id: i64) -> CommandResult {
    let service = open_service(config)?;
    print_json(&service.statistics(user_id)?)
}
