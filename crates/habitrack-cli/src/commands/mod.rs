pub mod config;
pub mod habit;
pub mod log;
pub mod maintenance;
pub mod stats;
pub mod timer;

use habitrack_core::{Config, HabitDb, HabitService};
use serde::Serialize;

pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Open the store and build a service over it.
pub fn open_service(config: &Config) -> Result<HabitService, Box<dyn std::error::Error>> {
    let db = HabitDb::open()?;
    Ok(HabitService::from_config(db, config)?)
}

pub fn print_json<T: Serialize>(value: &T) -> CommandResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
