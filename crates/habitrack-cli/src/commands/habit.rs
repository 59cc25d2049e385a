use clap::Subcommand;
use habitrack_core::{Config, GoalType, HabitUpdate, NewHabit};

use super::{open_service, print_json, CommandResult};

#[derive(Subcommand)]
pub enum HabitAction {
    /// Create a habit
    Create {
        name: String,
        /// boolean, numeric or time
        #[arg(long, default_value = "boolean")]
        goal: String,
        /// Target value (minutes for time habits)
        #[arg(long)]
        target: Option<f64>,
    },
    /// List habits with today's progress and streak
    List,
    /// Show one habit
    Show { id: i64 },
    /// Edit name, goal type or target
    Edit {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        goal: Option<String>,
        #[arg(long)]
        target: Option<f64>,
    },
    /// Delete a habit and all of its logs
    Delete { id: i64 },
}

pub fn run(action: HabitAction, config: &Config, user_id: i64) -> CommandResult {
    let service = open_service(config)?;

    match action {
        HabitAction::Create { name, goal, target } => {
            let mut new = NewHabit::new(user_id, name, goal.parse::<GoalType>()?);
            if let Some(target) = target {
                new = new.with_target(target);
            }
            print_json(&service.create_habit(&new)?)?;
        }
        HabitAction::List => {
            print_json(&service.list_habits(user_id)?)?;
        }
        HabitAction::Show { id } => {
            print_json(&service.habit(user_id, id)?)?;
        }
        HabitAction::Edit {
            id,
            name,
            goal,
            target,
        } => {
            let update = HabitUpdate {
                name,
                goal_type: goal.map(|g| g.parse::<GoalType>()).transpose()?,
                target,
            };
            print_json(&service.update_habit(user_id, id, &update)?)?;
        }
        HabitAction::Delete { id } => {
            service.delete_habit(user_id, id)?;
            println!("{{\"deleted\": {id}}}");
        }
    }
    Ok(())
}
