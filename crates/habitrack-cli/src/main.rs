use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use habitrack_core::Config;

mod commands;

#[derive(Parser)]
#[command(name = "habitrack-cli", version, about = "Habitrack CLI")]
struct Cli {
    /// Log filter (trace, debug, info, warn, error); overrides HABITRACK_LOG
    /// and the configured level
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Act as this user id instead of the configured default
    #[arg(long, global = true)]
    user: Option<i64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Habit management
    Habit {
        #[command(subcommand)]
        action: commands::habit::HabitAction,
    },
    /// Record today's value for a habit
    Log {
        habit_id: i64,
        /// Value to record; boolean habits default to done
        value: Option<String>,
    },
    /// Exclude today for a habit
    Exclude { habit_id: i64 },
    /// Drive a habit's timer (start, pause, resume, stop, reset)
    Timer { habit_id: i64, action: String },
    /// Print a habit's timer state as JSON
    TimerStatus { habit_id: i64 },
    /// Per-habit statistics
    Stats,
    /// Store-wide maintenance passes
    Maintenance {
        #[command(subcommand)]
        action: commands::maintenance::MaintenanceAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn init_tracing(cli_level: Option<&str>, config: &Config) {
    let level = cli_level
        .map(str::to_string)
        .or_else(|| std::env::var("HABITRACK_LOG").ok())
        .unwrap_or_else(|| config.logging.level.clone());
    let filter = EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn main() {
    let cli = Cli::parse();
    let config = Config::load_or_default();
    init_tracing(cli.log_level.as_deref(), &config);

    let user_id = cli.user.unwrap_or(config.user.default_id);
    tracing::debug!(user_id, timezone = %config.calendar.timezone, "habitrack-cli starting");
    let result = match cli.command {
        Commands::Habit { action } => commands::habit::run(action, &config, user_id),
        Commands::Log { habit_id, value } => {
            commands::log::log(&config, user_id, habit_id, value.as_deref())
        }
        Commands::Exclude { habit_id } => commands::log::exclude(&config, user_id, habit_id),
        Commands::Timer { habit_id, action } => {
            commands::timer::action(&config, user_id, habit_id, &action)
        }
        Commands::TimerStatus { habit_id } => commands::timer::status(&config, user_id, habit_id),
        Commands::Stats => commands::stats::run(&config, user_id),
        Commands::Maintenance { action } => commands::maintenance::run(action, &config),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
