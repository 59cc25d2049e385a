use clap::Subcommand;
use habitrack_core::maintenance::{purge_future_logs, repair_duplicates};
use habitrack_core::{Config, LogReconciler};

use super::{open_service, print_json, CommandResult};

#[derive(Subcommand)]
pub enum MaintenanceAction {
    /// Re-bucket log dates from one timezone into another
    Reconcile {
        /// Zone the stored dates were computed in [default: reconcile.source_timezone]
        #[arg(long)]
        source: Option<String>,
        /// Zone the dates should be bucketed in [default: reconcile.target_timezone]
        #[arg(long)]
        target: Option<String>,
        /// Write changes; without this the pass is a dry run
        #[arg(long)]
        apply: bool,
    },
    /// Find (and with --apply, delete) duplicate logs for the same habit and day
    Duplicates {
        #[arg(long)]
        apply: bool,
    },
    /// Find (and with --apply, delete) logs dated after today
    PurgeFuture {
        #[arg(long)]
        apply: bool,
    },
}

pub fn run(action: MaintenanceAction, config: &Config) -> CommandResult {
    let service = open_service(config)?;

    match action {
        MaintenanceAction::Reconcile {
            source,
            target,
            apply,
        } => {
            let source = source.unwrap_or_else(|| config.reconcile.source_timezone.clone());
            let target = target.unwrap_or_else(|| config.reconcile.target_timezone.clone());
            let report = LogReconciler::from_names(&source, &target)?.run(service.db(), apply)?;
            eprintln!("{}", report.message());
            print_json(&report)?;
        }
        MaintenanceAction::Duplicates { apply } => {
            let report = repair_duplicates(service.db(), apply)?;
            eprintln!("{}", report.message());
            print_json(&report)?;
        }
        MaintenanceAction::PurgeFuture { apply } => {
            let report = purge_future_logs(service.db(), service.today(), apply)?;
            eprintln!("{}", report.message());
            print_json(&report)?;
        }
    }
    Ok(())
}
