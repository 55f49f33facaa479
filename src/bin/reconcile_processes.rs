//! One-shot repair for lead databases written before process bookkeeping was
//! serialized: collapses duplicate follow-up processes and refreshes stale ones.
//!
//! Usage: `DATABASE_URL=/path/to/crm.db reconcile_processes`
//! (without `DATABASE_URL` the path comes from `~/.leadflow/config.json`).

use std::process::ExitCode;

use leadflow::config::load_config;
use leadflow::crm::Crm;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Failed to load config: {e}");
            return ExitCode::FAILURE;
        }
    };
    log::info!("Reconciling processes in {}", config.database_path.display());

    let crm = match Crm::open(&config) {
        Ok(crm) => crm,
        Err(e) => {
            log::error!("Failed to open database: {e}");
            return ExitCode::FAILURE;
        }
    };

    match crm.reconcile_processes() {
        Ok(report) => {
            match serde_json::to_string_pretty(&report) {
                Ok(json) => println!("{json}"),
                Err(e) => log::warn!("Failed to serialize report: {e}"),
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("Reconcile failed, nothing was changed: {e}");
            ExitCode::FAILURE
        }
    }
}
