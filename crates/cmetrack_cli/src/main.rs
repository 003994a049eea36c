//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `cmetrack_core` linkage against a real database file.
//! - Print the core version and a JSON dashboard snapshot.

use chrono::Local;
use cmetrack_core::{init_logging, open_pool, CoreConfig, DashboardRequest, DashboardService};
use log::error;
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_probe module=cli status=error error={err}");
            eprintln!("cmetrack: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = CoreConfig::from_env()?;
    if let Some(log_dir) = config.log_dir.as_deref() {
        init_logging(&config.log_level, log_dir)?;
    }

    println!("cmetrack_core ping={}", cmetrack_core::ping());
    println!("cmetrack_core version={}", cmetrack_core::core_version());

    let pool = open_pool(&config.pool_settings())?;
    let conn = pool.get()?;
    let request = DashboardRequest::new(Local::now().date_naive());
    let snapshot = DashboardService::new(&conn).snapshot(&request)?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}
