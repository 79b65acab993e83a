//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `welfare_core` linkage.
//! - Given a config path, open the data directory and print the active
//!   backend and dashboard totals.

use std::error::Error;
use std::process::ExitCode;
use std::sync::Arc;
use welfare_core::{init_logging, open_db, AppConfig, AppState, SystemClock};

fn main() -> ExitCode {
    println!("welfare_core ping={}", welfare_core::ping());
    println!("welfare_core version={}", welfare_core::core_version());

    let Some(config_path) = std::env::args().nth(1) else {
        return ExitCode::SUCCESS;
    };
    match run(&config_path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("welfare_cli error={err}");
            ExitCode::FAILURE
        }
    }
}

fn run(config_path: &str) -> Result<(), Box<dyn Error>> {
    let mut config = AppConfig::load(config_path)?;
    std::fs::create_dir_all(&config.data_dir)?;
    config.data_dir = std::fs::canonicalize(&config.data_dir)?;
    init_logging(config.effective_log_level(), config.log_dir())?;

    let conn = open_db(config.db_path())?;
    let state = AppState::open(&conn, config, None, None, Arc::new(SystemClock))?;
    let stats = state.dashboard_stats();

    println!("welfare_core {}", state.backend_summary());
    println!(
        "welfare_core families={} active={} members={} users={}",
        stats.total_families, stats.active_families, stats.total_members, stats.total_users
    );
    Ok(())
}
