use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};

use muxplay::app::cli::Args;
use muxplay::app::commands;
use muxplay::app::config::AppConfig;
use muxplay::app::logging;

#[tokio::main]
async fn main() -> ExitCode {
    human_panic::setup_panic!();

    let args = Args::parse();

    // 1. State directory and documents 📁
    let config = match AppConfig::from_home() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{:#}", e);
            return ExitCode::FAILURE;
        }
    };
    let settings = match config.ensure() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{:#}", e);
            return ExitCode::FAILURE;
        }
    };

    // 2. Logging (file only)
    let _log_guard = match logging::init(&config) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("{:#}", e);
            None
        }
    };
    info!("muxplay v{} {:?}", env!("CARGO_PKG_VERSION"), args.command);

    // 3. Run the command
    match commands::dispatch(args, &config, &settings).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
