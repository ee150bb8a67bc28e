mod builtins;
mod config;
mod editor;
mod error;
mod exec;
mod history;
mod jobs;
mod parser;
mod path;
mod shell;
mod signals;
mod utils;

use std::env;
use std::process::ExitCode;

use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::config::ShellConfig;
use crate::signals::SignalState;

fn main() -> ExitCode {
    // The shell takes no arguments.
    if env::args().len() > 1 {
        utils::print_usage();
    }

    let config = ShellConfig::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
    debug!(
        search_path = ?config.search_path.dirs(),
        home = ?config.home,
        "starting shell"
    );

    // Install signal handlers.
    let signals = SignalState::new();
    if let Err(err) = signals::install_signal_handlers(&signals) {
        eprintln!("smallsh: unable to install signal handlers: {}", err);
        return ExitCode::FAILURE;
    }

    // Run the main shell loop.
    match shell::run_shell(config, signals) {
        Ok(code) => ExitCode::from(code as u8),
        Err(err) => {
            eprintln!("smallsh: {}", utils::describe(&err));
            ExitCode::FAILURE
        }
    }
}
