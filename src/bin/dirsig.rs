//! Dirsig binary entry point.

use clap::Parser;
use dirsig::cli::{run, Cli};
use dirsig::logging::{init_logging, LoggingConfig};
use std::process;
use tracing::error;

fn main() {
    let cli = Cli::parse();

    let logging_config = build_logging_config(&cli);
    if let Err(e) = init_logging(&logging_config) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    match run(&cli) {
        Ok(output) => {
            if !output.is_empty() {
                print!("{}", output);
            }
        }
        Err(e) => {
            error!("Build failed: {}", e);
            eprintln!("dirsig: {}", e);
            process::exit(e.exit_code());
        }
    }
}

/// Logging is off unless --verbose; flags override config defaults.
fn build_logging_config(cli: &Cli) -> LoggingConfig {
    let mut config = LoggingConfig::default();
    if !cli.verbose {
        config.level = "off".to_string();
    }
    if let Some(ref level) = cli.log_level {
        config.level = level.clone();
    }
    if let Some(ref format) = cli.log_format {
        config.format = format.clone();
    }
    config
}
