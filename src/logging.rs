//! Structured logging via `tracing`.
//!
//! Logs always go to stderr: stdout is reserved for manifest output.
//! Level resolution order: `DIRSIG_LOG` environment variable, then the
//! configured level, then "info".

use crate::error::SigError;
use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Environment variable consulted for filter directives.
pub const LOG_ENV: &str = "DIRSIG_LOG";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error, off.
    #[serde(default = "default_level")]
    pub level: String,

    /// Output format: text or json.
    #[serde(default = "default_format")]
    pub format: String,

    /// Colored output (text format only).
    #[serde(default = "default_true")]
    pub color: bool,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "text".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: default_format(),
            color: default_true(),
        }
    }
}

/// Install the global subscriber. Safe to call once per process;
/// later calls fail quietly so tests can initialize repeatedly.
pub fn init_logging(config: &LoggingConfig) -> Result<(), SigError> {
    let filter = build_filter(config)?;

    let result = match config.format.as_str() {
        "json" => Registry::default()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        "text" => Registry::default()
            .with(filter)
            .with(
                fmt::layer()
                    .with_ansi(config.color)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        other => {
            return Err(SigError::Config(format!(
                "unknown log format {other:?} (expected text or json)"
            )))
        }
    };

    // A second init in-process keeps the first subscriber.
    let _ = result;
    Ok(())
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter, SigError> {
    if let Ok(directives) = std::env::var(LOG_ENV) {
        return EnvFilter::try_new(directives)
            .map_err(|e| SigError::Config(format!("invalid {LOG_ENV}: {e}")));
    }
    EnvFilter::try_new(&config.level)
        .map_err(|e| SigError::Config(format!("invalid log level {:?}: {e}", config.level)))
}
