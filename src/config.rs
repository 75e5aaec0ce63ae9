//! Layered configuration: defaults, then an optional `dirsig.toml`,
//! then `DIRSIG_*` environment variables. CLI flags override all of it
//! at the call site.

use crate::error::SigError;
use crate::logging::LoggingConfig;
use crate::manifest::store::DEFAULT_MANIFEST_NAME;
use crate::strategy::DirDigestStrategy;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "dirsig.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub build: BuildConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

/// Defaults for the traversal flags.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    pub recurse: bool,
    pub include_hidden: bool,
    pub include_backups: bool,
    pub follow_symlinks: bool,
    pub strategy: DirDigestStrategy,
    pub self_depth: Option<usize>,
}

/// Defaults for manifest output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Manifest file name written inside each directory.
    pub manifest_name: String,
    /// Render timestamps as numeric epoch seconds instead of readable.
    pub epoch_time: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            manifest_name: DEFAULT_MANIFEST_NAME.to_string(),
            epoch_time: false,
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration, optionally from an explicit file. Without
    /// one, `dirsig.toml` in the working directory is used if present.
    pub fn load(explicit: Option<&Path>) -> Result<Config, SigError> {
        let mut builder = config::Config::builder();
        match explicit {
            Some(path) => {
                builder = builder.add_source(config::File::from(path));
            }
            None => {
                builder = builder
                    .add_source(config::File::with_name(DEFAULT_CONFIG_FILE).required(false));
            }
        }
        builder = builder.add_source(
            config::Environment::with_prefix("DIRSIG")
                .separator("__")
                .try_parsing(true),
        );
        let settings = builder.build()?;
        Ok(settings.try_deserialize()?)
    }
}
