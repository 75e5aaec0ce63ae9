//! CLI definitions and command execution.

use crate::builder::{BuildOptions, BuildOutcome, ManifestBuilder};
use crate::config::{Config, ConfigLoader};
use crate::error::SigError;
use crate::manifest::codec::{self, TimeFormat};
use crate::manifest::store::FsStore;
use crate::signer::Sha256Signer;
use crate::strategy::DirDigestStrategy;
use crate::volume::{FixedVolumeId, PlatformVolumeId, VolumeIdentifier};
use clap::Parser;
use std::path::PathBuf;
use tracing::warn;

/// Dirsig CLI - deterministic directory fingerprints
#[derive(Parser)]
#[command(name = "dirsig")]
#[command(about = "Fingerprint a directory (or tree) into a deterministic manifest")]
pub struct Cli {
    /// Directories to fingerprint
    #[arg(default_value = ".")]
    pub paths: Vec<PathBuf>,

    /// Descend into subdirectories
    #[arg(long, short = 'r')]
    pub recursive: bool,

    /// Include hidden (dot) files
    #[arg(long)]
    pub include_hidden: bool,

    /// Include backup files (#f#, .bak, .tmp, Copy of f, ...)
    #[arg(long)]
    pub include_backups: bool,

    /// Include symbolic links as entries
    #[arg(long)]
    pub follow_symlinks: bool,

    /// Subdirectory digest strategy
    #[arg(long = "dirs", value_enum)]
    pub strategy: Option<DirDigestStrategy>,

    /// Levels the `self` strategy applies before degrading to `none`
    #[arg(long)]
    pub self_depth: Option<usize>,

    /// Rebuild even where a fresh manifest exists
    #[arg(long)]
    pub force: bool,

    /// Write the manifest into each directory instead of stdout
    #[arg(long)]
    pub save: bool,

    /// Manifest file name used with --save and for staleness checks
    #[arg(long, short = 'o')]
    pub outfile: Option<String>,

    /// Render timestamps as numeric epoch seconds instead of readable
    #[arg(long)]
    pub epoch_time: bool,

    /// Do not attempt to determine a volume id (record "0")
    #[arg(long)]
    pub no_volume_id: bool,

    /// Configuration file path
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable logging (default: off)
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,
}

impl Cli {
    /// Resolve build options from flags over config-file defaults.
    fn build_options(&self, config: &Config) -> BuildOptions {
        BuildOptions {
            recurse: self.recursive || config.build.recurse,
            follow_symlinks: self.follow_symlinks || config.build.follow_symlinks,
            include_hidden: self.include_hidden || config.build.include_hidden,
            include_backups: self.include_backups || config.build.include_backups,
            strategy: self.strategy.unwrap_or(config.build.strategy),
            force_rebuild: self.force,
            self_depth: self.self_depth.or(config.build.self_depth).unwrap_or(1),
            persist: self.save,
            time_format: if self.epoch_time || config.output.epoch_time {
                TimeFormat::Epoch
            } else {
                TimeFormat::Readable
            },
        }
    }
}

/// Execute the command. Returns the text destined for stdout.
pub fn run(cli: &Cli) -> Result<String, SigError> {
    let config = ConfigLoader::load(cli.config.as_deref())?;
    let options = cli.build_options(&config);

    let manifest_name = cli
        .outfile
        .clone()
        .unwrap_or_else(|| config.output.manifest_name.clone());
    let store = FsStore::new(manifest_name);
    let signer = Sha256Signer::new();
    let platform_volume = PlatformVolumeId;
    let disabled_volume = FixedVolumeId::disabled();
    let volume: &dyn VolumeIdentifier = if cli.no_volume_id {
        &disabled_volume
    } else {
        &platform_volume
    };

    let builder = ManifestBuilder::new(options, &signer, &store, volume);

    let mut output = String::new();
    for path in &cli.paths {
        let outcome = builder.build(path)?;
        report_diagnostics(&outcome);
        if !cli.save {
            output.push_str(&codec::encode(&outcome.manifest, options.time_format));
            output.push('\n');
        }
    }
    Ok(output)
}

fn report_diagnostics(outcome: &BuildOutcome) {
    for diag in &outcome.diagnostics {
        warn!(path = %diag.path.display(), "{}", diag.message);
        eprintln!("**** {}: {}", diag.path.display(), diag.message);
    }
}
