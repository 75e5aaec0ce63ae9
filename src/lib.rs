//! Dirsig: deterministic directory fingerprinting
//!
//! Builds a manifest for a directory (optionally a whole subtree)
//! recording each eligible entry's mtime, size, inode, name, and a
//! SHA-256 content digest, and decides on later runs whether an
//! existing manifest is still fresh or must be recomputed bottom-up.

pub mod builder;
pub mod classify;
pub mod cli;
pub mod config;
pub mod error;
pub mod fsmeta;
pub mod logging;
pub mod manifest;
pub mod pathnorm;
pub mod signer;
pub mod staleness;
pub mod strategy;
pub mod volume;

pub use builder::{BuildOptions, BuildOutcome, Diagnostic, ManifestBuilder};
pub use classify::{Classifier, Decision, EntryFacts};
pub use error::SigError;
pub use manifest::codec::TimeFormat;
pub use manifest::store::{FsStore, ManifestStore};
pub use manifest::{DirectoryManifest, EntryKind, ManifestEntry, SkipCounts};
pub use signer::{ContentSigner, Sha256Signer};
pub use staleness::StalenessOracle;
pub use strategy::DirDigestStrategy;
pub use volume::{FixedVolumeId, PlatformVolumeId, VolumeIdentifier};
