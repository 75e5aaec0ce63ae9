//! Content digest computation using streaming SHA-256.
//!
//! The digest algorithm is fixed for the life of the tool: manifests
//! written by one version must stay comparable with manifests written
//! by another, so substituting algorithms is a breaking format change
//! rather than a runtime option.

use crate::error::SigError;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::trace;

/// Bytes read per chunk while streaming a file into the hasher.
const CHUNK_SIZE: usize = 64 * 1024;

/// Produces content digests for individual files.
///
/// A trait rather than free functions so builds can inject an
/// instrumented or stub signer (staleness tests assert that a reused
/// manifest triggers zero signing calls).
pub trait ContentSigner: Sync {
    /// Stream-hash one file's bytes and return the lowercase hex digest.
    ///
    /// Fails with [`SigError::Unreadable`] if the file cannot be opened
    /// or a read fails mid-stream; the caller decides whether that skips
    /// the entry or aborts.
    fn sign(&self, path: &Path) -> Result<String, SigError>;
}

/// Default signer: chunked SHA-256 over the file's raw bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256Signer;

impl Sha256Signer {
    pub fn new() -> Self {
        Sha256Signer
    }

    /// Digest an in-memory byte string. Used for directory signatures,
    /// which are built from synthesized text rather than file content.
    pub fn sign_bytes(data: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(data);
        hex::encode(hasher.finalize())
    }
}

impl ContentSigner for Sha256Signer {
    fn sign(&self, path: &Path) -> Result<String, SigError> {
        trace!(path = %path.display(), "Signing file");
        let mut file = File::open(path).map_err(|e| SigError::unreadable(path, e))?;
        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; CHUNK_SIZE];
        loop {
            let n = file
                .read(&mut buf)
                .map_err(|e| SigError::unreadable(path, e))?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(hex::encode(hasher.finalize()))
    }
}
