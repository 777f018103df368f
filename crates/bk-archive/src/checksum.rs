//! Streaming SHA-256 checksums.

use sha2::{Digest, Sha256};
use std::path::Path;

/// Compute the SHA-256 of a file, returned as lowercase hex.
pub fn sha256_file<P: AsRef<Path>>(path: P) -> crate::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}
