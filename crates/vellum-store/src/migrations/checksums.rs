//! Checksum validation for migrations
//!
//! A migration's SHA-256 is recorded when it is applied; a different
//! checksum on a later run means the embedded SQL was edited after release.

use sha2::{Digest, Sha256};

/// Compute SHA256 checksum of a string
pub fn compute_checksum(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}
