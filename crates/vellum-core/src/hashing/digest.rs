//! Fixed-size summary digest.
//!
//! Dependency digests only need to detect change, not resist attack, so a
//! truncated SHA256 keeps stored records short. Eight hex characters.

use sha2::{Digest, Sha256};

use crate::model::VersionId;

/// Number of digest bytes kept from the full SHA256 output.
pub const DIGEST_BYTES: usize = 4;

/// Hash `text` and hex-encode the first [`DIGEST_BYTES`] bytes.
pub fn digest_summary(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(&hasher.finalize()[..DIGEST_BYTES])
}

/// Digest of a set of `(branch version id, dependency digest)` pairs.
///
/// Entries are sorted by version id first, so the result does not depend on
/// the order the dependencies were read in. Lines are `"{version_id}:{digest}"`
/// joined with `\n`.
pub fn summarize_dependencies(entries: &mut [(VersionId, String)]) -> String {
    entries.sort_by_key(|(version_id, _)| *version_id);
    let summary = entries
        .iter()
        .map(|(version_id, digest)| format!("{}:{}", version_id, digest))
        .collect::<Vec<_>>()
        .join("\n");
    digest_summary(&summary)
}
