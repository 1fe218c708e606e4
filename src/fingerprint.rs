//! Stable message fingerprints derived from the protocol message identifier

use sha2::{Digest, Sha256};

/// Normalize a raw Message-ID: drop surrounding whitespace and the enclosing
/// angle brackets.
fn normalize(raw: &str) -> &str {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix('<').unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix('>').unwrap_or(trimmed);
    trimmed.trim()
}

/// Derive the index store primary key for a message.
///
/// Equal normalized identifiers always yield equal fingerprints, so the same
/// message seen via backfill, live sync, or after a restart maps to the same
/// document.
pub fn fingerprint(raw_message_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize(raw_message_id).as_bytes());
    hex::encode(hasher.finalize())
}
