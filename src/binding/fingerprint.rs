//! # Content Addressing
//!
//! Deterministic fingerprints over payloads and the derived object names built from them.
//!
//! The digest is SHA-256 over a length-prefixed encoding of the entries in sorted key
//! order, so equal payloads hash equally however they were assembled and no two
//! distinct payloads share an encoding.

use crate::binding::payload::Payload;
use crate::constants::{FINGERPRINT_SEPARATOR, MAX_OBJECT_NAME_LENGTH};
use sha2::{Digest, Sha256};

/// Length of a rendered fingerprint (hex-encoded SHA-256)
pub const FINGERPRINT_LENGTH: usize = 64;

/// Lowercase hex SHA-256 of the payload's canonical encoding
#[must_use]
pub fn fingerprint(payload: &Payload) -> String {
    let mut hasher = Sha256::new();
    for (key, value) in payload.iter() {
        hasher.update((key.len() as u64).to_be_bytes());
        hasher.update(key.as_bytes());
        hasher.update((value.len() as u64).to_be_bytes());
        hasher.update(value);
    }
    format!("{:x}", hasher.finalize())
}

/// Build `<base>-<fingerprint>`, truncating the base so the name fits the object
/// name limit. The fingerprint is never shortened.
#[must_use]
pub fn derived_name(base_name: &str, fingerprint: &str) -> String {
    let budget = MAX_OBJECT_NAME_LENGTH
        .saturating_sub(fingerprint.len() + FINGERPRINT_SEPARATOR.len());

    let mut end = base_name.len().min(budget);
    while !base_name.is_char_boundary(end) {
        end -= 1;
    }
    // A name may not end in '-' or '.' before the separator is appended
    let base = base_name[..end].trim_end_matches(['-', '.']);

    if base.is_empty() {
        fingerprint.to_string()
    } else {
        format!("{base}{FINGERPRINT_SEPARATOR}{fingerprint}")
    }
}
