//! Content-digest helper used to key the AST cache (§5 "Parsed-AST cache").
//!
//! Grounded on the same content-addressing idea as a write-through cache
//! keyed by a stable hash of the input, so identical rule text always maps
//! to the same cache slot regardless of where it was loaded from.

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 digest of the raw rule text.
pub fn content_digest(source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    let bytes = hasher.finalize();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_input_produces_identical_digest() {
        assert_eq!(content_digest("same text"), content_digest("same text"));
    }

    #[test]
    fn different_input_produces_different_digest() {
        assert_ne!(content_digest("a"), content_digest("b"));
    }

    #[test]
    fn digest_is_64_hex_characters() {
        let d = content_digest("rule text");
        assert_eq!(d.len(), 64);
        assert!(d.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
