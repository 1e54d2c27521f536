//! Short public-key digests, the user-visible identity surface.
//!
//! A fingerprint is the first 4 bytes of SHA-256 over the raw public key,
//! rendered as 8 uppercase hex characters. Collisions in 32 bits are
//! display collisions only; no authentication is claimed.

use sha2::{Digest, Sha256};

use crate::constants::FINGERPRINT_LEN;

/// Compute the fingerprint of a public key.
///
/// Pure function of the key bytes: identical inputs always produce
/// identical outputs.
pub fn fingerprint(public_key: &[u8]) -> String {
    let digest = Sha256::digest(public_key);
    hex::encode_upper(&digest[..4])
}

/// First four characters of a fingerprint, for dense UI surfaces.
pub fn short_fingerprint(fp: &str) -> String {
    fp.chars().take(4).collect()
}

/// Accepts exactly 8 hex characters, any case.
pub fn is_valid_fingerprint(s: &str) -> bool {
    s.len() == FINGERPRINT_LEN && s.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_shape() {
        let fp = fingerprint(b"some public key bytes");
        assert_eq!(fp.len(), 8);
        assert!(fp
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
        assert!(is_valid_fingerprint(&fp));
    }

    #[test]
    fn test_fingerprint_deterministic() {
        let key = [7u8; 32];
        assert_eq!(fingerprint(&key), fingerprint(&key));
    }

    #[test]
    fn test_fingerprint_known_vector() {
        // SHA-256("") = e3b0c44298fc1c14...
        assert_eq!(fingerprint(b""), "E3B0C442");
    }

    #[test]
    fn test_short_fingerprint() {
        assert_eq!(short_fingerprint("A1B2C3D4"), "A1B2");
    }

    #[test]
    fn test_is_valid_fingerprint() {
        assert!(is_valid_fingerprint("a1b2c3d4"));
        assert!(is_valid_fingerprint("A1B2C3D4"));
        assert!(!is_valid_fingerprint("A1B2C3"));
        assert!(!is_valid_fingerprint("A1B2C3D4E5"));
        assert!(!is_valid_fingerprint("G1B2C3D4"));
        assert!(!is_valid_fingerprint(""));
    }
}
