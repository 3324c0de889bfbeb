//! Digest computation for downloaded scripts
//!
//! The hashing capability sits behind [`Digester`] so the verifier never
//! probes for external tools at runtime. [`PlatformDigester`] is the build-time
//! choice.

use sha2::{Digest, Sha256};

/// Length of a SHA-256 digest in bytes
pub const SHA256_LEN: usize = 32;

/// Computes a hex digest over exact bytes
pub trait Digester: Send + Sync {
    /// Algorithm name for logs and reports
    fn algorithm(&self) -> &'static str;

    /// Digest length in bytes
    fn digest_len(&self) -> usize;

    /// Lowercase hex digest of `bytes`, no normalization applied
    fn digest_hex(&self, bytes: &[u8]) -> String;
}

/// SHA-256 via the `sha2` crate
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256Digester;

impl Digester for Sha256Digester {
    fn algorithm(&self) -> &'static str {
        "sha256"
    }

    fn digest_len(&self) -> usize {
        SHA256_LEN
    }

    fn digest_hex(&self, bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        hex::encode(hasher.finalize())
    }
}

/// Digester compiled in for this target
pub type PlatformDigester = Sha256Digester;

/// Compare two equal-length byte strings without exiting on the first difference
pub fn digests_equal(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vector() {
        assert_eq!(
            Sha256Digester.digest_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            Sha256Digester.digest_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_no_line_ending_normalization() {
        let unix = Sha256Digester.digest_hex(b"#!/bin/sh\necho ok\n");
        let dos = Sha256Digester.digest_hex(b"#!/bin/sh\r\necho ok\r\n");
        let trailing = Sha256Digester.digest_hex(b"#!/bin/sh\necho ok");
        assert_ne!(unix, dos);
        assert_ne!(unix, trailing);
    }

    #[test]
    fn test_digests_equal() {
        assert!(digests_equal(&[1, 2, 3], &[1, 2, 3]));
        assert!(!digests_equal(&[1, 2, 3], &[1, 2, 4]));
        assert!(!digests_equal(&[1, 2, 3], &[1, 2]));
    }
}
