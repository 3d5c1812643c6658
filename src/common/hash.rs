// Content digests for analysed files
//
// SHA-256 is the report's primary fingerprint. MD5 and SHA-1 can be
// requested as secondary digests for cross-referencing legacy case notes.

use std::fmt;
use std::str::FromStr;

use md5::Md5;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use sha2::Sha256;
use tracing::{debug, warn};

use crate::primitives::Digester;

/// Placeholder recorded in the report when a digest could not be produced
pub const HASH_FAILURE_PLACEHOLDER: &str = "Hash generation failed";

// =============================================================================
// Hash Algorithm Enum
// =============================================================================

/// Supported digest algorithms
/// - SHA256: mandatory primary digest
/// - MD5/SHA1: legacy digests, only computed on request
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha256,
}

impl HashAlgorithm {
    /// Get the canonical algorithm name
    pub fn name(&self) -> &'static str {
        match self {
            HashAlgorithm::Md5 => "MD5",
            HashAlgorithm::Sha1 => "SHA-1",
            HashAlgorithm::Sha256 => "SHA-256",
        }
    }

    /// Get expected hash length in hex characters
    pub fn hash_length(&self) -> usize {
        match self {
            HashAlgorithm::Md5 => 32,
            HashAlgorithm::Sha1 => 40,
            HashAlgorithm::Sha256 => 64,
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = String;

    /// Parse algorithm name (case-insensitive, dashes optional)
    fn from_str(algorithm: &str) -> Result<Self, Self::Err> {
        match algorithm.trim().to_lowercase().as_str() {
            "md5" => Ok(HashAlgorithm::Md5),
            "sha1" | "sha-1" => Ok(HashAlgorithm::Sha1),
            "sha256" | "sha-256" => Ok(HashAlgorithm::Sha256),
            _ => Err(format!(
                "Unsupported hash algorithm: '{}'. Supported: md5, sha1, sha256",
                algorithm
            )),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// One-shot Hash Computation
// =============================================================================

/// Compute hash of data using specified algorithm, rendered as lowercase hex
pub fn compute_hash(data: &[u8], algorithm: HashAlgorithm) -> String {
    match algorithm {
        HashAlgorithm::Md5 => {
            let mut hasher = Md5::new();
            hasher.update(data);
            hex::encode(hasher.finalize())
        }
        HashAlgorithm::Sha1 => {
            let mut hasher = Sha1::new();
            hasher.update(data);
            hex::encode(hasher.finalize())
        }
        HashAlgorithm::Sha256 => {
            let mut hasher = Sha256::new();
            hasher.update(data);
            hex::encode(hasher.finalize())
        }
    }
}

/// Validate that a string looks like a valid hash for the given algorithm
pub fn is_valid_hash(hash: &str, algorithm: HashAlgorithm) -> bool {
    hash.len() == algorithm.hash_length()
        && hash.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
}

// =============================================================================
// Report digests
// =============================================================================

/// A secondary digest requested through configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditionalDigest {
    pub algorithm: HashAlgorithm,
    pub digest: String,
}

/// Digests recorded in a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileHashes {
    /// 64 lowercase hex chars, or [`HASH_FAILURE_PLACEHOLDER`]
    pub sha256: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional: Vec<AdditionalDigest>,
}

impl FileHashes {
    /// Run the primary digester plus any configured secondary algorithms.
    /// Failures never propagate; they are recorded as the placeholder string.
    pub fn compute(digester: &dyn Digester, data: &[u8], extra: &[HashAlgorithm]) -> Self {
        let sha256 = match digester.digest(data) {
            Ok(hex) => hex,
            Err(e) => {
                warn!(error = %e, "Hash generation failed");
                HASH_FAILURE_PLACEHOLDER.to_string()
            }
        };

        let additional = extra
            .iter()
            .filter(|alg| **alg != HashAlgorithm::Sha256)
            .map(|alg| AdditionalDigest {
                algorithm: *alg,
                digest: compute_hash(data, *alg),
            })
            .collect::<Vec<_>>();

        debug!(bytes = data.len(), extra = additional.len(), "Digests computed");
        Self { sha256, additional }
    }

    /// True when the primary digest was produced
    pub fn is_complete(&self) -> bool {
        is_valid_hash(&self.sha256, HashAlgorithm::Sha256)
    }
}

/// Default [`Digester`]: SHA-256 rendered as lowercase hex
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Digester;

impl Digester for Sha256Digester {
    fn digest(&self, bytes: &[u8]) -> Result<String, String> {
        Ok(compute_hash(bytes, HashAlgorithm::Sha256))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenDigester;

    impl Digester for BrokenDigester {
        fn digest(&self, _bytes: &[u8]) -> Result<String, String> {
            Err("digest engine unavailable".to_string())
        }
    }

    #[test]
    fn test_algorithm_parsing() {
        assert_eq!("md5".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Md5);
        assert_eq!("SHA-1".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha1);
        assert_eq!("Sha256".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha256);
        assert!("blake3".parse::<HashAlgorithm>().is_err());
    }

    #[test]
    fn test_compute_hash() {
        let data = b"hello world";
        assert_eq!(compute_hash(data, HashAlgorithm::Md5), "5eb63bbbe01eeed093cb22bb8f5acdc3");
        assert_eq!(
            compute_hash(data, HashAlgorithm::Sha1),
            "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed"
        );
        assert_eq!(
            compute_hash(data, HashAlgorithm::Sha256),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_sha256_is_deterministic_lowercase_hex() {
        let data = b"The quick brown fox jumps over the lazy dog";
        let a = Sha256Digester.digest(data).unwrap();
        let b = Sha256Digester.digest(data).unwrap();
        assert_eq!(a, b);
        assert!(is_valid_hash(&a, HashAlgorithm::Sha256));
    }

    #[test]
    fn test_single_byte_change_changes_digest() {
        let original = b"forensic fixture payload".to_vec();
        let base = Sha256Digester.digest(&original).unwrap();

        for idx in [0usize, 7, original.len() - 1] {
            let mut mutated = original.clone();
            mutated[idx] ^= 0x01;
            let changed = Sha256Digester.digest(&mutated).unwrap();
            assert_ne!(base, changed, "mutation at {idx} kept the digest");
        }
    }

    #[test]
    fn test_failure_becomes_placeholder() {
        let hashes = FileHashes::compute(&BrokenDigester, b"abc", &[HashAlgorithm::Md5]);
        assert_eq!(hashes.sha256, HASH_FAILURE_PLACEHOLDER);
        assert!(!hashes.is_complete());
        // secondary digests are independent of the primary digester
        assert_eq!(hashes.additional.len(), 1);
        assert_eq!(hashes.additional[0].digest, "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn test_hash_validation() {
        assert!(is_valid_hash("5eb63bbbe01eeed093cb22bb8f5acdc3", HashAlgorithm::Md5));
        assert!(!is_valid_hash("5EB63BBBE01EEED093CB22BB8F5ACDC3", HashAlgorithm::Md5));
        assert!(!is_valid_hash("5eb63bbbe01eeed093cb22bb8f5acdc3", HashAlgorithm::Sha1));
    }
}
