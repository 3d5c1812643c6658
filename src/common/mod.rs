// Common utilities shared across format extractors and rule sets

pub mod binary;
pub mod hash;
pub mod magic;
pub mod patterns;
pub mod timefmt;

// Re-exports for convenience
pub use binary::Endian;
pub use hash::{compute_hash, FileHashes, HashAlgorithm, Sha256Digester, HASH_FAILURE_PLACEHOLDER};
pub use magic::{detect_file_type, FileCategory, FileType, MagicSniffer, SniffedType};
