//! metascope: single-file metadata forensics
//!
//! A file goes through signature sniffing, hashing and one format
//! extractor chosen from its declared type. Rule sets then turn the
//! extracted metadata into plain-language findings.
//!
//! ```rust,ignore
//! use metascope::{Analyzer, ByteSource};
//!
//! let source = ByteSource::from_path("photo.jpg")?;
//! let report = Analyzer::default().analyze_blocking(source)?;
//! for line in report.findings.texts() {
//!     println!("{line}");
//! }
//! ```

pub mod analyzer;
pub mod common;
pub mod config;
pub mod error;
pub mod extractors;
pub mod heuristics;
pub mod logging;
pub mod primitives;
pub mod report;
pub mod source;

pub use analyzer::Analyzer;
pub use config::{AnalyzerConfig, Vocabularies};
pub use error::{AnalysisError, AnalysisResult};
pub use extractors::{ExtractorKind, MetadataRecord};
pub use heuristics::{Finding, Findings, Phase};
pub use primitives::Primitives;
pub use report::Report;
pub use source::ByteSource;
