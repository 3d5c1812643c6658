//! Analyzer configuration
//!
//! Loaded from TOML; every key is optional and falls back to the defaults
//! below. Example:
//!
//! ```toml
//! max_file_size = 10485760
//! extractor_timeout_ms = 5000
//! extra_digests = ["md5"]
//!
//! [vocabularies]
//! image_editors = ["photoshop", "affinity"]
//! ```

use std::path::Path;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::common::magic::DEFAULT_PREFIX_LEN;
use crate::common::HashAlgorithm;
use crate::error::{AnalysisError, AnalysisResult};

/// Hard upper bound on accepted input (50 MiB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Budget for a single format extractor; 0 disables the timeout
pub const DEFAULT_EXTRACTOR_TIMEOUT_MS: u64 = 30_000;

/// Ordered keyword lists consulted by the rule sets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vocabularies {
    /// Substrings of an image software tag that name an editing application
    pub image_editors: Vec<String>,
    /// Regex fragments, joined with `|`, matched against audio title/artist/album
    pub distribution_tags: Vec<String>,
    /// Terms searched for in plain-text content
    pub suspicious_keywords: Vec<String>,
}

impl Default for Vocabularies {
    fn default() -> Self {
        Self {
            image_editors: ["photoshop", "lightroom", "gimp", "snapseed", "canva"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            distribution_tags: [r"\.com", "www", "mass", "tamil", "mp3", "free"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            suspicious_keywords: [
                "password",
                "confidential",
                "secret",
                "attack",
                "exploit",
                "admin",
                "bitcoin",
                "urgent",
                "verify",
                "bank",
                "vulnerable",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl Vocabularies {
    /// Case-insensitive alternation of the distribution fragments.
    /// None when the list is empty.
    pub fn distribution_pattern(&self) -> Result<Option<Regex>, regex::Error> {
        if self.distribution_tags.is_empty() {
            return Ok(None);
        }
        RegexBuilder::new(&self.distribution_tags.join("|"))
            .case_insensitive(true)
            .build()
            .map(Some)
    }

    /// Keyword list with duplicates removed, first occurrence wins
    pub fn unique_keywords(&self) -> Vec<String> {
        let mut seen: Vec<String> = Vec::with_capacity(self.suspicious_keywords.len());
        for kw in &self.suspicious_keywords {
            let kw = kw.to_lowercase();
            if !kw.is_empty() && !seen.contains(&kw) {
                seen.push(kw);
            }
        }
        seen
    }
}

/// Settings for one [`crate::Analyzer`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub max_file_size: u64,
    pub extractor_timeout_ms: u64,
    pub sniff_prefix_len: usize,
    pub vocabularies: Vocabularies,
    pub extra_digests: Vec<HashAlgorithm>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            extractor_timeout_ms: DEFAULT_EXTRACTOR_TIMEOUT_MS,
            sniff_prefix_len: DEFAULT_PREFIX_LEN,
            vocabularies: Vocabularies::default(),
            extra_digests: Vec::new(),
        }
    }
}

impl AnalyzerConfig {
    /// Parse TOML text and validate it
    pub fn from_toml_str(text: &str) -> AnalysisResult<Self> {
        let config: AnalyzerConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file
    pub fn load(path: impl AsRef<Path>) -> AnalysisResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            AnalysisError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        debug!(path = %path.display(), "Loading analyzer configuration");
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> AnalysisResult<()> {
        if self.max_file_size == 0 {
            return Err(AnalysisError::Config("max_file_size must be positive".into()));
        }
        if self.sniff_prefix_len == 0 {
            return Err(AnalysisError::Config("sniff_prefix_len must be positive".into()));
        }
        self.vocabularies
            .distribution_pattern()
            .map_err(|e| AnalysisError::Config(format!("invalid distribution_tags: {}", e)))?;
        Ok(())
    }
}
