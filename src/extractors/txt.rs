//! Plain-text statistics, links and keyword hits

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::patterns::url_regex;
use crate::config::Vocabularies;
use crate::source::ByteSource;

use super::ExtractFailure;

/// Characters kept in `raw_preview`
pub const PREVIEW_CHARS: usize = 800;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxtMetadata {
    pub file_name: String,
    pub file_size: u64,
    pub last_modified: DateTime<Utc>,
    pub word_count: usize,
    pub char_count: usize,
    /// Segments produced by splitting on line breaks, so a trailing
    /// newline adds an empty last line
    pub line_count: usize,
    pub empty_lines: usize,
    pub links: Vec<String>,
    pub suspicious_keywords_found: Vec<String>,
    pub raw_preview: String,
}

impl TxtMetadata {
    pub fn from_text(text: &str, source: &ByteSource, vocabularies: &Vocabularies) -> Self {
        let lines: Vec<&str> = text.split('\n').collect();
        let lower = text.to_lowercase();

        Self {
            file_name: source.name().to_string(),
            file_size: source.size(),
            last_modified: source.last_modified(),
            word_count: text.split_whitespace().count(),
            char_count: text.chars().count(),
            line_count: lines.len(),
            empty_lines: lines.iter().filter(|l| l.trim().is_empty()).count(),
            links: url_regex().find_iter(text).map(|m| m.as_str().to_string()).collect(),
            suspicious_keywords_found: vocabularies
                .unique_keywords()
                .into_iter()
                .filter(|k| lower.contains(k.as_str()))
                .collect(),
            raw_preview: text.chars().take(PREVIEW_CHARS).collect(),
        }
    }
}

/// Text is decoded as UTF-8 with replacement characters, so this never fails
pub(super) fn extract(source: &ByteSource, vocabularies: &Vocabularies) -> Result<TxtMetadata, ExtractFailure> {
    let text = String::from_utf8_lossy(source.bytes());
    Ok(TxtMetadata::from_text(&text, source, vocabularies))
}
