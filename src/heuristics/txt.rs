use crate::common::timefmt::format_utc;
use crate::extractors::TxtMetadata;

use super::{Findings, Passes};

const SPARSE_WORDS: usize = 10;
const DENSE_WORDS: usize = 10_000;
/// URLs quoted individually
const LISTED_URLS: usize = 3;

/// Text findings are descriptive only
pub(super) fn evaluate(meta: &TxtMetadata) -> Findings {
    let mut passes = Passes::default();

    passes.note(format!("Text file name identified as \"{}\".", meta.file_name));
    passes.note(format!("File size recorded as {} bytes.", meta.file_size));
    passes.note(format!(
        "Last modified timestamp recorded as {}.",
        format_utc(&meta.last_modified)
    ));
    passes.note(format!("Total word count identified as {}.", meta.word_count));
    passes.note(format!("Total character count identified as {}.", meta.char_count));
    passes.note(format!("Total line count identified as {}.", meta.line_count));

    if meta.empty_lines > 0 {
        passes.note(format!(
            "The document contains {} empty or blank lines.",
            meta.empty_lines
        ));
    }
    if meta.word_count < SPARSE_WORDS {
        passes.note("The document contains a very limited amount of textual content.");
    }
    if meta.word_count > DENSE_WORDS {
        passes.note("The document contains a substantially large volume of textual content.");
    }

    if !meta.links.is_empty() {
        passes.note(format!(
            "A total of {} URL(s) were identified within the text content.",
            meta.links.len()
        ));
        for (i, link) in meta.links.iter().take(LISTED_URLS).enumerate() {
            passes.note(format!("URL {} identified as: {link}", i + 1));
        }
    }

    if !meta.suspicious_keywords_found.is_empty() {
        passes.note(format!(
            "The following predefined sensitive terms were detected within the text: {}.",
            meta.suspicious_keywords_found.join(", ")
        ));
    }
    if meta.links.is_empty() && meta.suspicious_keywords_found.is_empty() {
        passes.note("No predefined sensitive terms or URLs were identified within the examined text content.");
    }

    passes.finish()
}
