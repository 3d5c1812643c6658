//! Office Open XML document properties (`docProps/core.xml`, `docProps/app.xml`)
//!
//! Values are taken with a literal tag lookup, `<tag ...>value</tag>`, on a
//! single line; no XML parsing or entity decoding is applied.

use std::io::{Cursor, Read};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::primitives::ArchiveReader;
use crate::source::ByteSource;

use super::ExtractFailure;

pub const CORE_PROPERTIES: &str = "docProps/core.xml";
pub const APP_PROPERTIES: &str = "docProps/app.xml";

/// Upper bound for a decompressed property part
const MAX_ENTRY_SIZE: u64 = 16 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocxRaw {
    pub core_xml: String,
    pub app_xml: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocxMetadata {
    pub title: Option<String>,
    pub creator: Option<String>,
    pub last_modified_by: Option<String>,
    /// ISO 8601 as written
    pub created: Option<String>,
    pub modified: Option<String>,
    pub revision: Option<String>,
    pub application: Option<String>,
    pub raw: DocxRaw,
}

/// Text between `<tag ...>` and `</tag>`; empty content counts as absent
pub fn tag_text(xml: &str, tag: &str) -> Option<String> {
    let escaped = regex::escape(tag);
    let pattern = Regex::new(&format!("<{0}[^>]*>(.*?)</{0}>", escaped)).ok()?;
    pattern
        .captures(xml)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|v| !v.is_empty())
}

impl DocxMetadata {
    fn from_parts(core_xml: String, app_xml: Option<String>) -> Self {
        Self {
            title: tag_text(&core_xml, "dc:title"),
            creator: tag_text(&core_xml, "dc:creator"),
            last_modified_by: tag_text(&core_xml, "cp:lastModifiedBy"),
            created: tag_text(&core_xml, "dcterms:created"),
            modified: tag_text(&core_xml, "dcterms:modified"),
            revision: tag_text(&core_xml, "cp:revision"),
            application: app_xml.as_deref().and_then(|xml| tag_text(xml, "Application")),
            raw: DocxRaw { core_xml, app_xml },
        }
    }
}

pub(super) fn extract(source: &ByteSource, archive: &dyn ArchiveReader) -> Result<DocxMetadata, ExtractFailure> {
    let core = archive
        .read_entry(source.bytes(), CORE_PROPERTIES)
        .map_err(ExtractFailure::Parse)?
        .ok_or(ExtractFailure::Empty)?;
    let app = archive
        .read_entry(source.bytes(), APP_PROPERTIES)
        .map_err(ExtractFailure::Parse)?;
    debug!(core_len = core.len(), has_app = app.is_some(), "Document properties read");
    Ok(DocxMetadata::from_parts(core, app))
}

// =============================================================================
// zip-backed Reader
// =============================================================================

/// Built-in [`ArchiveReader`] on top of the `zip` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipArchiveReader;

impl ArchiveReader for ZipArchiveReader {
    fn read_entry(&self, bytes: &[u8], name: &str) -> Result<Option<String>, String> {
        let mut archive =
            zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| format!("Failed to read ZIP archive: {e}"))?;

        let entry = match archive.by_name(name) {
            Ok(entry) => entry,
            Err(zip::result::ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(format!("Failed to open {name}: {e}")),
        };
        if entry.size() > MAX_ENTRY_SIZE {
            return Err(format!("{name} is too large ({} bytes)", entry.size()));
        }

        let mut data = Vec::with_capacity(entry.size() as usize);
        entry
            .take(MAX_ENTRY_SIZE)
            .read_to_end(&mut data)
            .map_err(|e| format!("Failed to extract {name}: {e}"))?;
        Ok(Some(String::from_utf8_lossy(&data).into_owned()))
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::{core_xml, zip_with, APP_XML};
    use super::*;
    use chrono::Utc;

    fn source(bytes: Vec<u8>) -> ByteSource {
        ByteSource::new(
            "report.docx",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            Utc::now(),
            bytes,
        )
    }

    #[test]
    fn test_reads_core_and_app_properties() {
        let core = core_xml("Alice", "Bob", "2020-01-01T00:00:00Z", "2021-06-01T00:00:00Z");
        let bytes = zip_with(&[(CORE_PROPERTIES, &core), (APP_PROPERTIES, APP_XML), ("word/document.xml", "<w/>")]);
        let meta = extract(&source(bytes), &ZipArchiveReader).unwrap();

        assert_eq!(meta.title.as_deref(), Some("Budget"));
        assert_eq!(meta.creator.as_deref(), Some("Alice"));
        assert_eq!(meta.last_modified_by.as_deref(), Some("Bob"));
        // attributes on the opening tag are tolerated
        assert_eq!(meta.created.as_deref(), Some("2020-01-01T00:00:00Z"));
        assert_eq!(meta.modified.as_deref(), Some("2021-06-01T00:00:00Z"));
        assert_eq!(meta.revision.as_deref(), Some("4"));
        assert_eq!(meta.application.as_deref(), Some("Microsoft Office Word"));
        assert!(meta.raw.app_xml.is_some());
    }

    #[test]
    fn test_app_properties_optional() {
        let core = core_xml("Alice", "Alice", "2020-01-01T00:00:00Z", "2020-01-01T00:00:00Z");
        let meta = extract(&source(zip_with(&[(CORE_PROPERTIES, &core)])), &ZipArchiveReader).unwrap();
        assert_eq!(meta.application, None);
        assert_eq!(meta.raw.app_xml, None);
    }

    #[test]
    fn test_missing_core_is_empty() {
        let bytes = zip_with(&[(APP_PROPERTIES, APP_XML)]);
        assert!(matches!(extract(&source(bytes), &ZipArchiveReader), Err(ExtractFailure::Empty)));
    }

    #[test]
    fn test_not_a_zip_fails() {
        let bytes = b"PK but not really a zip".to_vec();
        assert!(matches!(extract(&source(bytes), &ZipArchiveReader), Err(ExtractFailure::Parse(_))));
    }

    #[test]
    fn test_tag_text_literal_match() {
        assert_eq!(tag_text("<a:b x=\"1\">v</a:b>", "a:b").as_deref(), Some("v"));
        assert_eq!(tag_text("<a:b></a:b>", "a:b"), None);
        assert_eq!(tag_text("<a:c>v</a:c>", "a:b"), None);
    }
}
