//! Per-format metadata extractors and the router that selects one
//!
//! Routing looks only at the declared MIME type and file name. The sniffed
//! type is advisory and never changes which extractor runs, so a renamed or
//! re-labelled file is parsed as whatever it claims to be.
//!
//! | Kind  | Predicate                               |
//! |-------|-----------------------------------------|
//! | Image | declared MIME starts with `image/`      |
//! | Pdf   | declared MIME is `application/pdf`      |
//! | Audio | declared MIME starts with `audio/`      |
//! | Video | declared MIME starts with `video/`      |
//! | Docx  | name ends with `.docx`                  |
//! | Eml   | name ends with `.eml`                   |
//! | Txt   | name ends with `.txt`                   |
//!
//! When more than one predicate holds, the first row wins.

pub mod audio;
pub mod docx;
pub mod eml;
pub mod image;
pub mod pdf;
pub mod txt;
pub mod video;

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::AnalyzerConfig;
use crate::primitives::Primitives;
use crate::source::ByteSource;

pub use audio::AudioMetadata;
pub use docx::DocxMetadata;
pub use eml::EmlMetadata;
pub use image::ImageMetadata;
pub use pdf::PdfMetadata;
pub use txt::TxtMetadata;
pub use video::VideoMetadata;

// =============================================================================
// Extractor Kinds
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractorKind {
    Image,
    Pdf,
    Audio,
    Video,
    Docx,
    Eml,
    Txt,
}

impl ExtractorKind {
    /// Router priority order
    pub const ALL: [ExtractorKind; 7] = [
        ExtractorKind::Image,
        ExtractorKind::Pdf,
        ExtractorKind::Audio,
        ExtractorKind::Video,
        ExtractorKind::Docx,
        ExtractorKind::Eml,
        ExtractorKind::Txt,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ExtractorKind::Image => "image",
            ExtractorKind::Pdf => "pdf",
            ExtractorKind::Audio => "audio",
            ExtractorKind::Video => "video",
            ExtractorKind::Docx => "docx",
            ExtractorKind::Eml => "eml",
            ExtractorKind::Txt => "txt",
        }
    }

    /// Selection predicate over the declared facts
    pub fn matches(&self, declared_mime: &str, name: &str) -> bool {
        let lower_name = name.to_lowercase();
        match self {
            ExtractorKind::Image => declared_mime.starts_with("image/"),
            ExtractorKind::Pdf => declared_mime == "application/pdf",
            ExtractorKind::Audio => declared_mime.starts_with("audio/"),
            ExtractorKind::Video => declared_mime.starts_with("video/"),
            ExtractorKind::Docx => lower_name.ends_with(".docx"),
            ExtractorKind::Eml => lower_name.ends_with(".eml"),
            ExtractorKind::Txt => lower_name.ends_with(".txt"),
        }
    }

    /// Message recorded when the format parsed but carried no metadata
    pub fn empty_message(&self) -> &'static str {
        match self {
            ExtractorKind::Image => "No EXIF metadata found in this image.",
            ExtractorKind::Audio => "No audio metadata found.",
            ExtractorKind::Docx => "No DOCX metadata found.",
            _ => self.failure_message(),
        }
    }

    /// Message recorded when parsing failed
    pub fn failure_message(&self) -> &'static str {
        match self {
            ExtractorKind::Image => "Failed to extract metadata.",
            ExtractorKind::Pdf => "Unable to extract PDF metadata.",
            ExtractorKind::Audio => "Failed to extract audio metadata.",
            ExtractorKind::Video => "Failed to extract video metadata.",
            ExtractorKind::Docx => "DOCX parsing failed.",
            ExtractorKind::Eml => "EML parsing failed.",
            ExtractorKind::Txt => "TXT parsing failed.",
        }
    }
}

impl fmt::Display for ExtractorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Pick the extractor for a source, first match in priority order
pub fn select(source: &ByteSource) -> Option<ExtractorKind> {
    let (mime, name) = (source.declared_mime(), source.name());
    let mut matching = ExtractorKind::ALL.iter().filter(|k| k.matches(mime, name));
    let selected = matching.next().copied();
    let shadowed: Vec<_> = matching.map(ExtractorKind::name).collect();
    if let Some(kind) = selected {
        if !shadowed.is_empty() {
            debug!(selected = %kind, ?shadowed, "Several extractors match; using the first");
        }
    }
    selected
}

// =============================================================================
// Records
// =============================================================================

/// Why an extractor produced no record
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ExtractFailure {
    /// Readable, but nothing to report
    Empty,
    /// Parse failure; the detail is logged, never reported
    Parse(String),
}

/// An extractor that could not produce a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unavailable {
    pub kind: ExtractorKind,
    pub message: String,
}

/// Normalized metadata, one variant per format plus the failure case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "lowercase")]
pub enum MetadataRecord {
    Image(ImageMetadata),
    Pdf(PdfMetadata),
    Audio(AudioMetadata),
    Video(VideoMetadata),
    Docx(DocxMetadata),
    Eml(EmlMetadata),
    Txt(TxtMetadata),
    Unavailable(Unavailable),
}

impl MetadataRecord {
    pub fn unavailable(kind: ExtractorKind, message: impl Into<String>) -> Self {
        MetadataRecord::Unavailable(Unavailable {
            kind,
            message: message.into(),
        })
    }

    pub fn is_available(&self) -> bool {
        !matches!(self, MetadataRecord::Unavailable(_))
    }

    pub fn kind(&self) -> ExtractorKind {
        match self {
            MetadataRecord::Image(_) => ExtractorKind::Image,
            MetadataRecord::Pdf(_) => ExtractorKind::Pdf,
            MetadataRecord::Audio(_) => ExtractorKind::Audio,
            MetadataRecord::Video(_) => ExtractorKind::Video,
            MetadataRecord::Docx(_) => ExtractorKind::Docx,
            MetadataRecord::Eml(_) => ExtractorKind::Eml,
            MetadataRecord::Txt(_) => ExtractorKind::Txt,
            MetadataRecord::Unavailable(u) => u.kind,
        }
    }

    /// Diagnostic message of an unavailable record
    pub fn message(&self) -> Option<&str> {
        match self {
            MetadataRecord::Unavailable(u) => Some(&u.message),
            _ => None,
        }
    }
}

fn contain<T>(kind: ExtractorKind, outcome: Result<T, ExtractFailure>, wrap: fn(T) -> MetadataRecord) -> MetadataRecord {
    match outcome {
        Ok(record) => wrap(record),
        Err(ExtractFailure::Empty) => {
            debug!(extractor = %kind, "No metadata present");
            MetadataRecord::unavailable(kind, kind.empty_message())
        }
        Err(ExtractFailure::Parse(e)) => {
            warn!(extractor = %kind, error = %e, "Extraction failed");
            MetadataRecord::unavailable(kind, kind.failure_message())
        }
    }
}

/// Run one extractor. Never fails: parse errors become an unavailable record.
pub fn extract(
    kind: ExtractorKind,
    source: &ByteSource,
    primitives: &Primitives,
    config: &AnalyzerConfig,
) -> MetadataRecord {
    debug!(extractor = %kind, bytes = source.size(), "Extraction started");
    let record = match kind {
        ExtractorKind::Image => contain(kind, image::extract(source, primitives.exif.as_ref()), MetadataRecord::Image),
        ExtractorKind::Pdf => contain(kind, pdf::extract(source, primitives.pdf.as_ref()), MetadataRecord::Pdf),
        ExtractorKind::Audio => contain(kind, audio::extract(source, primitives.audio.as_ref()), MetadataRecord::Audio),
        ExtractorKind::Video => contain(kind, video::extract(source, primitives.media.as_ref()), MetadataRecord::Video),
        ExtractorKind::Docx => contain(kind, docx::extract(source, primitives.archive.as_ref()), MetadataRecord::Docx),
        ExtractorKind::Eml => contain(kind, eml::extract(source, primitives.mail.as_ref()), MetadataRecord::Eml),
        ExtractorKind::Txt => contain(kind, txt::extract(source, &config.vocabularies), MetadataRecord::Txt),
    };
    debug!(extractor = %kind, available = record.is_available(), "Extraction finished");
    record
}
