//! Rule sets that turn a metadata record into natural-language findings
//!
//! Every format runs two independent passes over its record:
//!
//! 1. anomaly rules, which flag irregularities
//! 2. interpretation rules, which restate what the metadata says
//!
//! The passes fill separate lists that are concatenated, anomalies first.
//! A rule whose inputs are absent is skipped. Rules never fail; an
//! unavailable record produces the fixed fallback text of its format.

pub mod identity;

mod audio;
mod docx;
mod eml;
mod image;
mod pdf;
mod txt;
mod video;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Vocabularies;
use crate::extractors::{ExtractorKind, MetadataRecord};
use crate::source::ByteSource;

pub use eml::decode_rfc2047;
pub use identity::assess_identity;

// =============================================================================
// Findings
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Anomaly,
    Interpretation,
}

/// One sentence about the examined file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub phase: Phase,
    pub text: String,
}

/// Ordered findings of one analysis run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Findings {
    items: Vec<Finding>,
}

impl Findings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Anomalies first, then interpretation lines
    pub fn from_phases(anomalies: Vec<String>, interpretation: Vec<String>) -> Self {
        let tag = |phase: Phase| move |text: String| Finding { phase, text };
        let items = anomalies
            .into_iter()
            .map(tag(Phase::Anomaly))
            .chain(interpretation.into_iter().map(tag(Phase::Interpretation)))
            .collect();
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Finding> {
        self.items.iter()
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|f| f.text.as_str())
    }

    pub fn in_phase(&self, phase: Phase) -> impl Iterator<Item = &str> {
        self.items
            .iter()
            .filter(move |f| f.phase == phase)
            .map(|f| f.text.as_str())
    }

    pub fn contains(&self, text: &str) -> bool {
        self.texts().any(|t| t == text)
    }
}

impl<'a> IntoIterator for &'a Findings {
    type Item = &'a Finding;
    type IntoIter = std::slice::Iter<'a, Finding>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// The two lists a rule set fills
#[derive(Debug, Default)]
pub(crate) struct Passes {
    pub anomalies: Vec<String>,
    pub interpretation: Vec<String>,
}

impl Passes {
    pub fn flag(&mut self, text: impl Into<String>) {
        self.anomalies.push(text.into());
    }

    pub fn note(&mut self, text: impl Into<String>) {
        self.interpretation.push(text.into());
    }

    pub fn finish(self) -> Findings {
        Findings::from_phases(self.anomalies, self.interpretation)
    }
}

// =============================================================================
// Declared Facts
// =============================================================================

/// Attributes of the input that some rule sets consult besides the record
#[derive(Debug, Clone, Copy)]
pub struct SourceFacts<'a> {
    pub name: &'a str,
    pub declared_mime: &'a str,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

impl<'a> SourceFacts<'a> {
    pub fn from_source(source: &'a ByteSource) -> Self {
        Self {
            name: source.name(),
            declared_mime: source.declared_mime(),
            size: source.size(),
            last_modified: source.last_modified(),
        }
    }

    /// Lower-cased text after the last `.` of the name
    pub fn extension(&self) -> Option<String> {
        crate::source::extension_of(self.name)
    }
}

// =============================================================================
// Dispatch
// =============================================================================

/// Fixed explanation emitted for an unavailable record
pub fn fallback_texts(kind: ExtractorKind) -> &'static [&'static str] {
    match kind {
        ExtractorKind::Image => &[
            "Metadata appears completely stripped or unavailable.",
            "No embedded image metadata was identified within the file.",
            "This may occur when an image is exported, compressed, or processed through editing platforms.",
        ],
        ExtractorKind::Pdf => &["No PDF document information metadata could be recovered from the file."],
        ExtractorKind::Audio => &["No recoverable audio metadata was identified within the file."],
        ExtractorKind::Video => &["No recoverable video container metadata was identified within the file."],
        ExtractorKind::Docx => &["No document property metadata was extracted from the file."],
        ExtractorKind::Eml => &["No recoverable email header or body metadata was identified within the message."],
        ExtractorKind::Txt => &["No recoverable text content metadata was identified within the file."],
    }
}

/// Run the rule set of the record's format
pub fn evaluate(record: &MetadataRecord, facts: &SourceFacts<'_>, vocabularies: &Vocabularies) -> Findings {
    let findings = match record {
        MetadataRecord::Image(meta) => image::evaluate(meta, facts, vocabularies),
        MetadataRecord::Pdf(meta) => pdf::evaluate(meta, facts),
        MetadataRecord::Audio(meta) => audio::evaluate(meta, facts, vocabularies),
        MetadataRecord::Video(meta) => video::evaluate(meta, facts),
        MetadataRecord::Docx(meta) => docx::evaluate(meta),
        MetadataRecord::Eml(meta) => eml::evaluate(meta),
        MetadataRecord::Txt(meta) => txt::evaluate(meta),
        MetadataRecord::Unavailable(u) => Findings::from_phases(
            Vec::new(),
            fallback_texts(u.kind).iter().map(|t| t.to_string()).collect(),
        ),
    };
    debug!(
        format = %record.kind(),
        anomalies = findings.in_phase(Phase::Anomaly).count(),
        total = findings.len(),
        "Rules evaluated"
    );
    findings
}


#[cfg(test)]
mod tests {
    use super::testing::facts;
    use super::*;

    #[test]
    fn test_unavailable_yields_fallback_for_every_format() {
        let vocab = Vocabularies::default();
        for kind in ExtractorKind::ALL {
            let record = MetadataRecord::unavailable(kind, kind.failure_message());
            let findings = evaluate(&record, &facts("x", "", 0), &vocab);
            let texts: Vec<&str> = findings.texts().collect();
            assert_eq!(texts, fallback_texts(kind), "{kind}");
        }
    }

    #[test]
    fn test_image_fallback_has_three_lines() {
        assert_eq!(fallback_texts(ExtractorKind::Image).len(), 3);
    }

    #[test]
    fn test_phases_are_concatenated_anomalies_first() {
        let findings = Findings::from_phases(vec!["a".into()], vec!["i1".into(), "i2".into()]);
        let texts: Vec<&str> = findings.texts().collect();
        assert_eq!(texts, ["a", "i1", "i2"]);
        assert_eq!(findings.in_phase(Phase::Anomaly).count(), 1);

        let json = serde_json::to_value(&findings).unwrap();
        assert_eq!(json[0]["phase"], "anomaly");
        assert_eq!(json[2]["text"], "i2");
    }
}
