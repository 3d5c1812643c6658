use std::cmp::Ordering;

use chrono::{DateTime, FixedOffset, Utc};

use crate::common::timefmt::{format_utc, parse_pdf_date};
use crate::extractors::PdfMetadata;

use super::{Findings, Passes, SourceFacts};

/// PDF findings are descriptive only: dates, producer fields, then facts
pub(super) fn evaluate(meta: &PdfMetadata, facts: &SourceFacts<'_>) -> Findings {
    let mut passes = Passes::default();
    interpretation(meta, facts, &mut passes);
    document_facts(meta, &mut passes);
    passes.finish()
}

fn parse(value: &Option<String>) -> Option<DateTime<FixedOffset>> {
    value.as_deref().and_then(parse_pdf_date)
}

fn interpretation(meta: &PdfMetadata, facts: &SourceFacts<'_>, passes: &mut Passes) {
    if let Some(title) = &meta.title {
        passes.note(format!("Document title recorded as \"{title}\"."));
    }
    if let Some(author) = &meta.author {
        passes.note(format!("Author field recorded as \"{author}\"."));
    }
    if let Some(creator) = &meta.creator {
        passes.note(format!("Creator application identified as \"{creator}\"."));
    }
    if let Some(producer) = &meta.producer {
        passes.note(format!("PDF producer software identified as \"{producer}\"."));
    }
    if meta.creator.is_none() && meta.producer.is_none() {
        passes.note("Standard PDF software identification fields (Creator/Producer) are not present.");
    }

    let created = parse(&meta.creation_date);
    let modified = parse(&meta.mod_date);

    if let Some(created) = created {
        passes.note(format!("PDF internal creation date recorded as {}.", format_utc(&created)));
    }
    if let Some(modified) = modified {
        passes.note(format!("PDF internal modification date recorded as {}.", format_utc(&modified)));
    }

    if let (Some(created), Some(modified)) = (created, modified) {
        passes.note(match modified.cmp(&created) {
            Ordering::Greater => "The modification date is chronologically later than the creation date.",
            Ordering::Less => "The modification date is chronologically earlier than the creation date.",
            Ordering::Equal => "The creation and modification timestamps are identical.",
        });
    }

    let file_system = facts.last_modified;
    if let Some(modified) = modified.map(|d| d.with_timezone(&Utc)) {
        passes.note(format!(
            "File system last modified timestamp recorded as {}.",
            format_utc(&file_system)
        ));
        passes.note(match file_system.cmp(&modified) {
            Ordering::Greater => "The file system modification timestamp is later than the internal PDF modification date.",
            Ordering::Less => "The file system modification timestamp is earlier than the internal PDF modification date.",
            Ordering::Equal => "The file system and internal modification timestamps are consistent.",
        });
    }
    if let Some(created) = created.map(|d| d.with_timezone(&Utc)) {
        passes.note(match file_system.cmp(&created) {
            Ordering::Greater => "The file system modification timestamp is later than the internal PDF creation date.",
            Ordering::Less => "The file system modification timestamp predates the internal PDF creation date.",
            Ordering::Equal => "The file system modification timestamp matches the internal PDF creation date.",
        });
    }
}

fn document_facts(meta: &PdfMetadata, passes: &mut Passes) {
    if let (Some(created), Some(modified)) = (parse(&meta.creation_date), parse(&meta.mod_date)) {
        let minutes = ((modified - created).num_seconds() as f64 / 60.0).round() as i64;
        passes.note(format!(
            "Time difference between creation and modification: {minutes} minutes."
        ));
    }

    passes.note(if meta.is_signed {
        "Digital signatures: Present."
    } else {
        "Digital signatures: Not present."
    });
    passes.note(if meta.has_acro_form { "Forms present: Yes." } else { "Forms present: No." });
    match &meta.encryption_filter {
        Some(filter) => passes.note(format!("Encryption: {filter}.")),
        None => passes.note("Encryption: None."),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::super::testing::facts;
    use super::super::Phase;
    use super::*;

    fn meta(created: Option<&str>, modified: Option<&str>) -> PdfMetadata {
        PdfMetadata {
            pdf_version: Some("1.7".into()),
            title: Some("Quarterly".into()),
            author: Some("Finance".into()),
            subject: None,
            keywords: None,
            creator: None,
            producer: Some("LibreOffice 7.5".into()),
            creation_date: created.map(str::to_string),
            mod_date: modified.map(str::to_string),
            trapped: None,
            is_signed: false,
            has_acro_form: true,
            encryption_filter: None,
            page_count: Some(3),
            file_size: 2048,
            has_xmp: false,
            raw: BTreeMap::new(),
        }
    }

    #[test]
    fn test_no_anomaly_phase() {
        let findings = evaluate(&meta(None, None), &facts("a.pdf", "application/pdf", 2048));
        assert_eq!(findings.in_phase(Phase::Anomaly).count(), 0);
    }

    #[test]
    fn test_descriptive_lines_in_order() {
        let m = meta(Some("D:20230101100000+01'00'"), Some("D:20230101103000Z"));
        let findings = evaluate(&m, &facts("a.pdf", "application/pdf", 2048));
        let texts: Vec<&str> = findings.texts().collect();
        assert_eq!(
            texts,
            [
                "Document title recorded as \"Quarterly\".",
                "Author field recorded as \"Finance\".",
                "PDF producer software identified as \"LibreOffice 7.5\".",
                "PDF internal creation date recorded as 2023-01-01 09:00:00 UTC.",
                "PDF internal modification date recorded as 2023-01-01 10:30:00 UTC.",
                "The modification date is chronologically later than the creation date.",
                "File system last modified timestamp recorded as 2023-05-01 12:00:00 UTC.",
                "The file system modification timestamp is later than the internal PDF modification date.",
                "The file system modification timestamp is later than the internal PDF creation date.",
                "Time difference between creation and modification: 90 minutes.",
                "Digital signatures: Not present.",
                "Forms present: Yes.",
                "Encryption: None.",
            ]
        );
    }

    #[test]
    fn test_missing_producer_fields_and_identical_dates() {
        let mut m = meta(Some("D:20230101100000Z"), Some("D:20230101100000Z"));
        m.producer = None;
        m.is_signed = true;
        m.encryption_filter = Some("Standard".into());
        let findings = evaluate(&m, &facts("a.pdf", "application/pdf", 2048));
        assert!(findings.contains("Standard PDF software identification fields (Creator/Producer) are not present."));
        assert!(findings.contains("The creation and modification timestamps are identical."));
        assert!(findings.contains("Time difference between creation and modification: 0 minutes."));
        assert!(findings.contains("Digital signatures: Present."));
        assert!(findings.contains("Encryption: Standard."));
    }

    #[test]
    fn test_file_system_comparison_honours_pdf_offsets() {
        // 14:00 at +02:00 is the file-system timestamp of 12:00 UTC
        let m = meta(Some("D:20230501140000+02'00'"), Some("D:20230501100000-03'00'"));
        let findings = evaluate(&m, &facts("a.pdf", "application/pdf", 2048));
        assert!(findings.contains("The file system modification timestamp matches the internal PDF creation date."));
        assert!(findings.contains("The file system modification timestamp is earlier than the internal PDF modification date."));
        assert!(findings.contains("Time difference between creation and modification: 60 minutes."));
    }

    #[test]
    fn test_unparseable_dates_are_skipped() {
        let m = meta(Some("yesterday"), None);
        let findings = evaluate(&m, &facts("a.pdf", "application/pdf", 2048));
        assert!(!findings.texts().any(|t| t.contains("creation date")));
        assert!(!findings.texts().any(|t| t.starts_with("Time difference")));
    }
}
