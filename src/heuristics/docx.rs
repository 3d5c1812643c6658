use chrono::Duration;

use crate::common::timefmt::{format_utc, parse_iso8601};
use crate::extractors::DocxMetadata;

use super::{Findings, Passes};

const NO_IRREGULARITIES: &str =
    "No metadata structural irregularities were identified based on the extracted document properties.";

pub(super) fn evaluate(meta: &DocxMetadata) -> Findings {
    let mut passes = Passes::default();
    anomalies(meta, &mut passes);
    if passes.anomalies.is_empty() {
        passes.flag(NO_IRREGULARITIES);
    }
    interpretation(meta, &mut passes);
    passes.finish()
}

fn anomalies(meta: &DocxMetadata, passes: &mut Passes) {
    let created = meta.created.as_deref().and_then(parse_iso8601);
    let modified = meta.modified.as_deref().and_then(parse_iso8601);
    if let (Some(created), Some(modified)) = (created, modified) {
        let delta = modified - created;
        if delta != Duration::zero() {
            passes.flag("Creation and modification timestamps are not identical.");
            if delta.num_seconds().abs() > Duration::days(365).num_seconds() {
                passes.flag("A significant temporal interval exists between creation and modification timestamps.");
            }
        }
    }

    match (&meta.creator, &meta.last_modified_by) {
        (None, _) => passes.flag("Creator metadata field is not present in the document properties."),
        (Some(creator), Some(editor)) if creator != editor => {
            passes.flag("Creator and Last Modified By metadata fields contain different values.")
        }
        _ => {}
    }
}

fn timestamp(raw: &str) -> String {
    parse_iso8601(raw).map(|d| format_utc(&d)).unwrap_or_else(|| raw.to_string())
}

fn interpretation(meta: &DocxMetadata, passes: &mut Passes) {
    match &meta.created {
        Some(raw) => passes.note(format!("Creation timestamp recorded as: {}.", timestamp(raw))),
        None => passes.note("Creation timestamp metadata field not present."),
    }
    match &meta.modified {
        Some(raw) => passes.note(format!("Modification timestamp recorded as: {}.", timestamp(raw))),
        None => passes.note("Modification timestamp metadata field not present."),
    }
    match &meta.creator {
        Some(creator) => passes.note(format!("Creator metadata field value: {creator}.")),
        None => passes.note("Creator metadata field not available."),
    }
    match &meta.last_modified_by {
        Some(editor) => passes.note(format!("Last Modified By metadata field value: {editor}.")),
        None => passes.note("Last Modified By metadata field not available."),
    }
    match &meta.revision {
        Some(revision) => passes.note(format!("Revision number recorded as: {revision}.")),
        None => passes.note("Revision number metadata field not present."),
    }
}

#[cfg(test)]
mod tests {
    use super::super::Phase;
    use super::*;
    use crate::extractors::docx::DocxRaw;

    fn meta(creator: Option<&str>, editor: Option<&str>, created: &str, modified: &str) -> DocxMetadata {
        DocxMetadata {
            title: None,
            creator: creator.map(str::to_string),
            last_modified_by: editor.map(str::to_string),
            created: Some(created.to_string()),
            modified: Some(modified.to_string()),
            revision: Some("4".into()),
            application: None,
            raw: DocxRaw {
                core_xml: String::new(),
                app_xml: None,
            },
        }
    }

    #[test]
    fn test_long_interval_flags_in_order() {
        let m = meta(Some("Alice"), Some("Alice"), "2020-01-01T00:00:00Z", "2021-06-01T00:00:00Z");
        let findings = evaluate(&m);
        let anomalies: Vec<&str> = findings.in_phase(Phase::Anomaly).collect();
        assert_eq!(
            anomalies,
            [
                "Creation and modification timestamps are not identical.",
                "A significant temporal interval exists between creation and modification timestamps.",
            ]
        );
    }

    #[test]
    fn test_clean_document() {
        let m = meta(Some("Alice"), Some("Alice"), "2020-01-01T00:00:00Z", "2020-01-01T00:00:00Z");
        let findings = evaluate(&m);
        let texts: Vec<&str> = findings.texts().collect();
        assert_eq!(
            texts,
            [
                NO_IRREGULARITIES,
                "Creation timestamp recorded as: 2020-01-01 00:00:00 UTC.",
                "Modification timestamp recorded as: 2020-01-01 00:00:00 UTC.",
                "Creator metadata field value: Alice.",
                "Last Modified By metadata field value: Alice.",
                "Revision number recorded as: 4.",
            ]
        );
    }

    #[test]
    fn test_author_fields() {
        let findings = evaluate(&meta(None, Some("Bob"), "2020-01-01T00:00:00Z", "2020-01-02T00:00:00Z"));
        assert!(findings.contains("Creator metadata field is not present in the document properties."));
        assert!(findings.contains("Creator metadata field not available."));
        assert!(!findings.contains("A significant temporal interval exists between creation and modification timestamps."));

        let findings = evaluate(&meta(Some("Alice"), Some("Bob"), "2020-01-01T00:00:00Z", "2020-01-01T00:00:00Z"));
        assert!(findings.contains("Creator and Last Modified By metadata fields contain different values."));
    }

    #[test]
    fn test_unparseable_timestamp_shown_raw() {
        let findings = evaluate(&meta(Some("A"), Some("A"), "sometime", "2020-01-01T00:00:00Z"));
        assert!(findings.contains("Creation timestamp recorded as: sometime."));
        assert!(!findings.contains("Creation and modification timestamps are not identical."));
    }
}
