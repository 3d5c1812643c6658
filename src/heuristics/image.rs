use chrono::Duration;

use crate::common::timefmt::{format_naive, format_time_difference, parse_exif_datetime};
use crate::config::Vocabularies;
use crate::extractors::ImageMetadata;

use super::{Findings, Passes, SourceFacts};

const NO_ANOMALIES: &str = "No significant forensic anomalies detected.";

pub(super) fn evaluate(meta: &ImageMetadata, facts: &SourceFacts<'_>, vocabularies: &Vocabularies) -> Findings {
    let mut passes = Passes::default();
    anomalies(meta, facts, vocabularies, &mut passes);
    if passes.anomalies.is_empty() {
        passes.flag(NO_ANOMALIES);
    }
    interpretation(meta, &mut passes);
    passes.finish()
}

fn anomalies(meta: &ImageMetadata, facts: &SourceFacts<'_>, vocabularies: &Vocabularies, passes: &mut Passes) {
    if let Some(software) = &meta.software {
        let lower = software.to_lowercase();
        if vocabularies
            .image_editors
            .iter()
            .any(|editor| !editor.is_empty() && lower.contains(&editor.to_lowercase()))
        {
            passes.flag(format!("Software metadata field present: {software}."));
        }
    }

    if let Some(tool) = meta.creator_tool_display() {
        passes.flag(format!("CreatorTool metadata field present: {tool}."));
    }

    if meta.camera.is_none() {
        passes.flag("Camera information missing.");
    }
    if meta.date_taken.is_none() {
        passes.flag("Capture date missing.");
    }
    if meta.gps.is_some() {
        passes.flag("GPS location data embedded.");
    }

    let missing = [
        meta.camera.is_none(),
        meta.date_taken.is_none(),
        meta.software.is_none(),
        meta.gps.is_none(),
    ]
    .iter()
    .filter(|&&absent| absent)
    .count();
    if missing >= 3 {
        passes.flag("Metadata appears partially stripped.");
    }

    let is_jpeg_name = matches!(facts.extension().as_deref(), Some("jpg" | "jpeg"));
    if is_jpeg_name && facts.declared_mime != "image/jpeg" {
        passes.flag("File extension does not match MIME type.");
    }
}

fn interpretation(meta: &ImageMetadata, passes: &mut Passes) {
    match &meta.camera {
        Some(camera) => passes.note(format!("The image metadata indicates it was captured using: {camera}.")),
        None => passes.note("No camera device information was identified in the metadata."),
    }

    match &meta.date_taken {
        Some(raw) => {
            let shown = parse_exif_datetime(raw).map(|d| format_naive(&d)).unwrap_or_else(|| raw.clone());
            passes.note(format!("The recorded capture date is {shown}."));
        }
        None => passes.note("No original capture date was identified in the metadata."),
    }

    if let Some(software) = &meta.software {
        passes.note(format!("Metadata indicates the file was processed using: {software}."));
    }
    if let Some(tool) = meta.creator_tool_display() {
        passes.note(format!(
            "The file contains metadata indicating it was created or exported using: {tool}."
        ));
    }

    let parse = |value: &Option<String>| value.as_deref().and_then(parse_exif_datetime);
    let (created, captured, modified) = (parse(&meta.create_date), parse(&meta.date_taken), parse(&meta.modify_date));

    if let (Some(created), Some(captured)) = (created, captured) {
        let formatted = format_time_difference(created - captured);
        if created < captured {
            passes.note(format!(
                "The file system creation timestamp predates the recorded capture date by approximately {formatted}. \
This chronological inconsistency may indicate manual metadata alteration or system-level timestamp modification."
            ));
        } else if created > captured {
            passes.note(format!(
                "The file appears to have been created approximately {formatted} after the recorded capture time, \
suggesting the image may have been transferred, exported, or processed after capture."
            ));
        }
    }

    if let (Some(created), Some(modified)) = (created, modified) {
        let delta = modified - created;
        if delta != Duration::zero() {
            let formatted = format_time_difference(delta);
            if modified < created {
                passes.note(format!(
                    "The last modification timestamp predates the file system creation timestamp by approximately {formatted}. \
This anomaly may indicate metadata tampering or clock manipulation."
                ));
            } else {
                passes.note(format!(
                    "The file was modified approximately {formatted} after creation, \
indicating post-capture editing or re-saving activity."
                ));
            }
        }
    }

    if meta.gps.is_some() {
        passes.note("Geographical location information is embedded within the image metadata.");
    } else {
        passes.note("No geographical location information was identified in the metadata.");
    }
}
