use tracing::warn;

use crate::config::Vocabularies;
use crate::extractors::AudioMetadata;

use super::{Findings, Passes, SourceFacts};

/// Allowed relative gap between bitrate × duration and the real size
const SIZE_TOLERANCE_PERCENT: f64 = 15.0;
/// Below this bitrate the stream counts as heavily compressed
const LOW_BITRATE_BPS: u32 = 64_000;
const CONSUMER_KBPS: [u32; 3] = [128, 192, 320];

pub(super) fn evaluate(meta: &AudioMetadata, facts: &SourceFacts<'_>, vocabularies: &Vocabularies) -> Findings {
    let mut passes = Passes::default();
    anomalies(meta, facts, vocabularies, &mut passes);
    interpretation(meta, facts, &mut passes);
    passes.finish()
}

/// Gap between expected and actual size as a percentage of the actual size
fn size_deviation_percent(meta: &AudioMetadata, actual_size: u64) -> Option<f64> {
    let bitrate = meta.bitrate?;
    let duration = meta.duration?;
    if actual_size == 0 {
        return None;
    }
    let expected = f64::from(bitrate) * duration / 8.0;
    let actual = actual_size as f64;
    Some((expected - actual).abs() / actual * 100.0)
}

fn kbps(bitrate: u32) -> u32 {
    (f64::from(bitrate) / 1000.0).round() as u32
}

fn anomalies(meta: &AudioMetadata, facts: &SourceFacts<'_>, vocabularies: &Vocabularies, passes: &mut Passes) {
    if size_deviation_percent(meta, facts.size).is_some_and(|pct| pct > SIZE_TOLERANCE_PERCENT) {
        passes.flag("File size does not match expected size based on bitrate and duration.");
    }

    match vocabularies.distribution_pattern() {
        Ok(Some(pattern)) => {
            let tagged = [&meta.title, &meta.artist, &meta.album]
                .into_iter()
                .flatten()
                .any(|value| pattern.is_match(value));
            if tagged {
                passes.flag(
                    "Distribution-related metadata tags were identified. \
These tags indicate prior processing or platform-based handling.",
                );
            }
        }
        Ok(None) => {}
        Err(e) => warn!(error = %e, "Distribution tag pattern is invalid; rule skipped"),
    }

    let mpeg = meta.codec.as_deref().is_some_and(|c| c.to_lowercase().contains("mpeg"));
    if mpeg && meta.encoder.is_none() {
        passes.flag(
            "MPEG audio detected without encoder information. \
Metadata structure appears altered (partially stripped).",
        );
    }

    if let Some(bitrate) = meta.bitrate {
        if bitrate < LOW_BITRATE_BPS {
            passes.flag("Audio stream exhibits reduced bitrate. Compression level appears elevated.");
        }
        if CONSUMER_KBPS.contains(&kbps(bitrate)) {
            passes.flag("Detected parameters correspond to standard consumer-level production environments.");
        }
    }
}

fn interpretation(meta: &AudioMetadata, facts: &SourceFacts<'_>, passes: &mut Passes) {
    match (&meta.codec, &meta.container) {
        (Some(codec), Some(container)) => passes.note(format!(
            "The file is an {codec} audio file contained within an {container} container."
        )),
        (Some(codec), None) => passes.note(format!("The audio encoding format is {codec}.")),
        (None, _) => passes.note("The file format could not be automatically determined."),
    }

    if facts.size > 0 {
        let megabytes = facts.size as f64 / (1024.0 * 1024.0);
        passes.note(format!("The file size is approximately {megabytes:.2} MB."));
    }

    if let Some(duration) = meta.duration {
        let minutes = (duration / 60.0).floor();
        let seconds = (duration % 60.0).round();
        passes.note(format!(
            "The audio duration is approximately {minutes} minutes and {seconds} seconds."
        ));
    }

    if let Some(bitrate) = meta.bitrate {
        passes.note(format!(
            "The average audio quality level (bitrate) is approximately {} kbps, \
which reflects the level of compression applied to the file.",
            kbps(bitrate)
        ));
    }

    match &meta.encoder {
        Some(encoder) => passes.note(format!("Metadata indicates the file was processed using {encoder}.")),
        None => passes.note(
            "No information about the specific software used to create or export this file was found in the metadata.",
        ),
    }

    if let Some(rate) = meta.sample_rate {
        passes.note(format!(
            "The sampling rate is {rate} Hz, which is standard for consumer audio recordings."
        ));
    }

    if meta.title.is_some() || meta.artist.is_some() || meta.album.is_some() {
        passes.note("Descriptive information such as title, artist, or album is embedded within the file metadata.");
    } else {
        passes.note("No descriptive title or artist information was identified in the metadata.");
    }

    if let Some(pct) = size_deviation_percent(meta, facts.size) {
        passes.note(format!(
            "The calculated file size based on duration and bitrate differs from the actual file size by approximately {pct:.2}%. \
Minor variations can occur due to compression structure and metadata overhead."
        ));
    }
}
