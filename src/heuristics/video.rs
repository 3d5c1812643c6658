use crate::extractors::VideoMetadata;

use super::{Findings, Passes, SourceFacts};

const BITRATE_TOLERANCE: f64 = 0.15;
const FRAME_RATE_SPREAD: f64 = 10.0;
const LOW_RESOLUTION_PIXELS: u64 = 300_000;

pub(super) fn evaluate(meta: &VideoMetadata, facts: &SourceFacts<'_>) -> Findings {
    let mut passes = Passes::default();

    let container = meta.container.as_deref().unwrap_or("").to_lowercase();
    let mismatch = match facts.extension().as_deref() {
        Some("mp4") => !container.contains("mp4"),
        Some("mkv") => !container.contains("matroska"),
        _ => false,
    };
    if mismatch {
        passes.flag("File extension and internal container format mismatch detected.");
    }

    if meta.video_stream_count == 0 {
        passes.flag("No video stream structure was detected inside the container.");
    }

    if let (Some(duration), Some(bitrate)) = (meta.duration, meta.bitrate) {
        if duration > 0.0 && meta.file_size > 0 && bitrate > 0 {
            let declared = bitrate as f64;
            let calculated = meta.file_size as f64 * 8.0 / duration;
            if (calculated - declared).abs() > declared * BITRATE_TOLERANCE {
                passes.flag(
                    "Calculated bitrate derived from file size and duration differs from the bitrate declared in metadata.",
                );
            }
            passes.note(
                "File size, duration, and overall bitrate were mathematically compared to evaluate internal structural consistency.",
            );
        }
    }

    if meta.encoder.is_none() {
        passes.flag("Encoding software information is not present within metadata fields.");
    }

    if meta.frame_rate_mode.as_deref() == Some("VFR") {
        if let (Some(min), Some(max)) = (meta.frame_rate_min, meta.frame_rate_max) {
            if (max - min).abs() > FRAME_RATE_SPREAD {
                passes.flag("A wide variation between minimum and maximum frame rate values was identified.");
            }
            passes.note(
                "Frame rate mode indicates variable frame rate behavior, meaning frames are not captured at uniform time intervals.",
            );
        }
    }

    if let (Some(width), Some(height), Some(ratio)) = (meta.width, meta.height, &meta.aspect_ratio) {
        passes.note(format!(
            "Video resolution recorded as {width} x {height} pixels with display aspect ratio {ratio}."
        ));
    }

    match &meta.creation_time {
        Some(time) => passes.note(format!(
            "Video container creation or encoding timestamp recorded as {time}."
        )),
        None => passes.note("No creation or encoding timestamp metadata was identified."),
    }

    passes.note(format!(
        "Container structure contains {} video stream(s) and {} audio stream(s).",
        meta.video_stream_count, meta.audio_stream_count
    ));

    if let (Some(lat), Some(lon)) = (&meta.latitude, &meta.longitude) {
        passes.note(format!(
            "Geolocation metadata recorded with latitude {lat} and longitude {lon}."
        ));
        // Resolution is only judged for geotagged files. The coupling has no
        // known rationale and is kept until the rule is revisited.
        if let (Some(width), Some(height)) = (meta.width, meta.height) {
            if u64::from(width) * u64::from(height) < LOW_RESOLUTION_PIXELS {
                passes.flag("Low resolution detected. Possible compression or re-encoding.");
            }
        }
    }

    passes.finish()
}
