//! Audio stream properties and common tags

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::io::Cursor;

use lofty::file::{FileType, TaggedFileExt};
use lofty::prelude::*;
use lofty::probe::Probe;
use lofty::tag::ItemKey;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::primitives::AudioProbe;
use crate::source::ByteSource;

use super::ExtractFailure;

/// What an [`AudioProbe`] recovers. Absent values are `None`, never zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioProperties {
    pub duration_secs: Option<f64>,
    pub bitrate_bps: Option<u32>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u8>,
    pub codec: Option<String>,
    pub container: Option<String>,
    pub encoder: Option<String>,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub comment: Option<String>,
    pub tags: BTreeMap<String, String>,
}

impl AudioProperties {
    fn is_empty(&self) -> bool {
        self.duration_secs.is_none()
            && self.bitrate_bps.is_none()
            && self.sample_rate.is_none()
            && self.codec.is_none()
            && self.container.is_none()
            && self.tags.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioMetadata {
    /// Seconds
    pub duration: Option<f64>,
    /// Bits per second
    pub bitrate: Option<u32>,
    pub sample_rate: Option<u32>,
    pub channel_count: Option<u8>,
    pub codec: Option<String>,
    pub container: Option<String>,
    pub encoder: Option<String>,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub comment: Option<String>,
    pub raw: BTreeMap<String, String>,
}

impl From<AudioProperties> for AudioMetadata {
    fn from(p: AudioProperties) -> Self {
        Self {
            duration: p.duration_secs.filter(|d| *d > 0.0),
            bitrate: p.bitrate_bps.filter(|b| *b > 0),
            sample_rate: p.sample_rate.filter(|s| *s > 0),
            channel_count: p.channels.filter(|c| *c > 0),
            codec: p.codec,
            container: p.container,
            encoder: p.encoder,
            title: p.title,
            artist: p.artist,
            album: p.album,
            genre: p.genre,
            comment: p.comment,
            raw: p.tags,
        }
    }
}

pub(super) fn extract(source: &ByteSource, probe: &dyn AudioProbe) -> Result<AudioMetadata, ExtractFailure> {
    let props = probe.probe(source.bytes()).map_err(ExtractFailure::Parse)?;
    if props.is_empty() {
        return Err(ExtractFailure::Empty);
    }
    Ok(props.into())
}

// =============================================================================
// lofty-backed Probe
// =============================================================================

/// Built-in [`AudioProbe`] on top of `lofty`
#[derive(Debug, Clone, Copy, Default)]
pub struct LoftyProbe;

impl AudioProbe for LoftyProbe {
    fn probe(&self, bytes: &[u8]) -> Result<AudioProperties, String> {
        let tagged_file = Probe::new(Cursor::new(bytes))
            .guess_file_type()
            .map_err(|e| e.to_string())?
            .read()
            .map_err(|e| e.to_string())?;

        let properties = tagged_file.properties();
        let duration = properties.duration().as_secs_f64();
        // lofty reports bitrates in kbps
        let bitrate_kbps = properties.audio_bitrate().or(properties.overall_bitrate());

        let (container, codec) = describe_format(tagged_file.file_type(), bytes);

        let mut out = AudioProperties {
            duration_secs: Some(duration).filter(|d| *d > 0.0),
            bitrate_bps: bitrate_kbps.filter(|b| *b > 0).map(|b| b * 1000),
            sample_rate: properties.sample_rate(),
            channels: properties.channels(),
            codec,
            container,
            ..AudioProperties::default()
        };

        if let Some(tag) = tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) {
            out.title = tag_text(tag.title());
            out.artist = tag_text(tag.artist());
            out.album = tag_text(tag.album());
            out.genre = tag_text(tag.genre());
            out.comment = tag_text(tag.comment());
            out.encoder = tag
                .get_string(&ItemKey::EncoderSoftware)
                .or_else(|| tag.get_string(&ItemKey::EncoderSettings))
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty());

            for item in tag.items() {
                if let Some(value) = item.value().text() {
                    out.tags.insert(format!("{:?}", item.key()), value.to_string());
                }
            }
        }

        debug!(
            file_type = ?tagged_file.file_type(),
            duration_s = duration,
            bitrate_kbps = ?bitrate_kbps,
            "Audio probed"
        );
        Ok(out)
    }
}

fn tag_text(value: Option<Cow<'_, str>>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// (container, codec) names for a probed file type
fn describe_format(file_type: FileType, bytes: &[u8]) -> (Option<String>, Option<String>) {
    let (container, codec): (&str, String) = match file_type {
        FileType::Mpeg => ("MPEG", mpeg_codec(bytes).unwrap_or_else(|| "MPEG Audio".to_string())),
        FileType::Flac => ("FLAC", "FLAC".to_string()),
        FileType::Wav => ("WAVE", "PCM".to_string()),
        FileType::Aiff => ("AIFF", "PCM".to_string()),
        FileType::Vorbis => ("Ogg", "Vorbis I".to_string()),
        FileType::Opus => ("Ogg", "Opus".to_string()),
        FileType::Speex => ("Ogg", "Speex".to_string()),
        FileType::Mp4 => ("MPEG-4", "AAC".to_string()),
        FileType::Aac => ("ADTS", "AAC".to_string()),
        FileType::Ape => ("Monkey's Audio", "APE".to_string()),
        FileType::WavPack => ("WavPack", "WavPack".to_string()),
        FileType::Mpc => ("Musepack", "Musepack".to_string()),
        _ => return (None, None),
    };
    (Some(container.to_string()), Some(codec))
}

/// "MPEG {version} Layer {layer}" from the first frame header after any ID3v2 tag
fn mpeg_codec(bytes: &[u8]) -> Option<String> {
    let mut start = 0;
    if bytes.starts_with(b"ID3") && bytes.len() >= 10 {
        let size = bytes[6..10].iter().fold(0usize, |acc, b| (acc << 7) | usize::from(b & 0x7F));
        start = 10 + size;
    }

    let window = bytes.get(start..)?;
    let pos = window
        .windows(2)
        .take(64 * 1024)
        .position(|w| w[0] == 0xFF && w[1] & 0xE0 == 0xE0 && (w[1] >> 1) & 0x03 != 0)?;
    let b1 = window[pos + 1];

    let version = match (b1 >> 3) & 0x03 {
        0 => "2.5",
        2 => "2",
        3 => "1",
        _ => return None,
    };
    let layer = match (b1 >> 1) & 0x03 {
        1 => 3,
        2 => 2,
        3 => 1,
        _ => return None,
    };
    Some(format!("MPEG {} Layer {}", version, layer))
}
