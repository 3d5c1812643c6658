//! Video container analysis
//!
//! The container is decoded into MediaInfo-style tracks: exactly one
//! `General` track plus one track per elementary stream, each carrying a
//! field map with the familiar key names (`Format`, `OverallBitRate`,
//! `FrameRate_Mode`, `Recorded_Location`, ...). The record is then derived
//! from the general track and the first video / audio track.

mod bmff;
mod matroska;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::common::patterns::signed_decimal_regex;
use crate::primitives::MediaAnalyzer;
use crate::source::ByteSource;

use super::ExtractFailure;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackKind {
    General,
    Video,
    Audio,
    Text,
    Other,
}

/// One container track with its attribute map
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaTrack {
    #[serde(rename = "@type")]
    pub kind: TrackKind,
    pub fields: BTreeMap<String, String>,
}

impl MediaTrack {
    pub fn new(kind: TrackKind) -> Self {
        Self {
            kind,
            fields: BTreeMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }

    /// Set a field; empty values are dropped
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        if !value.trim().is_empty() {
            self.fields.insert(key.to_string(), value.trim().to_string());
        }
    }

    pub fn set_opt(&mut self, key: &str, value: Option<impl Into<String>>) {
        if let Some(v) = value {
            self.set(key, v);
        }
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.set(key, value);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoMetadata {
    pub file_name: String,
    pub file_size: u64,
    /// Seconds
    pub duration: Option<f64>,
    /// Overall bits per second as declared by the container
    pub bitrate: Option<u64>,
    pub container: Option<String>,
    pub creation_time: Option<String>,
    pub codec: Option<String>,
    pub profile: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frame_rate: Option<f64>,
    pub frame_rate_mode: Option<String>,
    pub frame_rate_min: Option<f64>,
    pub frame_rate_max: Option<f64>,
    pub encoder: Option<String>,
    pub writing_library: Option<String>,
    pub audio_codec: Option<String>,
    pub audio_bitrate: Option<u64>,
    pub color_space: Option<String>,
    pub scan_type: Option<String>,
    pub aspect_ratio: Option<String>,
    pub video_stream_count: usize,
    pub audio_stream_count: usize,
    pub gps: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub raw: Vec<MediaTrack>,
}

/// Leading integer part, the way `parseInt` reads "1234.5 bps"
fn parse_int(value: &str) -> Option<u64> {
    let digits: String = value.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

fn parse_float(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

impl VideoMetadata {
    pub fn from_tracks(tracks: Vec<MediaTrack>, file_name: &str, file_size: u64) -> Result<Self, String> {
        let general = tracks
            .iter()
            .find(|t| t.kind == TrackKind::General)
            .ok_or("container analysis produced no general track")?;
        let videos: Vec<&MediaTrack> = tracks.iter().filter(|t| t.kind == TrackKind::Video).collect();
        let audios: Vec<&MediaTrack> = tracks.iter().filter(|t| t.kind == TrackKind::Audio).collect();

        let video = videos.first();
        let audio = audios.first();
        let video_field = |key: &str| video.and_then(|t| t.get(key)).map(str::to_string);

        let gps = general.get("Recorded_Location").map(str::to_string);
        let (latitude, longitude) = gps
            .as_deref()
            .map(|loc| {
                let mut numbers = signed_decimal_regex().find_iter(loc).map(|m| m.as_str().to_string());
                match (numbers.next(), numbers.next()) {
                    (Some(lat), Some(lon)) => (Some(lat), Some(lon)),
                    _ => (None, None),
                }
            })
            .unwrap_or((None, None));

        let creation_time = general
            .get("Recorded_Date")
            .or_else(|| general.get("Encoded_Date"))
            .or_else(|| general.get("Tagged_Date"))
            .map(str::to_string);

        Ok(Self {
            file_name: file_name.to_string(),
            file_size,
            duration: general.get("Duration").and_then(parse_float),
            bitrate: general.get("OverallBitRate").and_then(parse_int),
            container: general.get("Format").map(str::to_string),
            creation_time,
            codec: video_field("Format"),
            profile: video_field("Format_Profile"),
            width: video.and_then(|t| t.get("Width")).and_then(parse_int).map(|v| v as u32),
            height: video.and_then(|t| t.get("Height")).and_then(parse_int).map(|v| v as u32),
            frame_rate: video.and_then(|t| t.get("FrameRate")).and_then(parse_float),
            frame_rate_mode: video_field("FrameRate_Mode"),
            frame_rate_min: video.and_then(|t| t.get("FrameRate_Minimum")).and_then(parse_float),
            frame_rate_max: video.and_then(|t| t.get("FrameRate_Maximum")).and_then(parse_float),
            encoder: general.get("Encoded_Library").map(str::to_string),
            writing_library: video_field("Encoded_Library"),
            audio_codec: audio.and_then(|t| t.get("Format")).map(str::to_string),
            audio_bitrate: audio.and_then(|t| t.get("BitRate")).and_then(parse_int),
            color_space: video_field("ColorSpace"),
            scan_type: video_field("ScanType"),
            aspect_ratio: video_field("DisplayAspectRatio"),
            video_stream_count: videos.len(),
            audio_stream_count: audios.len(),
            gps,
            latitude,
            longitude,
            raw: tracks,
        })
    }
}

pub(super) fn extract(source: &ByteSource, analyzer: &dyn MediaAnalyzer) -> Result<VideoMetadata, ExtractFailure> {
    let tracks = analyzer.analyze(source.bytes()).map_err(ExtractFailure::Parse)?;
    VideoMetadata::from_tracks(tracks, source.name(), source.size()).map_err(ExtractFailure::Parse)
}

// =============================================================================
// Built-in Analyzer
// =============================================================================

/// Built-in [`MediaAnalyzer`] for ISO-BMFF (MP4, MOV, 3GP, M4V) and
/// Matroska / WebM
#[derive(Debug, Clone, Copy, Default)]
pub struct ContainerAnalyzer;

impl MediaAnalyzer for ContainerAnalyzer {
    fn analyze(&self, bytes: &[u8]) -> Result<Vec<MediaTrack>, String> {
        let tracks = if matroska::is_ebml(bytes) {
            matroska::analyze(bytes)?
        } else if bmff::is_bmff(bytes) {
            bmff::analyze(bytes)?
        } else {
            return Err("unsupported media container".to_string());
        };
        debug!(tracks = tracks.len(), "Container analysed");
        Ok(tracks)
    }
}

/// `"{:.3}"` with trailing zeros removed, the way MediaInfo renders rates
pub(crate) fn format_decimal(value: f64) -> String {
    let s = format!("{:.3}", value);
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn general() -> MediaTrack {
        MediaTrack::new(TrackKind::General)
            .with("Format", "MP4")
            .with("Duration", "100.000")
            .with("OverallBitRate", "850000")
            .with("Encoded_Date", "2023-02-01 10:00:00 UTC")
    }

    #[test]
    fn test_record_from_tracks() {
        let tracks = vec![
            general().with("Recorded_Location", "+37.3318-122.0312/"),
            MediaTrack::new(TrackKind::Video)
                .with("Format", "AVC")
                .with("Width", "1920")
                .with("Height", "1080")
                .with("FrameRate_Mode", "VFR")
                .with("FrameRate_Minimum", "15.000")
                .with("FrameRate_Maximum", "30.000"),
            MediaTrack::new(TrackKind::Video).with("Format", "HEVC"),
            MediaTrack::new(TrackKind::Audio).with("Format", "AAC").with("BitRate", "128000"),
        ];
        let meta = VideoMetadata::from_tracks(tracks, "clip.mp4", 10_000_000).unwrap();
        assert_eq!(meta.duration, Some(100.0));
        assert_eq!(meta.bitrate, Some(850_000));
        assert_eq!(meta.codec.as_deref(), Some("AVC"));
        assert_eq!((meta.width, meta.height), (Some(1920), Some(1080)));
        assert_eq!(meta.frame_rate_min, Some(15.0));
        assert_eq!(meta.video_stream_count, 2);
        assert_eq!(meta.audio_stream_count, 1);
        assert_eq!(meta.audio_bitrate, Some(128_000));
        assert_eq!(meta.creation_time.as_deref(), Some("2023-02-01 10:00:00 UTC"));
        assert_eq!(meta.latitude.as_deref(), Some("+37.3318"));
        assert_eq!(meta.longitude.as_deref(), Some("-122.0312"));
    }

    #[test]
    fn test_location_needs_two_numbers() {
        let tracks = vec![general().with("Recorded_Location", "+37.3318/")];
        let meta = VideoMetadata::from_tracks(tracks, "clip.mp4", 1).unwrap();
        assert_eq!(meta.gps.as_deref(), Some("+37.3318/"));
        assert_eq!(meta.latitude, None);
        assert_eq!(meta.longitude, None);
    }

    #[test]
    fn test_recorded_date_wins() {
        let tracks = vec![general().with("Recorded_Date", "2022-12-24")];
        let meta = VideoMetadata::from_tracks(tracks, "clip.mp4", 1).unwrap();
        assert_eq!(meta.creation_time.as_deref(), Some("2022-12-24"));
    }

    #[test]
    fn test_missing_general_track_fails() {
        let tracks = vec![MediaTrack::new(TrackKind::Video)];
        assert!(VideoMetadata::from_tracks(tracks, "x.mp4", 1).is_err());
    }

    #[test]
    fn test_unknown_container_fails() {
        assert!(ContainerAnalyzer.analyze(b"RIFF....AVI LIST").is_err());
    }

    #[test]
    fn test_format_decimal() {
        assert_eq!(format_decimal(29.97002997), "29.97");
        assert_eq!(format_decimal(25.0), "25");
        assert_eq!(format_decimal(1.7777), "1.778");
    }
}
