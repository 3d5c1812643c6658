// Matroska / WebM element walker
//
// Reads the EBML header, segment Info, Tracks and Tags. Cluster payloads
// are only measured for the overall bitrate.

use chrono::{Duration, TimeZone, Utc};

use crate::common::binary::{read_ascii, read_ebml_id, read_ebml_size, read_float_be, read_uint_be};
use crate::common::timefmt::format_utc;

use super::{format_decimal, MediaTrack, TrackKind};

const EBML_MAGIC: [u8; 4] = [0x1A, 0x45, 0xDF, 0xA3];

mod ids {
    pub const EBML: u32 = 0x1A45_DFA3;
    pub const DOC_TYPE: u32 = 0x4282;
    pub const SEGMENT: u32 = 0x1853_8067;

    pub const INFO: u32 = 0x1549_A966;
    pub const TIMECODE_SCALE: u32 = 0x2A_D7B1;
    pub const DURATION: u32 = 0x4489;
    pub const DATE_UTC: u32 = 0x4461;
    pub const TITLE: u32 = 0x7BA9;
    pub const MUXING_APP: u32 = 0x4D80;
    pub const WRITING_APP: u32 = 0x5741;

    pub const TRACKS: u32 = 0x1654_AE6B;
    pub const TRACK_ENTRY: u32 = 0xAE;
    pub const TRACK_TYPE: u32 = 0x83;
    pub const CODEC_ID: u32 = 0x86;
    pub const DEFAULT_DURATION: u32 = 0x23_E383;
    pub const VIDEO: u32 = 0xE0;
    pub const PIXEL_WIDTH: u32 = 0xB0;
    pub const PIXEL_HEIGHT: u32 = 0xBA;
    pub const DISPLAY_WIDTH: u32 = 0x54B0;
    pub const DISPLAY_HEIGHT: u32 = 0x54BA;
    pub const FLAG_INTERLACED: u32 = 0x9A;
    pub const AUDIO: u32 = 0xE1;
    pub const SAMPLING_FREQUENCY: u32 = 0xB5;
    pub const CHANNELS: u32 = 0x9F;

    pub const CLUSTER: u32 = 0x1F43_B675;

    pub const TAGS: u32 = 0x1254_C367;
    pub const TAG: u32 = 0x7373;
    pub const SIMPLE_TAG: u32 = 0x67C8;
    pub const TAG_NAME: u32 = 0x45A3;
    pub const TAG_STRING: u32 = 0x4487;
}

pub(super) fn is_ebml(bytes: &[u8]) -> bool {
    bytes.starts_with(&EBML_MAGIC)
}

/// Iterator over sibling elements. An unknown size runs to the end of the parent.
struct Elements<'a> {
    data: &'a [u8],
    pos: usize,
}

fn elements(data: &[u8]) -> Elements<'_> {
    Elements { data, pos: 0 }
}

impl<'a> Iterator for Elements<'a> {
    type Item = (u32, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let (id, id_len) = read_ebml_id(self.data, self.pos)?;
        let (size, size_len) = read_ebml_size(self.data, self.pos + id_len)?;
        let start = self.pos + id_len + size_len;
        if start > self.data.len() {
            return None;
        }
        let end = match size {
            Some(n) => usize::try_from(n).unwrap_or(usize::MAX).saturating_add(start).min(self.data.len()),
            None => self.data.len(),
        };
        self.pos = end;
        Some((id, &self.data[start..end]))
    }
}

#[derive(Debug, Default)]
struct Track {
    kind: u64,
    codec_id: Option<String>,
    default_duration_ns: Option<u64>,
    pixel: Option<(u64, u64)>,
    display: Option<(u64, u64)>,
    interlaced: Option<u64>,
    sampling_frequency: Option<f64>,
    channels: Option<u64>,
}

#[derive(Debug, Default)]
struct Segment {
    timecode_scale: Option<u64>,
    duration: Option<f64>,
    date_utc: Option<i64>,
    title: Option<String>,
    muxing_app: Option<String>,
    writing_app: Option<String>,
    tracks: Vec<Track>,
    cluster_bytes: u64,
    tags: Vec<(String, String)>,
}

fn text(payload: &[u8]) -> Option<String> {
    Some(read_ascii(payload)).filter(|s| !s.is_empty())
}

pub(super) fn analyze(bytes: &[u8]) -> Result<Vec<MediaTrack>, String> {
    let mut doc_type = None;
    let mut segment = None;

    for (id, payload) in elements(bytes) {
        match id {
            ids::EBML => {
                doc_type = elements(payload).find(|(id, _)| *id == ids::DOC_TYPE).and_then(|(_, p)| text(p));
            }
            ids::SEGMENT => segment = Some(parse_segment(payload)),
            _ => {}
        }
    }

    let doc_type = doc_type.ok_or("EBML header without DocType")?;
    let segment = segment.ok_or("no Matroska segment")?;
    Ok(to_tracks(&doc_type, &segment))
}

fn parse_segment(data: &[u8]) -> Segment {
    let mut seg = Segment::default();
    for (id, payload) in elements(data) {
        match id {
            ids::INFO => parse_info(payload, &mut seg),
            ids::TRACKS => {
                seg.tracks = elements(payload)
                    .filter(|(id, _)| *id == ids::TRACK_ENTRY)
                    .map(|(_, entry)| parse_track(entry))
                    .collect();
            }
            ids::CLUSTER => seg.cluster_bytes += payload.len() as u64,
            ids::TAGS => parse_tags(payload, &mut seg),
            _ => {}
        }
    }
    seg
}

fn parse_info(data: &[u8], seg: &mut Segment) {
    for (id, payload) in elements(data) {
        match id {
            ids::TIMECODE_SCALE => seg.timecode_scale = read_uint_be(payload),
            ids::DURATION => seg.duration = read_float_be(payload),
            ids::DATE_UTC => seg.date_utc = read_uint_be(payload).map(|v| v as i64),
            ids::TITLE => seg.title = text(payload),
            ids::MUXING_APP => seg.muxing_app = text(payload),
            ids::WRITING_APP => seg.writing_app = text(payload),
            _ => {}
        }
    }
}

fn parse_track(data: &[u8]) -> Track {
    let mut track = Track::default();
    for (id, payload) in elements(data) {
        match id {
            ids::TRACK_TYPE => track.kind = read_uint_be(payload).unwrap_or(0),
            ids::CODEC_ID => track.codec_id = text(payload),
            ids::DEFAULT_DURATION => track.default_duration_ns = read_uint_be(payload).filter(|d| *d > 0),
            ids::VIDEO => {
                let (mut pw, mut ph, mut dw, mut dh) = (None, None, None, None);
                for (id, p) in elements(payload) {
                    match id {
                        ids::PIXEL_WIDTH => pw = read_uint_be(p),
                        ids::PIXEL_HEIGHT => ph = read_uint_be(p),
                        ids::DISPLAY_WIDTH => dw = read_uint_be(p),
                        ids::DISPLAY_HEIGHT => dh = read_uint_be(p),
                        ids::FLAG_INTERLACED => track.interlaced = read_uint_be(p),
                        _ => {}
                    }
                }
                track.pixel = pw.zip(ph);
                track.display = dw.zip(dh);
            }
            ids::AUDIO => {
                for (id, p) in elements(payload) {
                    match id {
                        ids::SAMPLING_FREQUENCY => track.sampling_frequency = read_float_be(p),
                        ids::CHANNELS => track.channels = read_uint_be(p),
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }
    track
}

fn parse_tags(data: &[u8], seg: &mut Segment) {
    for (_, tag) in elements(data).filter(|(id, _)| *id == ids::TAG) {
        for (_, simple) in elements(tag).filter(|(id, _)| *id == ids::SIMPLE_TAG) {
            let mut name = None;
            let mut value = None;
            for (id, p) in elements(simple) {
                match id {
                    ids::TAG_NAME => name = text(p),
                    ids::TAG_STRING => value = text(p),
                    _ => {}
                }
            }
            if let (Some(name), Some(value)) = (name, value) {
                seg.tags.push((name.to_uppercase(), value));
            }
        }
    }
}

fn codec_name(codec_id: &str) -> String {
    let name = match codec_id {
        "V_MPEG4/ISO/AVC" => "AVC",
        "V_MPEGH/ISO/HEVC" => "HEVC",
        "V_VP8" => "VP8",
        "V_VP9" => "VP9",
        "V_AV1" => "AV1",
        "V_MPEG2" => "MPEG Video",
        "V_THEORA" => "Theora",
        "A_OPUS" => "Opus",
        "A_VORBIS" => "Vorbis",
        "A_AC3" => "AC-3",
        "A_EAC3" => "E-AC-3",
        "A_FLAC" => "FLAC",
        "A_MPEG/L3" => "MPEG Audio",
        "S_TEXT/UTF8" => "UTF-8",
        "S_TEXT/ASS" => "ASS",
        id if id.starts_with("A_AAC") => "AAC",
        id if id.starts_with("A_PCM") => "PCM",
        other => return other.to_string(),
    };
    name.to_string()
}

fn to_tracks(doc_type: &str, seg: &Segment) -> Vec<MediaTrack> {
    let mut general = MediaTrack::new(TrackKind::General);
    general.set("Format", if doc_type.eq_ignore_ascii_case("webm") { "WebM" } else { "Matroska" });

    let scale = seg.timecode_scale.unwrap_or(1_000_000) as f64;
    let secs = seg.duration.map(|d| d * scale / 1e9).filter(|s| *s > 0.0 && s.is_finite());
    if let Some(secs) = secs {
        general.set("Duration", format!("{:.3}", secs));
        if seg.cluster_bytes > 0 {
            general.set("OverallBitRate", ((seg.cluster_bytes as f64 * 8.0 / secs).round() as u64).to_string());
        }
    }

    // DateUTC counts nanoseconds from 2001-01-01T00:00:00 UTC
    let encoded = seg.date_utc.and_then(|ns| {
        let epoch = Utc.with_ymd_and_hms(2001, 1, 1, 0, 0, 0).single()?;
        epoch.checked_add_signed(Duration::nanoseconds(ns))
    });
    general.set_opt("Encoded_Date", encoded.as_ref().map(format_utc));
    general.set_opt("Title", seg.title.clone());
    general.set_opt("Encoded_Application", seg.writing_app.clone());

    let tag = |name: &str| seg.tags.iter().find(|(n, _)| n == name).map(|(_, v)| v.clone());
    general.set_opt("Encoded_Library", seg.muxing_app.clone().or_else(|| tag("ENCODER")));
    general.set_opt("Recorded_Date", tag("DATE_RECORDED"));

    let mut out = vec![general];
    out.extend(seg.tracks.iter().map(track_fields));
    out
}

fn track_fields(info: &Track) -> MediaTrack {
    let kind = match info.kind {
        1 => TrackKind::Video,
        2 => TrackKind::Audio,
        17 => TrackKind::Text,
        _ => TrackKind::Other,
    };
    let mut track = MediaTrack::new(kind);
    track.set_opt("Format", info.codec_id.as_deref().map(codec_name));
    track.set_opt("CodecID", info.codec_id.clone());

    match kind {
        TrackKind::Video => {
            if let Some((w, h)) = info.pixel {
                track.set("Width", w.to_string());
                track.set("Height", h.to_string());
            }
            if let Some((w, h)) = info.display.or(info.pixel).filter(|(_, h)| *h > 0) {
                track.set("DisplayAspectRatio", format_decimal(w as f64 / h as f64));
            }
            if let Some(ns) = info.default_duration_ns {
                track.set("FrameRate", format!("{:.3}", 1e9 / ns as f64));
                track.set("FrameRate_Mode", "CFR");
            }
            match info.interlaced {
                Some(1) => track.set("ScanType", "Interlaced"),
                Some(2) => track.set("ScanType", "Progressive"),
                _ => {}
            }
        }
        TrackKind::Audio => {
            track.set_opt("Channels", info.channels.map(|c| c.to_string()));
            track.set_opt("SamplingRate", info.sampling_frequency.map(format_decimal));
        }
        _ => {}
    }
    track
}

#[cfg(test)]
pub(crate) mod fixtures {
    /// Element with an 8-byte size field
    pub fn el(id: u32, payload: &[u8]) -> Vec<u8> {
        let id_bytes = id.to_be_bytes();
        let skip = id_bytes.iter().position(|b| *b != 0).unwrap_or(3);
        let mut out = id_bytes[skip..].to_vec();
        out.push(0x01);
        out.extend_from_slice(&(payload.len() as u64).to_be_bytes()[1..]);
        out.extend_from_slice(payload);
        out
    }

    pub fn uint(id: u32, value: u64) -> Vec<u8> {
        el(id, &value.to_be_bytes())
    }

    pub fn float(id: u32, value: f64) -> Vec<u8> {
        el(id, &value.to_be_bytes())
    }

    pub fn string(id: u32, value: &str) -> Vec<u8> {
        el(id, value.as_bytes())
    }

    /// WebM/Matroska file: VP9 or AVC video track, Opus audio, `cluster_len` media bytes
    pub fn mkv(doc_type: &str, duration_ms: f64, width: u64, height: u64, cluster_len: usize) -> Vec<u8> {
        let header = el(0x1A45_DFA3, &string(0x4282, doc_type));
        let info = el(
            0x1549_A966,
            &[
                uint(0x2A_D7B1, 1_000_000),
                float(0x4489, duration_ms),
                // 2023-02-01 10:00:00 UTC
                uint(0x4461, 696_938_400_000_000_000),
                string(0x4D80, "Lavf60.3.100"),
                string(0x5741, "Lavf60.3.100"),
            ]
            .concat(),
        );
        let video = el(
            0xAE,
            &[
                uint(0x83, 1),
                string(0x86, "V_MPEG4/ISO/AVC"),
                uint(0x23_E383, 40_000_000),
                el(0xE0, &[uint(0xB0, width), uint(0xBA, height), uint(0x9A, 2)].concat()),
            ]
            .concat(),
        );
        let audio = el(
            0xAE,
            &[uint(0x83, 2), string(0x86, "A_OPUS"), el(0xE1, &[float(0xB5, 48_000.0), uint(0x9F, 2)].concat())].concat(),
        );
        let tracks = el(0x1654_AE6B, &[video, audio].concat());
        let cluster = el(0x1F43_B675, &vec![0; cluster_len]);
        let segment = el(0x1853_8067, &[info, tracks, cluster].concat());
        [header, segment].concat()
    }
}
