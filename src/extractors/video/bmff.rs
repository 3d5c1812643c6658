// ISO base media file format (MP4, MOV, 3GP) box walker
//
// Only the boxes that feed the track map are decoded; everything else is
// skipped by size. Truncated boxes are clamped to the available bytes.

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::common::binary::{read_u16_at, read_u32_at, read_u64_at, read_u8_at, slice_at, Endian};
use crate::common::timefmt::format_utc;

use super::{format_decimal, MediaTrack, TrackKind};

const BE: Endian = Endian::Big;
/// Nesting guard for `meta`/`ilst` descent
const MAX_DEPTH: usize = 8;

/// Top-level box types that identify an ISO-BMFF stream
const TOP_LEVEL: [&[u8; 4]; 6] = [b"ftyp", b"moov", b"mdat", b"free", b"wide", b"skip"];

pub(super) fn is_bmff(bytes: &[u8]) -> bool {
    slice_at(bytes, 4, 4).map(|t| TOP_LEVEL.iter().any(|k| k.as_slice() == t)).unwrap_or(false)
}

// =============================================================================
// Box Iteration
// =============================================================================

struct BoxIter<'a> {
    data: &'a [u8],
    pos: usize,
}

fn boxes(data: &[u8]) -> BoxIter<'_> {
    BoxIter { data, pos: 0 }
}

impl<'a> Iterator for BoxIter<'a> {
    /// (type, payload)
    type Item = ([u8; 4], &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let remaining = self.data.len().checked_sub(self.pos)?;
        if remaining < 8 {
            return None;
        }
        let size32 = read_u32_at(self.data, self.pos, BE)? as u64;
        let mut kind = [0u8; 4];
        kind.copy_from_slice(slice_at(self.data, self.pos + 4, 4)?);

        let (header, size) = match size32 {
            0 => (8, remaining as u64),
            1 => (16, read_u64_at(self.data, self.pos + 8, BE)?),
            n => (8, n),
        };
        if size < header as u64 {
            return None;
        }
        let size = (size.min(remaining as u64)) as usize;
        let payload = self.data.get(self.pos + header..self.pos + size)?;
        self.pos += size;
        Some((kind, payload))
    }
}

fn child<'a>(data: &'a [u8], name: &[u8; 4]) -> Option<&'a [u8]> {
    boxes(data).find(|(kind, _)| kind == name).map(|(_, payload)| payload)
}

// =============================================================================
// Decoded Structures
// =============================================================================

#[derive(Debug, Default)]
struct TrackInfo {
    handler: [u8; 4],
    timescale: u32,
    duration: u64,
    sample_entry: Option<[u8; 4]>,
    width: Option<u16>,
    height: Option<u16>,
    profile: Option<String>,
    channels: Option<u16>,
    sample_rate: Option<u32>,
    sample_count: u64,
    /// (min, max) sample delta
    delta_range: Option<(u32, u32)>,
    stream_bytes: u64,
}

impl TrackInfo {
    fn duration_secs(&self) -> Option<f64> {
        (self.timescale > 0 && self.duration > 0).then(|| self.duration as f64 / self.timescale as f64)
    }
}

#[derive(Debug, Default)]
struct Movie {
    brand: Option<[u8; 4]>,
    timescale: u32,
    duration: u64,
    created: Option<DateTime<Utc>>,
    modified: Option<DateTime<Utc>>,
    mdat_bytes: u64,
    recorded_date: Option<String>,
    location: Option<String>,
    encoder: Option<String>,
    tracks: Vec<TrackInfo>,
}

/// Seconds since 1904-01-01 UTC; zero means "not set"
fn mac_time(secs: u64) -> Option<DateTime<Utc>> {
    if secs == 0 {
        return None;
    }
    let epoch = Utc.with_ymd_and_hms(1904, 1, 1, 0, 0, 0).single()?;
    epoch.checked_add_signed(Duration::seconds(i64::try_from(secs).ok()?))
}

// =============================================================================
// Parsing
// =============================================================================

pub(super) fn analyze(bytes: &[u8]) -> Result<Vec<MediaTrack>, String> {
    let mut movie = Movie::default();
    let mut saw_moov = false;

    for (kind, payload) in boxes(bytes) {
        match &kind {
            b"ftyp" => movie.brand = slice_at(payload, 0, 4).map(|b| [b[0], b[1], b[2], b[3]]),
            b"moov" => {
                saw_moov = true;
                parse_moov(payload, &mut movie);
            }
            b"mdat" => movie.mdat_bytes += payload.len() as u64,
            _ => {}
        }
    }

    if movie.brand.is_none() && !saw_moov {
        return Err("no ftyp or moov box".to_string());
    }
    Ok(to_tracks(&movie))
}

fn parse_moov(data: &[u8], movie: &mut Movie) {
    for (kind, payload) in boxes(data) {
        match &kind {
            b"mvhd" => parse_mvhd(payload, movie),
            b"trak" => movie.tracks.push(parse_trak(payload)),
            b"udta" => parse_udta(payload, movie, 0),
            b"meta" => parse_meta(payload, movie, 0),
            _ => {}
        }
    }
}

fn parse_mvhd(data: &[u8], movie: &mut Movie) {
    let version = read_u8_at(data, 0).unwrap_or(0);
    let (created, modified, timescale, duration) = if version == 1 {
        (
            read_u64_at(data, 4, BE),
            read_u64_at(data, 12, BE),
            read_u32_at(data, 20, BE),
            read_u64_at(data, 24, BE),
        )
    } else {
        (
            read_u32_at(data, 4, BE).map(u64::from),
            read_u32_at(data, 8, BE).map(u64::from),
            read_u32_at(data, 12, BE),
            read_u32_at(data, 16, BE).map(u64::from),
        )
    };
    movie.created = created.and_then(mac_time);
    movie.modified = modified.and_then(mac_time);
    movie.timescale = timescale.unwrap_or(0);
    movie.duration = duration.unwrap_or(0);
}

fn parse_trak(data: &[u8]) -> TrackInfo {
    let mut track = TrackInfo::default();
    let Some(mdia) = child(data, b"mdia") else {
        return track;
    };

    for (kind, payload) in boxes(mdia) {
        match &kind {
            b"hdlr" => {
                if let Some(h) = slice_at(payload, 8, 4) {
                    track.handler.copy_from_slice(h);
                }
            }
            b"mdhd" => {
                let version = read_u8_at(payload, 0).unwrap_or(0);
                if version == 1 {
                    track.timescale = read_u32_at(payload, 20, BE).unwrap_or(0);
                    track.duration = read_u64_at(payload, 24, BE).unwrap_or(0);
                } else {
                    track.timescale = read_u32_at(payload, 12, BE).unwrap_or(0);
                    track.duration = read_u32_at(payload, 16, BE).map(u64::from).unwrap_or(0);
                }
            }
            _ => {}
        }
    }

    if let Some(stbl) = child(mdia, b"minf").and_then(|minf| child(minf, b"stbl")) {
        for (kind, payload) in boxes(stbl) {
            match &kind {
                b"stsd" => parse_stsd(payload, &mut track),
                b"stts" => parse_stts(payload, &mut track),
                b"stsz" => parse_stsz(payload, &mut track),
                _ => {}
            }
        }
    }
    track
}

/// First sample entry of the sample description box
fn parse_stsd(data: &[u8], track: &mut TrackInfo) {
    // fullbox header + entry count, then sample entry boxes
    let Some(entries) = data.get(8..) else { return };
    let Some((kind, entry)) = boxes(entries).next() else { return };
    track.sample_entry = Some(kind);

    match &track.handler {
        b"vide" => {
            // 8 bytes SampleEntry + 16 bytes VisualSampleEntry preamble
            track.width = read_u16_at(entry, 24, BE).filter(|w| *w > 0);
            track.height = read_u16_at(entry, 26, BE).filter(|h| *h > 0);
            // codec configuration boxes follow the 78-byte visual entry body
            if let Some(avcc) = entry.get(78..).and_then(|rest| child(rest, b"avcC")) {
                track.profile = avc_profile(avcc);
            }
        }
        b"soun" => {
            track.channels = read_u16_at(entry, 16, BE).filter(|c| *c > 0);
            track.sample_rate = read_u32_at(entry, 24, BE).map(|r| r >> 16).filter(|r| *r > 0);
        }
        _ => {}
    }
}

fn parse_stts(data: &[u8], track: &mut TrackInfo) {
    let count = read_u32_at(data, 4, BE).unwrap_or(0) as usize;
    let mut range: Option<(u32, u32)> = None;
    let mut samples = 0u64;
    for i in 0..count {
        let off = 8 + i * 8;
        let (Some(n), Some(delta)) = (read_u32_at(data, off, BE), read_u32_at(data, off + 4, BE)) else {
            break;
        };
        samples += u64::from(n);
        if n == 0 || delta == 0 {
            continue;
        }
        range = Some(match range {
            Some((lo, hi)) => (lo.min(delta), hi.max(delta)),
            None => (delta, delta),
        });
    }
    track.delta_range = range;
    if track.sample_count == 0 {
        track.sample_count = samples;
    }
}

fn parse_stsz(data: &[u8], track: &mut TrackInfo) {
    let uniform = read_u32_at(data, 4, BE).unwrap_or(0);
    let count = read_u32_at(data, 8, BE).unwrap_or(0);
    track.sample_count = u64::from(count);
    track.stream_bytes = if uniform > 0 {
        u64::from(uniform) * u64::from(count)
    } else {
        (0..count as usize)
            .map_while(|i| read_u32_at(data, 12 + i * 4, BE))
            .map(u64::from)
            .sum()
    };
}

/// `avcC` profile and level, e.g. "High@L4" or "Main@L3.1"
fn avc_profile(avcc: &[u8]) -> Option<String> {
    let profile = match read_u8_at(avcc, 1)? {
        66 => "Baseline",
        77 => "Main",
        88 => "Extended",
        100 => "High",
        110 => "High 10",
        122 => "High 4:2:2",
        244 => "High 4:4:4 Predictive",
        _ => return None,
    };
    let level = read_u8_at(avcc, 3)?;
    let level = if level % 10 == 0 {
        format!("{}", level / 10)
    } else {
        format!("{}.{}", level / 10, level % 10)
    };
    Some(format!("{}@L{}", profile, level))
}

/// QuickTime user data: `©xyz`, `©too` and `©day` atoms, plus a nested `meta`
fn parse_udta(data: &[u8], movie: &mut Movie, depth: usize) {
    if depth > MAX_DEPTH {
        return;
    }
    for (kind, payload) in boxes(data) {
        match &kind {
            b"meta" => parse_meta(payload, movie, depth + 1),
            [0xA9, ..] => apply_item(movie, &kind, quicktime_text(payload)),
            _ => {}
        }
    }
}

/// `meta` is a full box in MP4 but a plain box in QuickTime files
fn parse_meta(data: &[u8], movie: &mut Movie, depth: usize) {
    if depth > MAX_DEPTH {
        return;
    }
    let body = if slice_at(data, 4, 4).map(|t| t == b"hdlr").unwrap_or(false) {
        data
    } else {
        data.get(4..).unwrap_or_default()
    };
    if let Some(ilst) = child(body, b"ilst") {
        for (kind, item) in boxes(ilst) {
            let value = child(item, b"data").and_then(|d| d.get(8..)).map(|v| String::from_utf8_lossy(v).trim().to_string());
            apply_item(movie, &kind, value);
        }
    }
}

/// `u16 length, u16 language, text`
fn quicktime_text(payload: &[u8]) -> Option<String> {
    let len = read_u16_at(payload, 0, BE)? as usize;
    let text = slice_at(payload, 4, len).or_else(|| payload.get(4..))?;
    Some(String::from_utf8_lossy(text).trim_end_matches('\0').trim().to_string())
}

fn apply_item(movie: &mut Movie, kind: &[u8; 4], value: Option<String>) {
    let Some(value) = value.filter(|v| !v.is_empty()) else { return };
    match &kind[1..] {
        b"xyz" => movie.location = Some(value),
        b"too" => movie.encoder = Some(value),
        b"day" => movie.recorded_date = Some(value),
        _ => {}
    }
}

// =============================================================================
// Track Map
// =============================================================================

fn container_name(brand: Option<[u8; 4]>) -> &'static str {
    match brand.as_ref().map(|b| b.as_slice()) {
        Some(b"qt  ") => "QuickTime",
        Some(b) if b.starts_with(b"3g") => "3GPP",
        _ => "MP4",
    }
}

fn codec_name(entry: &[u8; 4]) -> String {
    match entry {
        b"avc1" | b"avc3" => "AVC".to_string(),
        b"hvc1" | b"hev1" => "HEVC".to_string(),
        b"mp4v" => "MPEG-4 Visual".to_string(),
        b"av01" => "AV1".to_string(),
        b"vp09" => "VP9".to_string(),
        b"s263" => "H.263".to_string(),
        b"jpeg" => "JPEG".to_string(),
        b"apch" | b"apcn" | b"apcs" | b"apco" | b"ap4h" => "ProRes".to_string(),
        b"mp4a" => "AAC".to_string(),
        b"ac-3" => "AC-3".to_string(),
        b"ec-3" => "E-AC-3".to_string(),
        b"Opus" => "Opus".to_string(),
        b"alac" => "ALAC".to_string(),
        b"samr" => "AMR".to_string(),
        b".mp3" => "MPEG Audio".to_string(),
        b"lpcm" | b"sowt" | b"twos" => "PCM".to_string(),
        other => String::from_utf8_lossy(other).trim().to_string(),
    }
}

fn to_tracks(movie: &Movie) -> Vec<MediaTrack> {
    let mut general = MediaTrack::new(TrackKind::General);
    general.set("Format", container_name(movie.brand));

    let duration = (movie.timescale > 0 && movie.duration > 0)
        .then(|| movie.duration as f64 / movie.timescale as f64)
        .or_else(|| movie.tracks.iter().filter_map(TrackInfo::duration_secs).reduce(f64::max));
    if let Some(secs) = duration {
        general.set("Duration", format!("{:.3}", secs));
        if movie.mdat_bytes > 0 {
            general.set("OverallBitRate", ((movie.mdat_bytes as f64 * 8.0 / secs).round() as u64).to_string());
        }
    }
    general.set_opt("Encoded_Date", movie.created.as_ref().map(format_utc));
    general.set_opt("Tagged_Date", movie.modified.as_ref().map(format_utc));
    general.set_opt("Recorded_Date", movie.recorded_date.clone());
    general.set_opt("Recorded_Location", movie.location.clone());
    general.set_opt("Encoded_Library", movie.encoder.clone());

    let mut out = vec![general];
    for info in &movie.tracks {
        out.push(track_fields(info));
    }
    out
}

fn track_fields(info: &TrackInfo) -> MediaTrack {
    let kind = match &info.handler {
        b"vide" => TrackKind::Video,
        b"soun" => TrackKind::Audio,
        b"text" | b"sbtl" | b"subt" => TrackKind::Text,
        _ => TrackKind::Other,
    };
    let mut track = MediaTrack::new(kind);
    track.set_opt("Format", info.sample_entry.as_ref().map(codec_name));

    let secs = info.duration_secs();
    if let Some(secs) = secs {
        track.set("Duration", format!("{:.3}", secs));
        if info.stream_bytes > 0 {
            track.set("BitRate", ((info.stream_bytes as f64 * 8.0 / secs).round() as u64).to_string());
        }
    }

    match kind {
        TrackKind::Video => {
            track.set_opt("Format_Profile", info.profile.clone());
            if let (Some(w), Some(h)) = (info.width, info.height) {
                track.set("Width", w.to_string());
                track.set("Height", h.to_string());
                track.set("DisplayAspectRatio", format_decimal(f64::from(w) / f64::from(h)));
            }
            if matches!(info.sample_entry.as_ref(), Some(b"avc1" | b"avc3" | b"hvc1" | b"hev1" | b"av01" | b"vp09")) {
                track.set("ColorSpace", "YUV");
            }
            if let Some(secs) = secs.filter(|_| info.sample_count > 0) {
                track.set("FrameRate", format!("{:.3}", info.sample_count as f64 / secs));
            }
            if let Some((lo, hi)) = info.delta_range {
                if lo == hi {
                    track.set("FrameRate_Mode", "CFR");
                } else {
                    let scale = f64::from(info.timescale);
                    track.set("FrameRate_Mode", "VFR");
                    track.set("FrameRate_Minimum", format!("{:.3}", scale / f64::from(hi)));
                    track.set("FrameRate_Maximum", format!("{:.3}", scale / f64::from(lo)));
                }
            }
        }
        TrackKind::Audio => {
            track.set_opt("Channels", info.channels.map(|c| c.to_string()));
            track.set_opt("SamplingRate", info.sample_rate.map(|r| r.to_string()));
        }
        _ => {}
    }
    track
}


#[cfg(test)]
mod tests {
    use super::fixtures::{bx, mp4, VideoTrack};
    use super::*;

    fn cfr_track() -> VideoTrack {
        VideoTrack {
            width: 1920,
            height: 1080,
            timescale: 30_000,
            stts: vec![(300, 1000)],
            sample_size: 1000,
        }
    }

    fn general(tracks: &[MediaTrack]) -> &MediaTrack {
        tracks.iter().find(|t| t.kind == TrackKind::General).unwrap()
    }

    #[test]
    fn test_general_track() {
        let bytes = mp4(10, Some(cfr_track()), false, &[], 125_000);
        let tracks = analyze(&bytes).unwrap();
        let g = general(&tracks);
        assert_eq!(g.get("Format"), Some("MP4"));
        assert_eq!(g.get("Duration"), Some("10.000"));
        // 125000 bytes over 10 s
        assert_eq!(g.get("OverallBitRate"), Some("100000"));
        assert_eq!(g.get("Encoded_Date"), Some("2023-02-01 10:00:00 UTC"));
        assert_eq!(g.get("Encoded_Library"), None);
    }

    #[test]
    fn test_video_track_fields() {
        let tracks = analyze(&mp4(10, Some(cfr_track()), true, &[], 10)).unwrap();
        let video = tracks.iter().find(|t| t.kind == TrackKind::Video).unwrap();
        assert_eq!(video.get("Format"), Some("AVC"));
        assert_eq!(video.get("Format_Profile"), Some("High@L4"));
        assert_eq!(video.get("Width"), Some("1920"));
        assert_eq!(video.get("Height"), Some("1080"));
        assert_eq!(video.get("DisplayAspectRatio"), Some("1.778"));
        assert_eq!(video.get("FrameRate"), Some("30.000"));
        assert_eq!(video.get("FrameRate_Mode"), Some("CFR"));
        assert_eq!(video.get("ColorSpace"), Some("YUV"));

        let audio = tracks.iter().find(|t| t.kind == TrackKind::Audio).unwrap();
        assert_eq!(audio.get("Format"), Some("AAC"));
        assert_eq!(audio.get("Channels"), Some("2"));
        assert_eq!(audio.get("SamplingRate"), Some("48000"));
    }

    #[test]
    fn test_variable_frame_rate() {
        let track = VideoTrack {
            stts: vec![(100, 1000), (100, 2000)],
            ..cfr_track()
        };
        let tracks = analyze(&mp4(10, Some(track), false, &[], 10)).unwrap();
        let video = tracks.iter().find(|t| t.kind == TrackKind::Video).unwrap();
        assert_eq!(video.get("FrameRate_Mode"), Some("VFR"));
        assert_eq!(video.get("FrameRate_Minimum"), Some("15.000"));
        assert_eq!(video.get("FrameRate_Maximum"), Some("30.000"));
    }

    #[test]
    fn test_user_data_atoms() {
        let bytes = mp4(
            5,
            Some(cfr_track()),
            false,
            &[(b"\xA9xyz", "+37.3318-122.0312/"), (b"\xA9too", "Lavf58.76.100")],
            10,
        );
        let tracks = analyze(&bytes).unwrap();
        let g = general(&tracks);
        assert_eq!(g.get("Recorded_Location"), Some("+37.3318-122.0312/"));
        assert_eq!(g.get("Encoded_Library"), Some("Lavf58.76.100"));
    }

    #[test]
    fn test_audio_only_has_no_video_track() {
        let tracks = analyze(&mp4(5, None, true, &[], 10)).unwrap();
        assert!(tracks.iter().all(|t| t.kind != TrackKind::Video));
    }

    #[test]
    fn test_quicktime_brand() {
        let mut bytes = bx(b"ftyp", b"qt  \0\0\0\0qt  ");
        bytes.extend(bx(b"mdat", &[0; 4]));
        let tracks = analyze(&bytes).unwrap();
        assert_eq!(general(&tracks).get("Format"), Some("QuickTime"));
    }

    #[test]
    fn test_truncated_box_is_clamped() {
        let mut bytes = mp4(10, Some(cfr_track()), false, &[], 1000);
        bytes.truncate(bytes.len() - 500);
        let tracks = analyze(&bytes).unwrap();
        assert_eq!(general(&tracks).get("OverallBitRate"), Some("400"));
    }

    #[test]
    fn test_detection() {
        assert!(is_bmff(&bx(b"ftyp", b"isom")));
        assert!(!is_bmff(b"\x1A\x45\xDF\xA3 matroska"));
        assert!(analyze(b"garbage that is not boxes").is_err());
    }
}
