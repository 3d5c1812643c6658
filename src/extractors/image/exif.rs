// EXIF / TIFF reader
//
// Locates the TIFF structure inside the common image containers and walks
// IFD0, the Exif sub-IFD and the GPS sub-IFD. Only tags with a name in the
// tables below are kept.
//
// Container layouts:
// - JPEG: APP1 segment starting "Exif\0\0" (XMP in APP1 "http://ns.adobe.com/xap/1.0/\0")
// - TIFF: the file itself
// - PNG:  eXIf chunk (XMP in iTXt keyword "XML:com.adobe.xmp")
// - WebP: RIFF "EXIF" chunk (XMP in "XMP " chunk)
// - HEIF: ISO-BMFF; the Exif item is found by scanning for its header

use std::collections::{BTreeMap, HashSet};

use tracing::trace;

use crate::common::binary::{read_ascii, read_u16_at, read_u32_at, slice_at, Endian};

use super::xmp;

const EXIF_HEADER: &[u8] = b"Exif\0\0";
const XMP_APP1_HEADER: &[u8] = b"http://ns.adobe.com/xap/1.0/\0";
const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

const TAG_EXIF_IFD: u16 = 0x8769;
const TAG_GPS_IFD: u16 = 0x8825;

const MAX_IFD_ENTRIES: usize = 1024;
const MAX_VALUE_BYTES: usize = 64 * 1024;

/// Metadata blocks found in an image container
#[derive(Debug, Default)]
pub(super) struct Blocks<'a> {
    pub tiff: Option<&'a [u8]>,
    pub xmp: Option<&'a [u8]>,
}

// =============================================================================
// Container Location
// =============================================================================

/// Locate the EXIF and XMP blocks. Fails for containers this reader does not
/// understand (GIF, BMP, ...).
pub(super) fn locate(data: &[u8]) -> Result<Blocks<'_>, String> {
    if data.starts_with(&[0xFF, 0xD8]) {
        return Ok(locate_jpeg(data));
    }
    if data.starts_with(b"II*\0") || data.starts_with(b"MM\0*") {
        return Ok(Blocks {
            tiff: Some(data),
            xmp: xmp::find_packet(data),
        });
    }
    if data.starts_with(PNG_SIGNATURE) {
        return Ok(locate_png(data));
    }
    if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        return Ok(locate_webp(data));
    }
    if data.len() >= 8 && &data[4..8] == b"ftyp" {
        return Ok(locate_heif(data));
    }
    Err("unsupported image container".to_string())
}

fn locate_jpeg(data: &[u8]) -> Blocks<'_> {
    let mut blocks = Blocks::default();
    let mut pos = 2;

    while pos + 4 <= data.len() {
        if data[pos] != 0xFF {
            trace!(pos, "JPEG marker expected, stopping segment walk");
            break;
        }
        let marker = data[pos + 1];
        match marker {
            0xFF => {
                pos += 1;
                continue;
            }
            // SOS: entropy-coded data follows; EOI: end of image
            0xDA | 0xD9 => break,
            0x01 | 0xD0..=0xD7 => {
                pos += 2;
                continue;
            }
            _ => {}
        }

        let Some(seg_len) = read_u16_at(data, pos + 2, Endian::Big).map(usize::from) else {
            break;
        };
        if seg_len < 2 {
            break;
        }
        let Some(payload) = slice_at(data, pos + 4, seg_len - 2) else {
            break;
        };

        if marker == 0xE1 {
            if let Some(tiff) = payload.strip_prefix(EXIF_HEADER) {
                blocks.tiff.get_or_insert(tiff);
            } else if let Some(packet) = payload.strip_prefix(XMP_APP1_HEADER) {
                blocks.xmp.get_or_insert(packet);
            }
        }
        pos += 2 + seg_len;
    }

    blocks
}

fn locate_png(data: &[u8]) -> Blocks<'_> {
    let mut blocks = Blocks::default();
    let mut pos = PNG_SIGNATURE.len();

    while let Some(len) = read_u32_at(data, pos, Endian::Big).map(|l| l as usize) {
        let Some(kind) = slice_at(data, pos + 4, 4) else { break };
        let Some(body) = slice_at(data, pos + 8, len) else { break };

        match kind {
            b"eXIf" => {
                blocks.tiff.get_or_insert(body);
            }
            b"iTXt" => {
                if let Some(packet) = png_itxt_xmp(body) {
                    blocks.xmp.get_or_insert(packet);
                }
            }
            b"IEND" => break,
            _ => {}
        }
        pos += 12 + len;
    }

    blocks
}

/// Uncompressed iTXt chunk carrying the XMP keyword
fn png_itxt_xmp(body: &[u8]) -> Option<&[u8]> {
    let rest = body.strip_prefix(b"XML:com.adobe.xmp\0")?;
    // compression flag, compression method
    if *rest.first()? != 0 {
        return None;
    }
    let rest = rest.get(2..)?;
    // language tag, translated keyword
    let lang_end = rest.iter().position(|&b| b == 0)?;
    let rest = &rest[lang_end + 1..];
    let translated_end = rest.iter().position(|&b| b == 0)?;
    Some(&rest[translated_end + 1..])
}

fn locate_webp(data: &[u8]) -> Blocks<'_> {
    let mut blocks = Blocks::default();
    let mut pos = 12;

    while let Some(len) = read_u32_at(data, pos + 4, Endian::Little).map(|l| l as usize) {
        let Some(fourcc) = slice_at(data, pos, 4) else { break };
        let Some(body) = slice_at(data, pos + 8, len) else { break };

        match fourcc {
            b"EXIF" => {
                blocks.tiff.get_or_insert(body.strip_prefix(EXIF_HEADER).unwrap_or(body));
            }
            b"XMP " => {
                blocks.xmp.get_or_insert(body);
            }
            _ => {}
        }
        // chunks are padded to even length
        pos += 8 + len + (len & 1);
    }

    blocks
}

fn locate_heif(data: &[u8]) -> Blocks<'_> {
    let tiff = data
        .windows(EXIF_HEADER.len())
        .position(|w| w == EXIF_HEADER)
        .map(|i| &data[i + EXIF_HEADER.len()..])
        .filter(|t| t.starts_with(b"II*\0") || t.starts_with(b"MM\0*"));
    Blocks {
        tiff,
        xmp: xmp::find_packet(data),
    }
}

// =============================================================================
// Tag Tables
// =============================================================================

fn primary_tag_name(tag: u16) -> Option<&'static str> {
    Some(match tag {
        0x0100 => "ImageWidth",
        0x0101 => "ImageHeight",
        0x010E => "ImageDescription",
        0x010F => "Make",
        0x0110 => "Model",
        0x0112 => "Orientation",
        0x011A => "XResolution",
        0x011B => "YResolution",
        0x0128 => "ResolutionUnit",
        0x0131 => "Software",
        0x0132 => "ModifyDate",
        0x013B => "Artist",
        0x8298 => "Copyright",
        _ => return None,
    })
}

fn exif_tag_name(tag: u16) -> Option<&'static str> {
    Some(match tag {
        0x829A => "ExposureTime",
        0x829D => "FNumber",
        0x8827 => "ISO",
        0x9003 => "DateTimeOriginal",
        0x9004 => "CreateDate",
        0x9010 => "OffsetTime",
        0x9011 => "OffsetTimeOriginal",
        0x920A => "FocalLength",
        0xA002 => "ExifImageWidth",
        0xA003 => "ExifImageHeight",
        0xA420 => "ImageUniqueID",
        0xA430 => "CameraOwnerName",
        0xA431 => "BodySerialNumber",
        0xA433 => "LensMake",
        0xA434 => "LensModel",
        _ => return None,
    })
}

fn gps_tag_name(tag: u16) -> Option<&'static str> {
    Some(match tag {
        0x0001 => "GPSLatitudeRef",
        0x0002 => "GPSLatitude",
        0x0003 => "GPSLongitudeRef",
        0x0004 => "GPSLongitude",
        0x0005 => "GPSAltitudeRef",
        0x0006 => "GPSAltitude",
        0x0007 => "GPSTimeStamp",
        0x001D => "GPSDateStamp",
        _ => return None,
    })
}

// =============================================================================
// IFD Walking
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum TagValue {
    Ascii(String),
    Unsigned(Vec<u32>),
    Signed(Vec<i32>),
    Rational(Vec<(u32, u32)>),
    SignedRational(Vec<(i32, i32)>),
}

impl TagValue {
    fn first_unsigned(&self) -> Option<u32> {
        match self {
            TagValue::Unsigned(v) => v.first().copied(),
            _ => None,
        }
    }

    fn render(&self) -> String {
        fn join<T: ToString>(items: impl Iterator<Item = T>) -> String {
            items.map(|i| i.to_string()).collect::<Vec<_>>().join(", ")
        }
        match self {
            TagValue::Ascii(s) => s.clone(),
            TagValue::Unsigned(v) => join(v.iter()),
            TagValue::Signed(v) => join(v.iter()),
            TagValue::Rational(v) => join(v.iter().map(|&(n, d)| ratio(n as f64, d as f64))),
            TagValue::SignedRational(v) => join(v.iter().map(|&(n, d)| ratio(n as f64, d as f64))),
        }
    }

    fn as_degrees(&self) -> Option<f64> {
        let TagValue::Rational(parts) = self else { return None };
        let mut total = 0.0;
        for (i, &(n, d)) in parts.iter().take(3).enumerate() {
            if d == 0 {
                return None;
            }
            total += n as f64 / d as f64 / 60f64.powi(i as i32);
        }
        Some(total)
    }
}

fn ratio(n: f64, d: f64) -> f64 {
    if d == 0.0 {
        0.0
    } else {
        n / d
    }
}

/// Decoded EXIF content
#[derive(Debug, Default)]
pub(super) struct ExifData {
    pub tags: BTreeMap<String, String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Clone, Copy)]
enum Ifd {
    Primary,
    Exif,
    Gps,
}

impl Ifd {
    fn tag_name(self, tag: u16) -> Option<&'static str> {
        match self {
            Ifd::Primary => primary_tag_name(tag),
            Ifd::Exif => exif_tag_name(tag),
            Ifd::Gps => gps_tag_name(tag),
        }
    }
}

struct TiffReader<'a> {
    data: &'a [u8],
    endian: Endian,
    visited: HashSet<usize>,
}

impl<'a> TiffReader<'a> {
    fn read_entry(&self, offset: usize) -> Option<(u16, TagValue)> {
        let (data, endian) = (self.data, self.endian);
        let tag = read_u16_at(data, offset, endian)?;
        let kind = read_u16_at(data, offset + 2, endian)?;
        let count = read_u32_at(data, offset + 4, endian)? as usize;

        let unit = match kind {
            1 | 2 | 6 | 7 => 1,
            3 | 8 => 2,
            4 | 9 => 4,
            5 | 10 => 8,
            _ => return None,
        };
        let total = unit * count;
        if count == 0 || total > MAX_VALUE_BYTES {
            return None;
        }
        let value_offset = if total <= 4 {
            offset + 8
        } else {
            read_u32_at(data, offset + 8, endian)? as usize
        };
        let raw = slice_at(data, value_offset, total)?;

        let value = match kind {
            2 => TagValue::Ascii(read_ascii(raw)),
            1 => TagValue::Unsigned(raw.iter().map(|&b| u32::from(b)).collect()),
            3 => TagValue::Unsigned(
                (0..count)
                    .filter_map(|i| read_u16_at(raw, i * 2, endian).map(u32::from))
                    .collect(),
            ),
            4 => TagValue::Unsigned((0..count).filter_map(|i| read_u32_at(raw, i * 4, endian)).collect()),
            8 => TagValue::Signed(
                (0..count)
                    .filter_map(|i| read_u16_at(raw, i * 2, endian).map(|v| i32::from(v as i16)))
                    .collect(),
            ),
            9 => TagValue::Signed(
                (0..count)
                    .filter_map(|i| read_u32_at(raw, i * 4, endian).map(|v| v as i32))
                    .collect(),
            ),
            5 => TagValue::Rational(
                (0..count)
                    .filter_map(|i| Some((read_u32_at(raw, i * 8, endian)?, read_u32_at(raw, i * 8 + 4, endian)?)))
                    .collect(),
            ),
            10 => TagValue::SignedRational(
                (0..count)
                    .filter_map(|i| {
                        Some((
                            read_u32_at(raw, i * 8, endian)? as i32,
                            read_u32_at(raw, i * 8 + 4, endian)? as i32,
                        ))
                    })
                    .collect(),
            ),
            // SBYTE / UNDEFINED carry opaque payloads (MakerNote, versions)
            _ => return None,
        };
        Some((tag, value))
    }

    /// Read one IFD; returns every decoded (tag, value) pair, named or not
    fn read_ifd(&mut self, offset: usize) -> Vec<(u16, TagValue)> {
        if offset == 0 || !self.visited.insert(offset) {
            return Vec::new();
        }
        let Some(count) = read_u16_at(self.data, offset, self.endian).map(usize::from) else {
            return Vec::new();
        };
        trace!(offset, count, "Reading IFD");

        (0..count.min(MAX_IFD_ENTRIES))
            .filter_map(|i| self.read_entry(offset + 2 + i * 12))
            .collect()
    }
}

/// Decode a TIFF structure (starting at its byte-order mark)
pub(super) fn parse_tiff(data: &[u8]) -> Result<ExifData, String> {
    let endian = match data.get(0..2) {
        Some(b"II") => Endian::Little,
        Some(b"MM") => Endian::Big,
        _ => return Err("invalid TIFF byte order".to_string()),
    };
    if read_u16_at(data, 2, endian) != Some(42) {
        return Err("invalid TIFF magic".to_string());
    }
    let ifd0 = read_u32_at(data, 4, endian).ok_or("truncated TIFF header")? as usize;

    let mut reader = TiffReader {
        data,
        endian,
        visited: HashSet::new(),
    };
    let mut out = ExifData::default();

    let primary = reader.read_ifd(ifd0);
    let mut pointers = Vec::new();
    for (tag, value) in primary {
        match tag {
            TAG_EXIF_IFD => pointers.extend(value.first_unsigned().map(|o| (Ifd::Exif, o as usize))),
            TAG_GPS_IFD => pointers.extend(value.first_unsigned().map(|o| (Ifd::Gps, o as usize))),
            _ => store(&mut out.tags, Ifd::Primary, tag, &value),
        }
    }

    let mut gps_values = BTreeMap::new();
    for (ifd, offset) in pointers {
        for (tag, value) in reader.read_ifd(offset) {
            if let Ifd::Gps = ifd {
                gps_values.insert(tag, value.clone());
            }
            store(&mut out.tags, ifd, tag, &value);
        }
    }

    out.latitude = coordinate(&gps_values, 0x0002, 0x0001, 'S');
    out.longitude = coordinate(&gps_values, 0x0004, 0x0003, 'W');
    Ok(out)
}

fn store(tags: &mut BTreeMap<String, String>, ifd: Ifd, tag: u16, value: &TagValue) {
    if let Some(name) = ifd.tag_name(tag) {
        let rendered = value.render();
        if !rendered.is_empty() {
            tags.insert(name.to_string(), rendered);
        }
    }
}

fn coordinate(gps: &BTreeMap<u16, TagValue>, value_tag: u16, ref_tag: u16, negative: char) -> Option<f64> {
    let degrees = gps.get(&value_tag)?.as_degrees()?;
    let negate = matches!(
        gps.get(&ref_tag),
        Some(TagValue::Ascii(r)) if r.trim().eq_ignore_ascii_case(&negative.to_string())
    );
    Some(if negate { -degrees } else { degrees })
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Hand-assembled little-endian TIFF structures for tests

    pub enum Entry {
        Ascii(u16, &'static str),
        Long(u16, u32),
        Rationals(u16, Vec<(u32, u32)>),
    }

    /// Build a TIFF block with IFD0 entries, an optional Exif IFD and GPS IFD
    pub fn tiff(ifd0: Vec<Entry>, exif: Vec<Entry>, gps: Vec<Entry>) -> Vec<u8> {
        let mut out = b"II*\0".to_vec();
        out.extend_from_slice(&8u32.to_le_bytes());

        let mut ifd0 = ifd0;
        let sub_count = usize::from(!exif.is_empty()) + usize::from(!gps.is_empty());
        let ifd0_size = 2 + (ifd0.len() + sub_count) * 12 + 4;
        let mut next = 8 + ifd0_size;

        // sub-IFDs follow IFD0 and its data area
        let ifd0_data = data_size(&ifd0);
        let exif_offset = next + ifd0_data;
        let exif_size = if exif.is_empty() { 0 } else { ifd_size(&exif) };
        let gps_offset = exif_offset + exif_size;
        if !exif.is_empty() {
            ifd0.push(Entry::Long(0x8769, exif_offset as u32));
        }
        if !gps.is_empty() {
            ifd0.push(Entry::Long(0x8825, gps_offset as u32));
        }

        write_ifd(&mut out, &ifd0, &mut next);
        if !exif.is_empty() {
            let mut data_at = exif_offset + 2 + exif.len() * 12 + 4;
            write_ifd(&mut out, &exif, &mut data_at);
        }
        if !gps.is_empty() {
            let mut data_at = gps_offset + 2 + gps.len() * 12 + 4;
            write_ifd(&mut out, &gps, &mut data_at);
        }
        out
    }

    fn payload(entry: &Entry) -> Vec<u8> {
        match entry {
            Entry::Ascii(_, s) => {
                let mut v = s.as_bytes().to_vec();
                v.push(0);
                v
            }
            Entry::Long(_, v) => v.to_le_bytes().to_vec(),
            Entry::Rationals(_, parts) => parts
                .iter()
                .flat_map(|(n, d)| n.to_le_bytes().into_iter().chain(d.to_le_bytes()))
                .collect(),
        }
    }

    fn data_size(entries: &[Entry]) -> usize {
        entries.iter().map(payload).filter(|p| p.len() > 4).map(|p| p.len()).sum()
    }

    fn ifd_size(entries: &[Entry]) -> usize {
        2 + entries.len() * 12 + 4 + data_size(entries)
    }

    /// Write an IFD at the current end of `out`; `data_at` is the absolute
    /// offset where out-of-line values start.
    fn write_ifd(out: &mut Vec<u8>, entries: &[Entry], data_at: &mut usize) {
        let mut data = Vec::new();
        out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
        for entry in entries {
            let (tag, kind, count) = match entry {
                Entry::Ascii(t, s) => (*t, 2u16, s.len() as u32 + 1),
                Entry::Long(t, _) => (*t, 4u16, 1),
                Entry::Rationals(t, p) => (*t, 5u16, p.len() as u32),
            };
            let bytes = payload(entry);
            out.extend_from_slice(&tag.to_le_bytes());
            out.extend_from_slice(&kind.to_le_bytes());
            out.extend_from_slice(&count.to_le_bytes());
            if bytes.len() <= 4 {
                let mut inline = bytes.clone();
                inline.resize(4, 0);
                out.extend_from_slice(&inline);
            } else {
                out.extend_from_slice(&((*data_at + data.len()) as u32).to_le_bytes());
                data.extend_from_slice(&bytes);
            }
        }
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&data);
        *data_at += data.len();
    }

    /// Wrap a TIFF block into a minimal JPEG (SOI, APP1 Exif, EOI)
    pub fn jpeg_with_exif(tiff: &[u8]) -> Vec<u8> {
        let mut out = vec![0xFF, 0xD8, 0xFF, 0xE1];
        out.extend_from_slice(&((tiff.len() + 8) as u16).to_be_bytes());
        out.extend_from_slice(b"Exif\0\0");
        out.extend_from_slice(tiff);
        out.extend_from_slice(&[0xFF, 0xD9]);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{jpeg_with_exif, tiff, Entry};
    use super::*;

    fn camera_tiff() -> Vec<u8> {
        tiff(
            vec![
                Entry::Ascii(0x010F, "Canon"),
                Entry::Ascii(0x0110, "EOS 5D"),
                Entry::Ascii(0x0131, "Adobe Photoshop 24.0"),
                Entry::Ascii(0x0132, "2023:02:03 08:30:00"),
            ],
            vec![
                Entry::Ascii(0x9003, "2023:02:01 10:00:00"),
                Entry::Ascii(0x9004, "2023:02:01 10:00:05"),
            ],
            vec![
                Entry::Ascii(0x0001, "N"),
                Entry::Rationals(0x0002, vec![(37, 1), (19, 1), (5400, 100)]),
                Entry::Ascii(0x0003, "W"),
                Entry::Rationals(0x0004, vec![(122, 1), (1, 1), (48, 1)]),
            ],
        )
    }

    #[test]
    fn test_parse_tiff_all_ifds() {
        let data = parse_tiff(&camera_tiff()).unwrap();
        assert_eq!(data.tags.get("Make").unwrap(), "Canon");
        assert_eq!(data.tags.get("Model").unwrap(), "EOS 5D");
        assert_eq!(data.tags.get("Software").unwrap(), "Adobe Photoshop 24.0");
        assert_eq!(data.tags.get("ModifyDate").unwrap(), "2023:02:03 08:30:00");
        assert_eq!(data.tags.get("DateTimeOriginal").unwrap(), "2023:02:01 10:00:00");
        assert_eq!(data.tags.get("CreateDate").unwrap(), "2023:02:01 10:00:05");
        assert!((data.latitude.unwrap() - 37.3317).abs() < 1e-3);
        assert!((data.longitude.unwrap() + 122.03).abs() < 1e-3);
    }

    #[test]
    fn test_locate_jpeg_app1() {
        let jpeg = jpeg_with_exif(&camera_tiff());
        let blocks = locate(&jpeg).unwrap();
        assert!(blocks.tiff.unwrap().starts_with(b"II*\0"));
        assert!(blocks.xmp.is_none());
    }

    #[test]
    fn test_locate_png_exif_chunk() {
        let tiff_block = camera_tiff();
        let mut png = PNG_SIGNATURE.to_vec();
        png.extend_from_slice(&(tiff_block.len() as u32).to_be_bytes());
        png.extend_from_slice(b"eXIf");
        png.extend_from_slice(&tiff_block);
        png.extend_from_slice(&[0, 0, 0, 0]);
        png.extend_from_slice(&[0, 0, 0, 0]);
        png.extend_from_slice(b"IEND");
        png.extend_from_slice(&[0, 0, 0, 0]);

        let blocks = locate(&png).unwrap();
        assert_eq!(blocks.tiff.unwrap(), tiff_block.as_slice());
    }

    #[test]
    fn test_unsupported_container_is_error() {
        assert!(locate(b"GIF89a....").is_err());
        assert!(parse_tiff(b"XX*\0").is_err());
    }

    #[test]
    fn test_self_referencing_ifd_terminates() {
        // IFD0 at 8 with one entry pointing the Exif IFD back at itself
        let mut data = b"II*\0".to_vec();
        data.extend_from_slice(&8u32.to_le_bytes());
        data.extend_from_slice(&1u16.to_le_bytes());
        data.extend_from_slice(&TAG_EXIF_IFD.to_le_bytes());
        data.extend_from_slice(&4u16.to_le_bytes());
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&8u32.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        let parsed = parse_tiff(&data).unwrap();
        assert!(parsed.tags.is_empty());
    }
}
