// XMP packet reader
//
// Only a handful of properties matter for provenance. They may appear either
// as attributes on rdf:Description or as child elements (possibly wrapped in
// rdf:Alt / rdf:Seq lists), so both shapes are collected.

use std::collections::BTreeMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use tracing::debug;

const PACKET_START: &[u8] = b"<x:xmpmeta";
const PACKET_END: &[u8] = b"</x:xmpmeta>";

/// Map a qualified XMP property name to the tag key used in the tag map
fn xmp_key(qualified: &[u8]) -> Option<&'static str> {
    let key = match qualified {
        b"xmp:CreatorTool" => "CreatorTool",
        b"xmp:CreateDate" => "CreateDate",
        b"xmp:ModifyDate" => "ModifyDate",
        b"xmp:MetadataDate" => "MetadataDate",
        b"photoshop:DateCreated" => "DateCreated",
        b"exif:DateTimeOriginal" => "DateTimeOriginal",
        b"tiff:Make" => "Make",
        b"tiff:Model" => "Model",
        b"tiff:Software" => "Software",
        b"exif:GPSLatitude" => "GPSLatitude",
        b"exif:GPSLongitude" => "GPSLongitude",
        b"xmpMM:DocumentID" => "DocumentID",
        b"xmpMM:OriginalDocumentID" => "OriginalDocumentID",
        b"xmpMM:InstanceID" => "InstanceID",
        _ => return None,
    };
    Some(key)
}

/// Find an XMP packet anywhere in a buffer
pub(super) fn find_packet(data: &[u8]) -> Option<&[u8]> {
    let start = find(data, PACKET_START)?;
    let end = find(&data[start..], PACKET_END)? + start + PACKET_END.len();
    Some(&data[start..end])
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn collect_attributes(e: &BytesStart<'_>, out: &mut BTreeMap<String, String>) {
    for attr in e.attributes().flatten() {
        if let Some(key) = xmp_key(attr.key.as_ref()) {
            if let Ok(value) = attr.unescape_value() {
                let value = value.trim();
                if !value.is_empty() {
                    out.entry(key.to_string()).or_insert_with(|| value.to_string());
                }
            }
        }
    }
}

/// Parse an XMP packet into tag-map entries. A malformed packet yields the
/// properties read before the error.
pub(super) fn parse_packet(packet: &[u8]) -> BTreeMap<String, String> {
    let mut xml_reader = Reader::from_reader(packet);
    xml_reader.config_mut().trim_text(true);

    let mut out = BTreeMap::new();
    let mut buf = Vec::new();
    // innermost tracked property for each open element
    let mut open: Vec<Option<&'static str>> = Vec::new();

    loop {
        match xml_reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                collect_attributes(e, &mut out);
                open.push(xmp_key(e.name().as_ref()));
            }
            Ok(Event::Empty(ref e)) => collect_attributes(e, &mut out),
            Ok(Event::Text(ref e)) => {
                let Some(key) = open.iter().rev().find_map(|k| *k) else {
                    buf.clear();
                    continue;
                };
                let text = e.unescape().unwrap_or_default().trim().to_string();
                if !text.is_empty() {
                    out.entry(key.to_string()).or_insert(text);
                }
            }
            Ok(Event::End(_)) => {
                open.pop();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                debug!(error = %e, "XMP packet truncated or malformed");
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    out
}

/// Parse an XMP GPS coordinate (`DDD,MM.mmk` or `DDD,MM,SSk`, k in NSEW)
pub(super) fn parse_gps_coordinate(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    let hemisphere = raw.chars().last()?;
    let sign = match hemisphere.to_ascii_uppercase() {
        'N' | 'E' => 1.0,
        'S' | 'W' => -1.0,
        _ => return raw.parse().ok(),
    };
    let body = &raw[..raw.len() - hemisphere.len_utf8()];
    let mut parts = body.split(',');
    let degrees: f64 = parts.next()?.trim().parse().ok()?;
    let minutes: f64 = parts.next().map(|m| m.trim().parse()).transpose().ok()?.unwrap_or(0.0);
    let seconds: f64 = parts.next().map(|s| s.trim().parse()).transpose().ok()?.unwrap_or(0.0);
    Some(sign * (degrees + minutes / 60.0 + seconds / 3600.0))
}
