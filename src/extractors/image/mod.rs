//! Image metadata extraction (EXIF, TIFF, XMP)

mod exif;
mod xmp;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::common::patterns::paren_group_regex;
use crate::primitives::ExifReader;
use crate::source::ByteSource;

use super::ExtractFailure;

/// Flat tag map produced by an [`ExifReader`], keyed by EXIF tag name
/// (`Make`, `DateTimeOriginal`, `CreatorTool`, ...)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagMap {
    entries: BTreeMap<String, String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl TagMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str).filter(|v| !v.trim().is_empty())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.insert(key, value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.latitude.is_none() && self.longitude.is_none()
    }

    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.entries
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsCoordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Normalized image record. Date fields keep the text as recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMetadata {
    pub camera: Option<String>,
    pub date_taken: Option<String>,
    pub create_date: Option<String>,
    pub modify_date: Option<String>,
    pub software: Option<String>,
    pub creator_tool: Option<String>,
    pub gps: Option<GpsCoordinates>,
    pub raw: BTreeMap<String, String>,
}

impl ImageMetadata {
    fn from_tags(tags: &TagMap) -> Self {
        let owned = |key: &str| tags.get(key).map(str::to_string);

        let camera = format!("{} {}", tags.get("Make").unwrap_or(""), tags.get("Model").unwrap_or(""))
            .trim()
            .to_string();
        let date_taken = owned("DateTimeOriginal");

        let gps = match (tags.latitude, tags.longitude) {
            (Some(latitude), Some(longitude)) => Some(GpsCoordinates { latitude, longitude }),
            _ => None,
        };

        Self {
            camera: if camera.is_empty() { None } else { Some(camera) },
            create_date: owned("CreateDate").or_else(|| date_taken.clone()),
            date_taken,
            modify_date: owned("ModifyDate"),
            software: owned("Software"),
            creator_tool: owned("CreatorTool"),
            gps,
            raw: tags.entries().clone(),
        }
    }

    /// Creator tool without document ids and parenthesised platform notes
    pub fn creator_tool_display(&self) -> Option<String> {
        self.creator_tool.as_deref().map(clean_creator_tool)
    }
}

/// `"Adobe Photoshop 24.1 (Windows) doc=xmp.did:1"` -> `"Adobe Photoshop 24.1"`
pub fn clean_creator_tool(value: &str) -> String {
    let head = value.split(" doc=").next().unwrap_or(value);
    paren_group_regex().replace_all(head, "").trim().to_string()
}

pub(super) fn extract(source: &ByteSource, reader: &dyn ExifReader) -> Result<ImageMetadata, ExtractFailure> {
    match reader.read_tags(source.bytes()) {
        Ok(Some(tags)) if !tags.is_empty() => Ok(ImageMetadata::from_tags(&tags)),
        Ok(_) => Err(ExtractFailure::Empty),
        Err(e) => Err(ExtractFailure::Parse(e)),
    }
}

// =============================================================================
// Default Reader
// =============================================================================

/// Built-in [`ExifReader`]: EXIF from JPEG/TIFF/PNG/WebP/HEIF plus the XMP
/// packet. EXIF values win over XMP values for the same key.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedMetadataReader;

impl ExifReader for EmbeddedMetadataReader {
    fn read_tags(&self, bytes: &[u8]) -> Result<Option<TagMap>, String> {
        let blocks = exif::locate(bytes)?;
        let mut tags = TagMap::new();

        if let Some(tiff) = blocks.tiff {
            let data = exif::parse_tiff(tiff)?;
            debug!(tags = data.tags.len(), "EXIF block decoded");
            tags.entries = data.tags;
            tags.latitude = data.latitude;
            tags.longitude = data.longitude;
        }

        if let Some(packet) = blocks.xmp {
            let props = xmp::parse_packet(packet);
            debug!(properties = props.len(), "XMP packet decoded");
            if tags.latitude.is_none() || tags.longitude.is_none() {
                let lat = props.get("GPSLatitude").and_then(|v| xmp::parse_gps_coordinate(v));
                let lon = props.get("GPSLongitude").and_then(|v| xmp::parse_gps_coordinate(v));
                if lat.is_some() && lon.is_some() {
                    tags.latitude = lat;
                    tags.longitude = lon;
                }
            }
            for (key, value) in props {
                tags.entries.entry(key).or_insert(value);
            }
        }

        Ok(if tags.is_empty() { None } else { Some(tags) })
    }
}
