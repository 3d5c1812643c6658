//! File type detection via magic signatures
//!
//! Detects file types from header bytes without relying on the declared name
//! or MIME type. The result is advisory: it feeds the extension consistency
//! assessment but never selects an extractor.
//!
//! Plain-text formats (TXT, EML, CSV, ...) have no unique signature and are
//! intentionally reported as undetected.

use serde::{Deserialize, Serialize};

use crate::primitives::Sniffer;

/// Message recorded when no signature matches
pub const UNDETECTED_MESSAGE: &str =
    "No unique binary signature found (text-based or unknown format)";

/// Default number of leading bytes handed to the sniffer
pub const DEFAULT_PREFIX_LEN: usize = 4096;

// =============================================================================
// File Type Structures
// =============================================================================

/// File type categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    Image,
    Document,
    Archive,
    Executable,
    Audio,
    Video,
    Database,
}

/// Detected file type information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileType {
    /// Canonical extension, lowercase without the dot (e.g. "jpg")
    pub extension: &'static str,
    /// MIME type (e.g. "image/jpeg")
    pub mime: &'static str,
    pub category: FileCategory,
}

impl FileType {
    const fn new(extension: &'static str, mime: &'static str, category: FileCategory) -> Self {
        Self { extension, mime, category }
    }
}

/// Sniffer outcome as recorded in the report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SniffedType {
    pub detected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SniffedType {
    pub fn detected(extension: impl Into<String>, mime: impl Into<String>) -> Self {
        Self {
            detected: true,
            extension: Some(extension.into()),
            mime: Some(mime.into()),
            message: None,
        }
    }

    pub fn undetected() -> Self {
        Self {
            detected: false,
            extension: None,
            mime: None,
            message: Some(UNDETECTED_MESSAGE.to_string()),
        }
    }

    /// Run a sniffer over at most `prefix_len` leading bytes
    pub fn from_sniffer(sniffer: &dyn Sniffer, bytes: &[u8], prefix_len: usize) -> Self {
        let prefix = &bytes[..bytes.len().min(prefix_len)];
        match sniffer.sniff(prefix) {
            Some((ext, mime)) => Self::detected(ext, mime),
            None => Self::undetected(),
        }
    }
}

// =============================================================================
// Magic Detection
// =============================================================================

/// Detect file type from header bytes
///
/// Works on any prefix length; longer prefixes (a few KiB) let ZIP-based
/// Office documents and Matroska DocTypes be refined.
pub fn detect_file_type(header: &[u8]) -> Option<FileType> {
    use FileCategory::*;

    if header.is_empty() {
        return None;
    }

    // =========================================================================
    // Images
    // =========================================================================

    // JPEG: FF D8 FF
    if header.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some(FileType::new("jpg", "image/jpeg", Image));
    }

    // PNG: 89 50 4E 47 0D 0A 1A 0A
    if header.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some(FileType::new("png", "image/png", Image));
    }

    // GIF: GIF87a or GIF89a
    if header.starts_with(b"GIF87a") || header.starts_with(b"GIF89a") {
        return Some(FileType::new("gif", "image/gif", Image));
    }

    // RIFF family: WEBP / WAVE / AVI
    if header.len() >= 12 && header.starts_with(b"RIFF") {
        match &header[8..12] {
            b"WEBP" => return Some(FileType::new("webp", "image/webp", Image)),
            b"WAVE" => return Some(FileType::new("wav", "audio/wav", Audio)),
            b"AVI " => return Some(FileType::new("avi", "video/vnd.avi", Video)),
            _ => {}
        }
    }

    // TIFF: 49 49 2A 00 (little-endian) or 4D 4D 00 2A (big-endian)
    if header.starts_with(&[0x49, 0x49, 0x2A, 0x00]) || header.starts_with(&[0x4D, 0x4D, 0x00, 0x2A]) {
        return Some(FileType::new("tif", "image/tiff", Image));
    }

    // BMP: BM + plausible reserved bytes
    if header.len() >= 10 && header.starts_with(b"BM") && header[6..10] == [0, 0, 0, 0] {
        return Some(FileType::new("bmp", "image/bmp", Image));
    }

    // ICO: 00 00 01 00
    if header.starts_with(&[0x00, 0x00, 0x01, 0x00]) {
        return Some(FileType::new("ico", "image/x-icon", Image));
    }

    // ISO base media: size + "ftyp" + major brand
    if header.len() >= 12 && &header[4..8] == b"ftyp" {
        if let Some(ft) = detect_ftyp_brand(&header[8..12]) {
            return Some(ft);
        }
    }

    // =========================================================================
    // Documents
    // =========================================================================

    // PDF: %PDF
    if header.starts_with(b"%PDF") {
        return Some(FileType::new("pdf", "application/pdf", Document));
    }

    // RTF: {\rtf
    if header.starts_with(b"{\\rtf") {
        return Some(FileType::new("rtf", "application/rtf", Document));
    }

    // Microsoft Compound Document (OLE): D0 CF 11 E0 A1 B1 1A E1
    if header.starts_with(&[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1]) {
        return Some(FileType::new("cfb", "application/x-cfb", Document));
    }

    // =========================================================================
    // Archives
    // =========================================================================

    // ZIP: PK\x03\x04, refined to Office Open XML when an entry name says so
    if header.starts_with(&[0x50, 0x4B, 0x03, 0x04]) {
        return Some(detect_zip_flavour(header));
    }

    // 7-Zip: 37 7A BC AF 27 1C
    if header.starts_with(&[0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C]) {
        return Some(FileType::new("7z", "application/x-7z-compressed", Archive));
    }

    // RAR4 / RAR5: Rar!\x1a\x07
    if header.starts_with(&[0x52, 0x61, 0x72, 0x21, 0x1A, 0x07]) {
        return Some(FileType::new("rar", "application/x-rar-compressed", Archive));
    }

    // GZIP: 1F 8B
    if header.starts_with(&[0x1F, 0x8B]) {
        return Some(FileType::new("gz", "application/gzip", Archive));
    }

    // XZ: FD 37 7A 58 5A 00
    if header.starts_with(&[0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00]) {
        return Some(FileType::new("xz", "application/x-xz", Archive));
    }

    // BZIP2: BZh
    if header.starts_with(b"BZh") {
        return Some(FileType::new("bz2", "application/x-bzip2", Archive));
    }

    // ZSTD: 28 B5 2F FD
    if header.starts_with(&[0x28, 0xB5, 0x2F, 0xFD]) {
        return Some(FileType::new("zst", "application/zstd", Archive));
    }

    // =========================================================================
    // Executables
    // =========================================================================

    // Windows PE: MZ
    if header.starts_with(b"MZ") {
        return Some(FileType::new("exe", "application/x-msdownload", Executable));
    }

    // ELF: 7F ELF
    if header.starts_with(&[0x7F, 0x45, 0x4C, 0x46]) {
        return Some(FileType::new("elf", "application/x-elf", Executable));
    }

    // Mach-O (32/64-bit, both byte orders)
    if header.len() >= 4 {
        let magic = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
        if matches!(magic, 0xFEEDFACE | 0xFEEDFACF | 0xCEFAEDFE | 0xCFFAEDFE) {
            return Some(FileType::new("macho", "application/x-mach-binary", Executable));
        }
    }

    // =========================================================================
    // Audio
    // =========================================================================

    // MP3: ID3 tag or MPEG frame sync (11 set bits)
    if header.starts_with(b"ID3") {
        return Some(FileType::new("mp3", "audio/mpeg", Audio));
    }
    if header.len() >= 2 && header[0] == 0xFF && (header[1] & 0xE0) == 0xE0 {
        // AAC ADTS shares the sync word; layer bits 00 distinguish it
        if header[1] & 0x06 == 0 {
            return Some(FileType::new("aac", "audio/aac", Audio));
        }
        return Some(FileType::new("mp3", "audio/mpeg", Audio));
    }

    // FLAC: fLaC
    if header.starts_with(b"fLaC") {
        return Some(FileType::new("flac", "audio/flac", Audio));
    }

    // OGG: OggS
    if header.starts_with(b"OggS") {
        return Some(FileType::new("ogg", "audio/ogg", Audio));
    }

    // =========================================================================
    // Video
    // =========================================================================

    // Matroska / WebM: EBML header, DocType decides
    if header.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
        if find_subslice(header, b"webm").is_some() {
            return Some(FileType::new("webm", "video/webm", Video));
        }
        return Some(FileType::new("mkv", "video/x-matroska", Video));
    }

    // FLV: FLV\x01
    if header.starts_with(&[0x46, 0x4C, 0x56, 0x01]) {
        return Some(FileType::new("flv", "video/x-flv", Video));
    }

    // =========================================================================
    // Database
    // =========================================================================

    // SQLite: SQLite format 3\x00
    if header.starts_with(b"SQLite format 3\x00") {
        return Some(FileType::new("sqlite", "application/x-sqlite3", Database));
    }

    None
}

/// Map an ISO base media major brand to a file type
fn detect_ftyp_brand(brand: &[u8]) -> Option<FileType> {
    use FileCategory::*;

    let ft = match brand {
        b"heic" | b"heix" | b"hevc" | b"heim" | b"heis" => FileType::new("heic", "image/heic", Image),
        b"mif1" | b"msf1" => FileType::new("heif", "image/heif", Image),
        b"avif" | b"avis" => FileType::new("avif", "image/avif", Image),
        b"M4A " | b"M4B " => FileType::new("m4a", "audio/x-m4a", Audio),
        b"M4V " | b"M4VH" | b"M4VP" => FileType::new("m4v", "video/x-m4v", Video),
        b"qt  " => FileType::new("mov", "video/quicktime", Video),
        b"3gp4" | b"3gp5" | b"3gp6" | b"3ge6" | b"3gg6" => FileType::new("3gp", "video/3gpp", Video),
        b"3g2a" | b"3g2b" | b"3g2c" => FileType::new("3g2", "video/3gpp2", Video),
        b"crx " => FileType::new("cr3", "image/x-canon-cr3", Image),
        // isom, iso2..iso6, mp41, mp42, avc1, dash, MSNV, ...
        _ => FileType::new("mp4", "video/mp4", Video),
    };
    Some(ft)
}

/// Office Open XML packages are ZIPs whose first entries name the part tree
fn detect_zip_flavour(header: &[u8]) -> FileType {
    use FileCategory::*;

    if find_subslice(header, b"word/").is_some() {
        return FileType::new(
            "docx",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            Document,
        );
    }
    if find_subslice(header, b"xl/").is_some() {
        return FileType::new(
            "xlsx",
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            Document,
        );
    }
    if find_subslice(header, b"ppt/").is_some() {
        return FileType::new(
            "pptx",
            "application/vnd.openxmlformats-officedocument.presentationml.presentation",
            Document,
        );
    }
    FileType::new("zip", "application/zip", Archive)
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Quick check if data looks like a specific type
pub fn is_type(header: &[u8], category: FileCategory) -> bool {
    detect_file_type(header)
        .map(|ft| ft.category == category)
        .unwrap_or(false)
}

/// Default [`Sniffer`] backed by the signature table above
#[derive(Debug, Clone, Copy, Default)]
pub struct MagicSniffer;

impl Sniffer for MagicSniffer {
    fn sniff(&self, prefix: &[u8]) -> Option<(String, String)> {
        detect_file_type(prefix).map(|ft| (ft.extension.to_string(), ft.mime.to_string()))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_jpeg() {
        let header = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
        let ft = detect_file_type(&header).unwrap();
        assert_eq!(ft.mime, "image/jpeg");
        assert_eq!(ft.extension, "jpg");
        assert_eq!(ft.category, FileCategory::Image);
    }

    #[test]
    fn test_detect_png() {
        let header = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        let ft = detect_file_type(&header).unwrap();
        assert_eq!(ft.mime, "image/png");
    }

    #[test]
    fn test_detect_pdf() {
        let ft = detect_file_type(b"%PDF-1.7\n").unwrap();
        assert_eq!(ft.extension, "pdf");
        assert_eq!(ft.category, FileCategory::Document);
    }

    #[test]
    fn test_detect_docx_inside_zip() {
        let mut header = vec![0x50, 0x4B, 0x03, 0x04, 0x14, 0x00];
        header.extend_from_slice(b"....[Content_Types].xml....word/document.xml");
        let ft = detect_file_type(&header).unwrap();
        assert_eq!(ft.extension, "docx");

        let plain = [0x50, 0x4B, 0x03, 0x04, 0x00, 0x00];
        assert_eq!(detect_file_type(&plain).unwrap().extension, "zip");
    }

    #[test]
    fn test_detect_ftyp_brands() {
        let mut mp4 = vec![0x00, 0x00, 0x00, 0x18];
        mp4.extend_from_slice(b"ftypisom");
        assert_eq!(detect_file_type(&mp4).unwrap().extension, "mp4");

        let mut mov = vec![0x00, 0x00, 0x00, 0x14];
        mov.extend_from_slice(b"ftypqt  ");
        assert_eq!(detect_file_type(&mov).unwrap().mime, "video/quicktime");

        let mut m4a = vec![0x00, 0x00, 0x00, 0x20];
        m4a.extend_from_slice(b"ftypM4A ");
        assert_eq!(detect_file_type(&m4a).unwrap().category, FileCategory::Audio);
    }

    #[test]
    fn test_detect_matroska_vs_webm() {
        let mut mkv = vec![0x1A, 0x45, 0xDF, 0xA3, 0x9F, 0x42, 0x82, 0x88];
        mkv.extend_from_slice(b"matroska");
        assert_eq!(detect_file_type(&mkv).unwrap().extension, "mkv");

        let mut webm = vec![0x1A, 0x45, 0xDF, 0xA3, 0x9F, 0x42, 0x82, 0x84];
        webm.extend_from_slice(b"webm");
        assert_eq!(detect_file_type(&webm).unwrap().extension, "webm");
    }

    #[test]
    fn test_detect_audio() {
        assert_eq!(detect_file_type(b"ID3\x04\x00").unwrap().extension, "mp3");
        assert_eq!(detect_file_type(&[0xFF, 0xFB, 0x90, 0x64]).unwrap().extension, "mp3");
        assert_eq!(detect_file_type(b"fLaC\x00").unwrap().extension, "flac");
        assert_eq!(detect_file_type(b"RIFF\x24\x00\x00\x00WAVEfmt ").unwrap().extension, "wav");
    }

    #[test]
    fn test_text_is_undetected() {
        assert!(detect_file_type(b"Hello, this is a plain note.\n").is_none());
        assert!(detect_file_type(b"From: alice@example.com\r\nTo: bob@example.com\r\n").is_none());
        assert!(detect_file_type(&[]).is_none());
    }

    #[test]
    fn test_sniffed_type_uses_bounded_prefix() {
        let mut data = vec![b'a'; 64];
        data.extend_from_slice(b"%PDF-1.4");
        let sniffed = SniffedType::from_sniffer(&MagicSniffer, &data, 16);
        assert!(!sniffed.detected);
        assert_eq!(sniffed.message.as_deref(), Some(UNDETECTED_MESSAGE));

        let pdf = SniffedType::from_sniffer(&MagicSniffer, b"%PDF-1.4 rest", 16);
        assert!(pdf.detected);
        assert_eq!(pdf.extension.as_deref(), Some("pdf"));
        assert_eq!(pdf.mime.as_deref(), Some("application/pdf"));
    }

    #[test]
    fn test_is_type_helper() {
        let jpeg = [0xFF, 0xD8, 0xFF, 0xE0];
        assert!(is_type(&jpeg, FileCategory::Image));
        assert!(!is_type(&jpeg, FileCategory::Archive));
    }
}
