//! PDF document information extraction
//!
//! Dates stay in their native `D:YYYYMMDDHHmmSS+hh'mm'` form; the rule set
//! parses them.

use std::collections::BTreeMap;

use lopdf::{Dictionary, Document, Object};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::primitives::PdfReader;
use crate::source::ByteSource;

use super::ExtractFailure;

/// AcroForm `SigFlags` bit: document contains at least one signature field
const SIG_FLAGS_SIGNATURES_EXIST: i64 = 1;

/// What a [`PdfReader`] recovers from a document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PdfDocumentInfo {
    pub version: String,
    /// Document information dictionary, values decoded to text
    pub info: BTreeMap<String, String>,
    pub page_count: u32,
    pub is_signed: bool,
    pub has_acro_form: bool,
    pub encryption_filter: Option<String>,
    pub has_xmp: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfMetadata {
    pub pdf_version: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub mod_date: Option<String>,
    pub trapped: Option<String>,
    pub is_signed: bool,
    pub has_acro_form: bool,
    pub encryption_filter: Option<String>,
    pub page_count: Option<u32>,
    pub file_size: u64,
    pub has_xmp: bool,
    pub raw: BTreeMap<String, String>,
}

impl PdfMetadata {
    fn from_info(doc: PdfDocumentInfo, file_size: u64) -> Self {
        let field = |key: &str| {
            doc.info
                .get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Self {
            pdf_version: Some(doc.version.clone()).filter(|v| !v.is_empty()),
            title: field("Title"),
            author: field("Author"),
            subject: field("Subject"),
            keywords: field("Keywords"),
            creator: field("Creator"),
            producer: field("Producer"),
            creation_date: field("CreationDate"),
            mod_date: field("ModDate"),
            trapped: field("Trapped"),
            is_signed: doc.is_signed,
            has_acro_form: doc.has_acro_form,
            encryption_filter: doc.encryption_filter.clone(),
            page_count: Some(doc.page_count).filter(|&n| n > 0),
            file_size,
            has_xmp: doc.has_xmp,
            raw: doc.info,
        }
    }
}

pub(super) fn extract(source: &ByteSource, reader: &dyn PdfReader) -> Result<PdfMetadata, ExtractFailure> {
    let info = reader.read_info(source.bytes()).map_err(ExtractFailure::Parse)?;
    Ok(PdfMetadata::from_info(info, source.size()))
}

// =============================================================================
// lopdf-backed Reader
// =============================================================================

/// Built-in [`PdfReader`] on top of `lopdf`
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfReader;

impl PdfReader for LopdfReader {
    fn read_info(&self, bytes: &[u8]) -> Result<PdfDocumentInfo, String> {
        let doc = Document::load_mem(bytes).map_err(|e| format!("Failed to parse PDF: {}", e))?;

        let info = doc
            .trailer
            .get(b"Info")
            .ok()
            .and_then(|obj| resolve_dict(&doc, obj))
            .map(|dict| decode_dictionary(&doc, dict))
            .unwrap_or_default();

        let catalog = doc.trailer.get(b"Root").ok().and_then(|obj| resolve_dict(&doc, obj));
        let acro_form = catalog
            .and_then(|c| c.get(b"AcroForm").ok())
            .and_then(|obj| resolve_dict(&doc, obj));

        let (has_acro_form, is_signed) = match acro_form {
            Some(form) => inspect_acro_form(&doc, form),
            None => (false, false),
        };

        let has_xmp = catalog.map(|c| c.has(b"Metadata")).unwrap_or(false);

        let encryption_filter = doc
            .trailer
            .get(b"Encrypt")
            .ok()
            .and_then(|obj| resolve_dict(&doc, obj))
            .and_then(|dict| dict.get(b"Filter").ok())
            .and_then(|f| f.as_name().ok())
            .map(|n| String::from_utf8_lossy(n).into_owned());

        let page_count = doc.get_pages().len() as u32;
        debug!(version = %doc.version, page_count, info_keys = info.len(), "PDF parsed");

        Ok(PdfDocumentInfo {
            version: doc.version.clone(),
            info,
            page_count,
            is_signed,
            has_acro_form,
            encryption_filter,
            has_xmp,
        })
    }
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

fn resolve_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    resolve(doc, obj).and_then(|o| o.as_dict().ok())
}

/// (forms present, signatures present)
fn inspect_acro_form(doc: &Document, form: &Dictionary) -> (bool, bool) {
    let fields: Vec<&Object> = form
        .get(b"Fields")
        .ok()
        .and_then(|obj| resolve(doc, obj))
        .and_then(|obj| obj.as_array().ok())
        .map(|arr| arr.iter().collect())
        .unwrap_or_default();

    let sig_flag = form
        .get(b"SigFlags")
        .ok()
        .and_then(|obj| resolve(doc, obj))
        .and_then(|obj| obj.as_i64().ok())
        .map(|flags| flags & SIG_FLAGS_SIGNATURES_EXIST != 0)
        .unwrap_or(false);

    let sig_field = fields.iter().any(|field| {
        resolve_dict(doc, field)
            .and_then(|f| f.get(b"FT").ok())
            .and_then(|ft| ft.as_name().ok())
            .map(|name| name == b"Sig")
            .unwrap_or(false)
    });

    (!fields.is_empty(), sig_flag || sig_field)
}

fn decode_dictionary(doc: &Document, dict: &Dictionary) -> BTreeMap<String, String> {
    dict.iter()
        .filter_map(|(key, value)| {
            let value = resolve(doc, value)?;
            Some((String::from_utf8_lossy(key).into_owned(), object_text(value)?))
        })
        .collect()
}

fn object_text(obj: &Object) -> Option<String> {
    match obj {
        Object::String(bytes, _) => Some(decode_text_string(bytes)),
        Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
        Object::Integer(i) => Some(i.to_string()),
        Object::Real(r) => Some(r.to_string()),
        Object::Boolean(b) => Some(b.to_string()),
        _ => None,
    }
}

/// PDF text string: UTF-16BE with BOM, UTF-8 with BOM, else PDFDocEncoding
/// (treated as Latin-1)
fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(body) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = body
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    if let Some(body) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(body).into_owned();
    }
    bytes.iter().map(|&b| char::from(b)).collect()
}

#[cfg(test)]
pub(crate) mod fixtures {
    use lopdf::{dictionary, Document, Object};

    /// Minimal one-page PDF with the given info entries
    pub fn pdf_with_info(entries: &[(&str, &str)], signed_form: bool) -> Vec<u8> {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );

        let mut catalog = dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        };
        if signed_form {
            let field_id = doc.add_object(dictionary! {
                "FT" => "Sig",
                "T" => Object::string_literal("Signature1"),
            });
            catalog.set(
                "AcroForm",
                dictionary! {
                    "Fields" => vec![field_id.into()],
                    "SigFlags" => 3,
                },
            );
        }
        let catalog_id = doc.add_object(catalog);

        let mut info = lopdf::Dictionary::new();
        for (key, value) in entries {
            info.set(*key, Object::string_literal(*value));
        }
        let info_id = doc.add_object(info);

        doc.trailer.set("Root", catalog_id);
        doc.trailer.set("Info", info_id);

        let mut out = Vec::new();
        doc.save_to(&mut out).expect("serialize fixture PDF");
        out
    }
}
