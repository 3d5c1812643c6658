//! Email message (RFC 822 / MIME) extraction

mod parser;

use serde::{Deserialize, Serialize};

use crate::common::patterns::ipv4_regex;
use crate::primitives::MailParser;
use crate::source::ByteSource;

use super::ExtractFailure;

pub use parser::{decode_quoted_printable, Attachment, ParsedMessage, Rfc822Parser};

/// One header name with all of its values, in first-occurrence order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawHeader {
    pub name: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmlMetadata {
    pub from: Option<String>,
    pub to: Option<String>,
    /// As written; RFC 2047 words are decoded by the rule set
    pub subject: Option<String>,
    pub date: Option<String>,
    pub message_id: Option<String>,
    #[serde(rename = "originIP")]
    pub origin_ip: Option<String>,
    pub spf: Option<String>,
    pub dkim: Option<String>,
    pub body_text: Option<String>,
    #[serde(rename = "bodyHTML")]
    pub body_html: Option<String>,
    pub attachments: Vec<Attachment>,
    pub content_type: Option<String>,
    pub reply_to: Option<String>,
    pub return_path: Option<String>,
    pub raw_headers: Vec<RawHeader>,
}

impl From<ParsedMessage> for EmlMetadata {
    fn from(msg: ParsedMessage) -> Self {
        let received = msg.header_values("received").join(" ");
        let origin_ip = ipv4_regex().find(&received).map(|m| m.as_str().to_string());

        let mut raw_headers: Vec<RawHeader> = Vec::new();
        for (name, value) in &msg.headers {
            match raw_headers.iter_mut().find(|h| h.name.eq_ignore_ascii_case(name)) {
                Some(existing) => existing.values.push(value.clone()),
                None => raw_headers.push(RawHeader {
                    name: name.clone(),
                    values: vec![value.clone()],
                }),
            }
        }

        Self {
            from: msg.header("from"),
            to: msg.header("to"),
            subject: msg.header("subject"),
            date: msg.header("date"),
            message_id: msg.header("message-id"),
            origin_ip,
            spf: msg.header("received-spf"),
            dkim: msg.header("dkim-signature"),
            content_type: msg.header("content-type"),
            reply_to: msg.header("reply-to"),
            return_path: msg.header("return-path"),
            body_text: msg.text.filter(|t| !t.is_empty()),
            body_html: msg.html.filter(|h| !h.is_empty()),
            attachments: msg.attachments,
            raw_headers,
        }
    }
}

pub(super) fn extract(source: &ByteSource, parser: &dyn MailParser) -> Result<EmlMetadata, ExtractFailure> {
    let text = String::from_utf8_lossy(source.bytes());
    let parsed = parser.parse(&text).map_err(ExtractFailure::Parse)?;
    Ok(parsed.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn source(text: &str) -> ByteSource {
        ByteSource::new("mail.eml", "message/rfc822", Utc::now(), text.as_bytes().to_vec())
    }

    #[test]
    fn test_header_fields() {
        let text = "From: a@example.com\nTo: b@example.com\nSubject: Invoice\nDate: Tue, 1 Feb 2023 10:00:00 +0000\n\
Message-ID: <1@example.com>\nReceived-SPF: pass\nDKIM-Signature: v=1; d=example.com\nReply-To: c@example.com\n\nHello\n";
        let meta = extract(&source(text), &Rfc822Parser).unwrap();
        assert_eq!(meta.from.as_deref(), Some("a@example.com"));
        assert_eq!(meta.subject.as_deref(), Some("Invoice"));
        assert_eq!(meta.message_id.as_deref(), Some("<1@example.com>"));
        assert_eq!(meta.spf.as_deref(), Some("pass"));
        assert_eq!(meta.dkim.as_deref(), Some("v=1; d=example.com"));
        assert_eq!(meta.reply_to.as_deref(), Some("c@example.com"));
        assert_eq!(meta.return_path, None);
        assert_eq!(meta.body_text.as_deref(), Some("Hello"));
        assert_eq!(meta.origin_ip, None);
    }

    #[test]
    fn test_origin_ip_is_first_match_across_received() {
        let text = "Received: from relay (unknown)\nReceived: from origin [198.51.100.23] by relay\n\
Received: from deeper (192.0.2.1)\nFrom: x@y\n\nbody";
        let meta = extract(&source(text), &Rfc822Parser).unwrap();
        assert_eq!(meta.origin_ip.as_deref(), Some("198.51.100.23"));
        let received = meta.raw_headers.iter().find(|h| h.name == "Received").unwrap();
        assert_eq!(received.values.len(), 3);
    }

    #[test]
    fn test_unparseable_is_failure() {
        assert!(matches!(extract(&source("no headers here"), &Rfc822Parser), Err(ExtractFailure::Parse(_))));
    }

    #[test]
    fn test_serialized_field_names() {
        let meta = extract(&source("Subject: x\n\n<b>hi</b>"), &Rfc822Parser).unwrap();
        let json = serde_json::to_value(&meta).unwrap();
        assert!(json.get("bodyHTML").is_some());
        assert!(json.get("originIP").is_some());
        assert!(json.get("rawHeaders").is_some());
    }
}
