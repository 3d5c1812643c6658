// RFC 822 / MIME message reader
//
// Headers are unfolded and kept in order (repeated names stay separate).
// Multipart bodies are walked recursively; the first text/plain and
// text/html leaves become the bodies, every other leaf with a file name or
// an attachment disposition is listed as an attachment.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::primitives::MailParser;

/// Nesting guard for multipart recursion
const MAX_DEPTH: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub filename: Option<String>,
    pub content_type: String,
    /// Decoded size in bytes
    pub size: u64,
}

/// What a [`MailParser`] recovers from message source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedMessage {
    /// Top-level headers in source order, values unfolded
    pub headers: Vec<(String, String)>,
    pub text: Option<String>,
    pub html: Option<String>,
    pub attachments: Vec<Attachment>,
}

impl ParsedMessage {
    /// All values of a header, case-insensitive, in source order
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Header value; repeated headers are joined with ", "
    pub fn header(&self, name: &str) -> Option<String> {
        let values = self.header_values(name);
        if values.is_empty() {
            None
        } else {
            Some(values.join(", "))
        }
    }
}

/// Built-in [`MailParser`]
#[derive(Debug, Clone, Copy, Default)]
pub struct Rfc822Parser;

impl MailParser for Rfc822Parser {
    fn parse(&self, text: &str) -> Result<ParsedMessage, String> {
        let (headers, body) = split_headers(text);
        if headers.is_empty() {
            return Err("no message headers found".to_string());
        }

        let mut message = ParsedMessage::default();
        walk_part(&headers, body, &mut message, 0);
        message.headers = headers;
        debug!(
            headers = message.headers.len(),
            attachments = message.attachments.len(),
            has_text = message.text.is_some(),
            has_html = message.html.is_some(),
            "Message parsed"
        );
        Ok(message)
    }
}

// =============================================================================
// Headers
// =============================================================================

/// Split a header block from its body at the first empty line
fn split_headers(text: &str) -> (Vec<(String, String)>, &str) {
    let mut headers: Vec<(String, String)> = Vec::new();
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        offset += line.len();
        let content = line.trim_end_matches(['\r', '\n']);
        if content.is_empty() {
            return (headers, &text[offset..]);
        }
        if content.starts_with([' ', '\t']) {
            if let Some((_, value)) = headers.last_mut() {
                value.push(' ');
                value.push_str(content.trim());
            }
            continue;
        }
        // mbox separators and other malformed lines carry no header
        if let Some((name, value)) = content.split_once(':') {
            let name = name.trim();
            if !name.is_empty() && !name.contains(' ') {
                headers.push((name.to_string(), value.trim().to_string()));
            }
        }
    }
    (headers, "")
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// `type/subtype; key=value; ...` into a lower-cased MIME type and parameters.
/// Parameter keys are lower-cased; RFC 2231 `key*=charset''value` is reduced
/// to `key=value`.
fn parse_params(value: &str) -> (String, Vec<(String, String)>) {
    let mut pieces = value.split(';');
    let head = pieces.next().unwrap_or("").trim().to_lowercase();
    let params = pieces
        .filter_map(|p| {
            let (k, v) = p.split_once('=')?;
            let mut key = k.trim().to_lowercase();
            let mut val = v.trim().trim_matches('"').to_string();
            if key.ends_with('*') {
                key.pop();
                if let Some((_, rest)) = val.split_once("''") {
                    val = rest.to_string();
                }
            }
            Some((key, val))
        })
        .collect();
    (head, params)
}

fn param<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
    params.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

// =============================================================================
// Body Parts
// =============================================================================

fn walk_part(headers: &[(String, String)], body: &str, message: &mut ParsedMessage, depth: usize) {
    let (mime, params) = find_header(headers, "content-type")
        .map(parse_params)
        .unwrap_or_else(|| ("text/plain".to_string(), Vec::new()));

    if mime.starts_with("multipart/") && depth < MAX_DEPTH {
        if let Some(boundary) = param(&params, "boundary") {
            for part in split_multipart(body, boundary) {
                let (part_headers, part_body) = split_headers(&part);
                walk_part(&part_headers, part_body, message, depth + 1);
            }
            return;
        }
    }

    let (disposition, disposition_params) = find_header(headers, "content-disposition")
        .map(parse_params)
        .unwrap_or_default();
    let filename = param(&disposition_params, "filename")
        .or_else(|| param(&params, "name"))
        .map(str::to_string);

    let encoding = find_header(headers, "content-transfer-encoding")
        .map(|e| e.trim().to_lowercase())
        .unwrap_or_default();
    let decoded = decode_transfer(body, &encoding);

    let is_attachment = disposition == "attachment" || filename.is_some();
    if !is_attachment {
        let charset = param(&params, "charset").unwrap_or("utf-8");
        let slot = match mime.as_str() {
            "text/plain" => Some(&mut message.text),
            "text/html" => Some(&mut message.html),
            _ => None,
        };
        if let Some(slot) = slot {
            let text = decode_charset(&decoded, charset);
            match slot {
                Some(existing) => {
                    existing.push('\n');
                    existing.push_str(&text);
                }
                None => *slot = Some(text),
            }
            return;
        }
    }

    message.attachments.push(Attachment {
        filename,
        content_type: mime,
        size: decoded.len() as u64,
    });
}

/// Parts between `--boundary` delimiter lines, stopping at `--boundary--`
fn split_multipart(body: &str, boundary: &str) -> Vec<String> {
    let delimiter = format!("--{}", boundary);
    let closing = format!("--{}--", boundary);
    let mut parts = Vec::new();
    let mut current: Option<String> = None;

    for line in body.split_inclusive('\n') {
        let content = line.trim_end_matches(['\r', '\n']);
        if content.trim_end() == closing {
            if let Some(part) = current.take() {
                parts.push(part);
            }
            break;
        }
        if content.trim_end() == delimiter {
            if let Some(part) = current.take() {
                parts.push(part);
            }
            current = Some(String::new());
            continue;
        }
        if let Some(part) = current.as_mut() {
            part.push_str(line);
        }
    }
    if let Some(part) = current {
        parts.push(part);
    }
    parts
}

fn decode_transfer(body: &str, encoding: &str) -> Vec<u8> {
    match encoding {
        "base64" => {
            let compact: String = body.chars().filter(|c| !c.is_whitespace()).collect();
            STANDARD.decode(compact.as_bytes()).unwrap_or_else(|e| {
                debug!(error = %e, "Invalid base64 body, keeping raw bytes");
                body.as_bytes().to_vec()
            })
        }
        "quoted-printable" => decode_quoted_printable(body),
        _ => body.trim_end_matches(['\r', '\n']).as_bytes().to_vec(),
    }
}

/// Quoted-printable: `=XX` escapes and `=` soft line breaks
pub fn decode_quoted_printable(input: &str) -> Vec<u8> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'=' {
            out.push(bytes[i]);
            i += 1;
            continue;
        }
        match (bytes.get(i + 1), bytes.get(i + 2)) {
            (Some(b'\r'), Some(b'\n')) => i += 3,
            (Some(b'\n'), _) => i += 2,
            (Some(&h), Some(&l)) => match std::str::from_utf8(&[h, l]).ok().and_then(|s| u8::from_str_radix(s, 16).ok()) {
                Some(byte) => {
                    out.push(byte);
                    i += 3;
                }
                None => {
                    out.push(b'=');
                    i += 1;
                }
            },
            _ => {
                out.push(b'=');
                i += 1;
            }
        }
    }
    out
}

/// UTF-8 (lossy) unless the charset is a single-byte Latin one
fn decode_charset(bytes: &[u8], charset: &str) -> String {
    match charset.to_lowercase().as_str() {
        "iso-8859-1" | "latin1" | "iso-8859-15" | "windows-1252" | "cp1252" => {
            bytes.iter().map(|&b| char::from(b)).collect()
        }
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MULTIPART: &str = "From: Alice <alice@example.com>\r\n\
To: bob@example.com\r\n\
Subject: =?UTF-8?Q?Hello_World?=\r\n\
Received: from mail.example.com (mail.example.com [203.0.113.7])\r\n\
\tby mx.example.net; Tue, 1 Feb 2023 10:00:00 +0000\r\n\
Received: from internal (10.0.0.1)\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"outer\"\r\n\
\r\n\
preamble\r\n\
--outer\r\n\
Content-Type: multipart/alternative; boundary=inner\r\n\
\r\n\
--inner\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
Content-Transfer-Encoding: quoted-printable\r\n\
\r\n\
Caf=C3=A9 link https://example.com/a?b=1 and soft=\r\n\
break\r\n\
--inner\r\n\
Content-Type: text/html\r\n\
\r\n\
<p><a href=\"http://example.org/\">x</a></p>\r\n\
--inner--\r\n\
--outer\r\n\
Content-Type: application/pdf; name=\"invoice.pdf\"\r\n\
Content-Disposition: attachment; filename=\"invoice.pdf\"\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
JVBERi0xLjQ=\r\n\
--outer--\r\n";

    #[test]
    fn test_headers_unfolded_and_ordered() {
        let msg = Rfc822Parser.parse(MULTIPART).unwrap();
        assert_eq!(msg.header("from").as_deref(), Some("Alice <alice@example.com>"));
        let received = msg.header_values("RECEIVED");
        assert_eq!(received.len(), 2);
        assert!(received[0].ends_with("by mx.example.net; Tue, 1 Feb 2023 10:00:00 +0000"));
    }

    #[test]
    fn test_multipart_bodies_and_attachments() {
        let msg = Rfc822Parser.parse(MULTIPART).unwrap();
        let text = msg.text.unwrap();
        assert!(text.starts_with("Café link https://example.com/a?b=1 and softbreak"));
        assert!(msg.html.unwrap().contains("href=\"http://example.org/\""));
        assert_eq!(
            msg.attachments,
            vec![Attachment {
                filename: Some("invoice.pdf".to_string()),
                content_type: "application/pdf".to_string(),
                size: 8,
            }]
        );
    }

    #[test]
    fn test_single_part_defaults_to_plain_text() {
        let msg = Rfc822Parser.parse("Subject: hi\n\nbody line\n").unwrap();
        assert_eq!(msg.text.as_deref(), Some("body line"));
        assert!(msg.attachments.is_empty());
    }

    #[test]
    fn test_text_without_headers_fails() {
        assert!(Rfc822Parser.parse("just some words\nwithout structure").is_err());
        assert!(Rfc822Parser.parse("").is_err());
    }

    #[test]
    fn test_quoted_printable() {
        assert_eq!(decode_quoted_printable("a=3Db=\nc"), b"a=bc");
        assert_eq!(decode_quoted_printable("100%=ZZ"), b"100%=ZZ");
    }

    #[test]
    fn test_rfc2231_filename() {
        let (_, params) = parse_params("attachment; filename*=utf-8''report.pdf");
        assert_eq!(param(&params, "filename"), Some("report.pdf"));
    }
}
