use crate::common::patterns::{anchor_href_regex, body_url_regex, rfc2047_utf8_q_regex};
use crate::common::timefmt::{format_utc, parse_rfc2822};
use crate::extractors::eml::decode_quoted_printable;
use crate::extractors::EmlMetadata;

use super::{Findings, Passes};

const NOT_PRESENT: &str = "Not present";

/// Decode UTF-8 "Q" encoded words and collapse whitespace.
///
/// Other charsets and the "B" encoding are left as written. A word that
/// does not decode to valid UTF-8 leaves the whole value untouched.
pub fn decode_rfc2047(value: &str) -> String {
    let mut valid = true;
    let decoded = rfc2047_utf8_q_regex().replace_all(value, |caps: &regex::Captures<'_>| {
        let bytes = decode_quoted_printable(&caps[1].replace('_', " "));
        match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(_) => {
                valid = false;
                String::new()
            }
        }
    });
    if !valid {
        return value.to_string();
    }
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Links from the plain-text body followed by anchor targets of the HTML body
fn hyperlinks(meta: &EmlMetadata) -> Vec<String> {
    let mut links: Vec<String> = meta
        .body_text
        .as_deref()
        .map(|text| body_url_regex().find_iter(text).map(|m| m.as_str().to_string()).collect())
        .unwrap_or_default();

    if let Some(html) = &meta.body_html {
        links.extend(anchor_href_regex().captures_iter(html).filter_map(|caps| {
            caps.get(1)
                .or_else(|| caps.get(2))
                .or_else(|| caps.get(3))
                .map(|m| m.as_str().trim().to_string())
        }));
    }
    links
}

/// Mail findings are descriptive only
pub(super) fn evaluate(meta: &EmlMetadata) -> Findings {
    let mut passes = Passes::default();
    let or_absent = |value: &Option<String>| value.clone().unwrap_or_else(|| NOT_PRESENT.to_string());

    let subject = meta
        .subject
        .as_deref()
        .map(decode_rfc2047)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| NOT_PRESENT.to_string());
    passes.note(format!("Email Subject Line: {subject}"));
    passes.note(format!("From: {}", or_absent(&meta.from)));
    passes.note(format!("To: {}", or_absent(&meta.to)));

    let sent = meta
        .date
        .as_deref()
        .map(|raw| parse_rfc2822(raw).map(|d| format_utc(&d)).unwrap_or_else(|| raw.to_string()))
        .unwrap_or_else(|| NOT_PRESENT.to_string());
    passes.note(format!("Date Sent: {sent}"));
    passes.note(format!("Message-ID: {}", or_absent(&meta.message_id)));
    passes.note(format!("Originating IP: {}", or_absent(&meta.origin_ip)));
    passes.note(format!("SPF Header: {}", or_absent(&meta.spf)));
    passes.note(format!("DKIM Header: {}", or_absent(&meta.dkim)));

    let links = hyperlinks(meta);
    let https = links.iter().filter(|l| l.starts_with("https://")).count();
    let http = links.iter().filter(|l| l.starts_with("http://")).count();
    let tracked = links.iter().filter(|l| l.contains('?')).count();
    passes.note(format!(
        "Total Hyperlinks Found: {} (HTTPS: {https}, HTTP: {http})",
        links.len()
    ));
    if tracked > 0 {
        passes.note(format!("Links with Query/Tracking Parameters: {tracked}"));
    }

    passes.finish()
}
