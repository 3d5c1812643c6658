// Pre-compiled text patterns shared by extractors and rule sets
//
// Each regex is compiled once on first use via OnceLock.

use std::sync::OnceLock;

use regex::Regex;

/// http(s) URL running to the next whitespace (plain-text documents)
pub fn url_regex() -> &'static Regex {
    static URL_REGEX: OnceLock<Regex> = OnceLock::new();
    URL_REGEX.get_or_init(|| Regex::new(r"(?i)https?://[^\s]+").expect("Invalid URL regex"))
}

/// http(s) URL stopping at quotes and angle brackets (mail bodies)
pub fn body_url_regex() -> &'static Regex {
    static BODY_URL_REGEX: OnceLock<Regex> = OnceLock::new();
    BODY_URL_REGEX.get_or_init(|| {
        Regex::new(r#"(?i)https?://[^\s"'<>]+"#).expect("Invalid body URL regex")
    })
}

/// Dotted-quad IPv4 candidate
pub fn ipv4_regex() -> &'static Regex {
    static IPV4_REGEX: OnceLock<Regex> = OnceLock::new();
    IPV4_REGEX.get_or_init(|| {
        Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}\b").expect("Invalid IPv4 regex")
    })
}

/// `href` attribute of an HTML anchor
pub fn anchor_href_regex() -> &'static Regex {
    static HREF_REGEX: OnceLock<Regex> = OnceLock::new();
    HREF_REGEX.get_or_init(|| {
        Regex::new(r#"(?is)<a\b[^>]*?\bhref\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#)
            .expect("Invalid anchor regex")
    })
}

/// Signed decimal number with a fractional part (ISO 6709 style coordinates)
pub fn signed_decimal_regex() -> &'static Regex {
    static DECIMAL_REGEX: OnceLock<Regex> = OnceLock::new();
    DECIMAL_REGEX.get_or_init(|| Regex::new(r"[+-]?\d+\.\d+").expect("Invalid decimal regex"))
}

/// RFC 2047 encoded-word, UTF-8 charset with Q encoding
pub fn rfc2047_utf8_q_regex() -> &'static Regex {
    static RFC2047_REGEX: OnceLock<Regex> = OnceLock::new();
    RFC2047_REGEX.get_or_init(|| {
        Regex::new(r"(?i)=\?UTF-8\?Q\?(.+?)\?=").expect("Invalid RFC 2047 regex")
    })
}

/// Parenthesised group, non-greedy (platform notes in creator tool strings)
pub fn paren_group_regex() -> &'static Regex {
    static PAREN_REGEX: OnceLock<Regex> = OnceLock::new();
    PAREN_REGEX.get_or_init(|| Regex::new(r"\(.*?\)").expect("Invalid paren group regex"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_patterns() {
        let text = "see https://example.com/a?b=1 and HTTP://x.org.";
        let found: Vec<_> = url_regex().find_iter(text).map(|m| m.as_str()).collect();
        assert_eq!(found, vec!["https://example.com/a?b=1", "HTTP://x.org."]);

        let html_ish = r#"<a href="https://x.org/p">"#;
        let body: Vec<_> = body_url_regex().find_iter(html_ish).map(|m| m.as_str()).collect();
        assert_eq!(body, vec!["https://x.org/p"]);
    }

    #[test]
    fn test_anchor_href_forms() {
        let html = r#"<a href="https://a.example/">A</a> <A class=x HREF='http://b.example/?q=1'>B</A> <a href=https://c.example>C</a>"#;
        let hrefs: Vec<String> = anchor_href_regex()
            .captures_iter(html)
            .filter_map(|c| c.get(1).or(c.get(2)).or(c.get(3)).map(|m| m.as_str().to_string()))
            .collect();
        assert_eq!(
            hrefs,
            vec!["https://a.example/", "http://b.example/?q=1", "https://c.example"]
        );
    }

    #[test]
    fn test_ipv4_and_decimal() {
        assert_eq!(
            ipv4_regex().find("from mx.example.com ([203.0.113.9])").map(|m| m.as_str()),
            Some("203.0.113.9")
        );
        let coords: Vec<_> = signed_decimal_regex()
            .find_iter("+37.3318-122.0312/")
            .map(|m| m.as_str())
            .collect();
        assert_eq!(coords, vec!["+37.3318", "-122.0312"]);
    }
}
