use html2text::from_read;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::OnceLock;

fn url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"https?://[^\s]+").expect("valid url pattern"))
}

fn whitespace_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[ \t\r\f\v]+").expect("valid whitespace pattern"))
}

fn blank_lines_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\n\s*\n+").expect("valid blank line pattern"))
}

/// Clean text by removing HTML tags and URLs and normalizing whitespace.
///
/// Paragraph breaks survive as single newlines so the chunker can still cut on them.
/// Input without markup is not run through the HTML converter, which would re-wrap it.
pub fn clean_text(text: &str) -> String {
    let plain_text = if looks_like_html(text) {
        from_read(text.as_bytes(), usize::MAX)
    } else {
        text.to_string()
    };

    let without_urls = url_pattern().replace_all(&plain_text, "");
    let collapsed = whitespace_pattern().replace_all(&without_urls, " ");
    let paragraphs = blank_lines_pattern().replace_all(&collapsed, "\n");

    paragraphs
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn looks_like_html(text: &str) -> bool {
    text.contains('<') && text.contains('>')
}

/// Hex SHA-256 of the exact text, used as the content identity for every cache
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
