//! Plain-text normalisation for mail bodies and reply headers.

use html2text::render::text_renderer::TrivialDecorator;
use lazy_static::lazy_static;
use log::warn;
use mailparse::{DispositionType, ParsedMail};
use regex::Regex;
use crate::config;

const HTML_WRAP_WIDTH: usize = 60;
const ELLIPSIS: &str = "...";

lazy_static! {
    static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").unwrap();
}

/// HTML to wrapped text. Link targets are dropped, only anchor text is kept.
pub fn strip_html(html: &str) -> String {
    html2text::from_read_with_decorator(html.as_bytes(), HTML_WRAP_WIDTH, TrivialDecorator::new())
}

/// Readable body of a full RFC 822 message: the first inline text/plain
/// part, else the first inline text/html part. Transfer and charset
/// encodings are decoded.
pub fn body_text(raw: &[u8]) -> String {
    let parsed = match mailparse::parse_mail(raw) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("Unparseable message: {}", e);
            return String::new();
        }
    };
    first_part(&parsed, "text/plain")
        .or_else(|| first_part(&parsed, "text/html"))
        .unwrap_or_default()
}

fn first_part(part: &ParsedMail, mimetype: &str) -> Option<String> {
    if !part.subparts.is_empty() {
        return part.subparts.iter().find_map(|sub| first_part(sub, mimetype));
    }
    let inline = part.get_content_disposition().disposition != DispositionType::Attachment;
    if inline && part.ctype.mimetype.eq_ignore_ascii_case(mimetype) {
        part.get_body().ok()
    } else {
        None
    }
}

/// Bodies that look like markup go through [`strip_html`].
pub fn plain_body(raw: &str) -> String {
    if raw.contains('<') {
        strip_html(raw)
    } else {
        raw.to_string()
    }
}

/// Cuts `text` to `max_chars` characters and appends "...". Text already
/// within the limit is returned unchanged.
pub fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        None => text.to_string(),
        Some((cut, _)) => format!("{}{}", &text[..cut], ELLIPSIS),
    }
}

pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RUN.replace_all(text, " ").trim().to_string()
}

pub fn snippet(body: &str) -> String {
    truncate(&collapse_whitespace(body), config::SNIPPET_MAX_CHARS)
}

pub fn display_body(body: &str) -> String {
    truncate(body.trim(), config::BODY_MAX_CHARS)
}

pub fn reply_subject(subject: &str) -> String {
    if subject.starts_with("Re:") {
        subject.to_string()
    } else {
        format!("Re: {}", subject)
    }
}

/// References header for a reply: the parent's own references followed by
/// the parent's Message-ID.
pub fn build_references(parent_references: Option<&str>, message_id: &str) -> String {
    match parent_references.map(str::trim).filter(|r| !r.is_empty()) {
        Some(refs) => format!("{} {}", refs, message_id),
        None => message_id.to_string(),
    }
}
