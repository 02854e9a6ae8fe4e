//! Reference extraction: find remote images embedded in document text.
//!
//! Two syntaxes are recognised:
//!
//! 1. Markdown images, `![alt](url)` with an optional title after the URL.
//! 2. HTML `<img>` tags carrying a quoted `src` attribute.
//!
//! Only absolute `http://` / `https://` URLs qualify; relative and already
//! local paths are left alone, which is what makes a second run a no-op.
//! Malformed syntax simply does not match.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// `![alt](url "optional title")`. Group 1: alt, 2: url, 3: title with its
/// leading whitespace. Only `"…"`, `'…'` or `(…)` count as a title; any other
/// text inside the parentheses belongs to the URL.
pub(crate) static RE_MARKDOWN_IMAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"!\[([^\]]*)\]\(\s*([^)]*?)(\s+(?:"[^"]*"|'[^']*'|\([^)]*\)))?\s*\)"#)
        .unwrap()
});

/// `<img ... src="url" ...>`. The leading `\s` before `src` keeps
/// `data-src` and friends from matching. Group 1: url.
static RE_IMG_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<img\s(?:[^>]*?\s)?src\s*=\s*["']([^"'>]+)["'][^>]*>"#).unwrap()
});

/// Which embed syntax a reference was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferenceKind {
    /// `![alt](url)`
    Markdown,
    /// `<img src="url">`
    HtmlTag,
}

/// A located remote-image mention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageReference {
    /// Absolute HTTP(S) URL of the image.
    pub url: String,
    /// Exact substring of the document to be replaced.
    pub matched_text: String,
    /// Syntax the reference was written in.
    pub kind: ReferenceKind,
    /// Byte offset of `matched_text` in the document.
    pub offset: usize,
}

/// Check if the string is an absolute HTTP(S) URL.
pub fn is_remote_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Extract every remote image reference in document order.
///
/// Duplicate URLs yield duplicate references; the coordinator deduplicates
/// the download work.
pub fn extract_references(text: &str) -> Vec<ImageReference> {
    let markdown = RE_MARKDOWN_IMAGE.captures_iter(text).filter_map(|caps| {
        let whole = caps.get(0)?;
        let url = caps.get(2)?.as_str();
        is_remote_url(url).then(|| ImageReference {
            url: url.to_string(),
            matched_text: whole.as_str().to_string(),
            kind: ReferenceKind::Markdown,
            offset: whole.start(),
        })
    });

    let tags = RE_IMG_TAG.captures_iter(text).filter_map(|caps| {
        let whole = caps.get(0)?;
        let url = caps.get(1)?.as_str().trim();
        is_remote_url(url).then(|| ImageReference {
            url: url.to_string(),
            matched_text: whole.as_str().to_string(),
            kind: ReferenceKind::HtmlTag,
            offset: whole.start(),
        })
    });

    let mut refs: Vec<ImageReference> = markdown.chain(tags).collect();
    refs.sort_by_key(|r| r.offset);
    refs
}
