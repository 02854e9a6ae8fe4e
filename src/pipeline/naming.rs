//! Local file naming: a deterministic, filesystem-safe name for every URL.
//!
//! Names have the shape `<stem>_<fingerprint>.<ext>`, where the fingerprint is
//! the first 12 hex characters of the URL's SHA-256. The same URL therefore
//! maps to the same file on every run, and distinct URLs practically never
//! collide even when they share a basename (`.../a/logo.png`, `.../b/logo.png`).
//!
//! When the URL path carries no recognised image extension the extension can
//! only be decided from the response's `Content-Type`, so resolution is
//! two-phase: [`resolve`] returns [`NamePlan::NeedsContentType`] and the
//! fetcher calls [`NamePlan::finalize`] once headers are known.

use percent_encoding::percent_decode_str;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Extensions accepted from the URL path, lowercase, without the dot.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp", "svg"];

/// Extension used when neither the URL nor the content type says otherwise.
pub const DEFAULT_EXTENSION: &str = "jpg";

const FINGERPRINT_LEN: usize = 12;
const MAX_STEM_CHARS: usize = 20;
const ILLEGAL_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// The final local name of an image.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResolvedName {
    /// File name inside the images folder, e.g. `a_0123456789ab.png`.
    pub file_name: String,
    /// Path relative to the document, always `/`-separated, e.g. `images/a_0123456789ab.png`.
    pub relative_path: String,
}

impl ResolvedName {
    fn new(images_dir: &str, file_name: String) -> Self {
        Self {
            relative_path: format!("{images_dir}/{file_name}"),
            file_name,
        }
    }
}

/// Result of the first naming phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamePlan {
    /// The URL carried an image extension; the name is final.
    Known(ResolvedName),
    /// The extension depends on the response's content type.
    NeedsContentType { images_dir: String, stem: String },
}

impl NamePlan {
    /// Decide the final name. `content_type` is ignored for [`NamePlan::Known`].
    pub fn finalize(&self, content_type: Option<&str>) -> ResolvedName {
        match self {
            NamePlan::Known(name) => name.clone(),
            NamePlan::NeedsContentType { images_dir, stem } => {
                let ext = content_type
                    .and_then(extension_for_content_type)
                    .unwrap_or(DEFAULT_EXTENSION);
                ResolvedName::new(images_dir, format!("{stem}.{ext}"))
            }
        }
    }

    /// Every name this plan could finalize to.
    ///
    /// Lets the fetcher detect an image stored by an earlier run before it
    /// knows the content type.
    pub fn candidates(&self) -> Vec<ResolvedName> {
        match self {
            NamePlan::Known(name) => vec![name.clone()],
            NamePlan::NeedsContentType { images_dir, stem } => CONTENT_TYPE_EXTENSIONS
                .iter()
                .map(|ext| ResolvedName::new(images_dir, format!("{stem}.{ext}")))
                .collect(),
        }
    }
}

/// Extensions [`extension_for_content_type`] can produce; the default comes first.
const CONTENT_TYPE_EXTENSIONS: &[&str] = &["jpg", "png", "gif", "webp", "svg", "bmp"];

/// Map a `Content-Type` value to a file extension.
pub fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    let ct = content_type.to_ascii_lowercase();
    if ct.contains("jpeg") || ct.contains("jpg") {
        Some("jpg")
    } else if ct.contains("png") {
        Some("png")
    } else if ct.contains("gif") {
        Some("gif")
    } else if ct.contains("webp") {
        Some("webp")
    } else if ct.contains("svg") {
        Some("svg")
    } else if ct.contains("bmp") {
        Some("bmp")
    } else {
        None
    }
}

/// Short, stable fingerprint of a URL.
pub fn fingerprint(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(FINGERPRINT_LEN);
    hex
}

/// Replace characters that are illegal in file names and cap the length.
pub fn sanitize_stem(stem: &str) -> String {
    let cleaned: String = stem
        .chars()
        .map(|c| {
            if ILLEGAL_CHARS.contains(&c) || c.is_control() || c.is_whitespace() {
                '_'
            } else {
                c
            }
        })
        .take(MAX_STEM_CHARS)
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "image".to_string()
    } else {
        cleaned.to_string()
    }
}

/// First naming phase for `url`, placing the file under `images_dir`.
///
/// Never fails: unparseable URLs fall back to a content-type name.
pub fn resolve(url: &str, images_dir: &str) -> NamePlan {
    let fp = fingerprint(url);

    if let Some((stem, ext)) = basename_with_image_ext(url) {
        let file_name = format!("{}_{}.{}", sanitize_stem(&stem), fp, ext);
        return NamePlan::Known(ResolvedName::new(images_dir, file_name));
    }

    NamePlan::NeedsContentType {
        images_dir: images_dir.to_string(),
        stem: format!("image_{fp}"),
    }
}

/// Decoded `(stem, lowercase ext)` of the last path segment, when the
/// extension is a recognised image type.
fn basename_with_image_ext(url: &str) -> Option<(String, String)> {
    let parsed = Url::parse(url).ok()?;
    let last = parsed.path_segments()?.next_back()?;
    let decoded = percent_decode_str(last).decode_utf8_lossy();
    // A decoded `%2F` must not reintroduce a separator.
    let name = decoded.rsplit(['/', '\\']).next()?;
    let (stem, ext) = name.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    IMAGE_EXTENSIONS
        .contains(&ext.as_str())
        .then(|| (stem.to_string(), ext))
}
