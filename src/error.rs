//! Error types for the md-image-localizer library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`LocalizeError`] — **Fatal** for a run or for one document: the root
//!   folder is missing, a document cannot be read or written back, the HTTP
//!   client cannot be built. A document-level error aborts that document only;
//!   the driver records it in [`crate::output::DocumentReport`] and moves on.
//!
//! * [`FetchError`] — **Non-fatal**: a single image failed (timeout, 404,
//!   truncated body). It is retried with backoff and, once retries run out,
//!   the reference keeps its original remote link. Stored inside
//!   [`crate::pipeline::fetch::DownloadOutcome`] so callers can inspect
//!   partial success rather than losing the whole document to one bad image.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors returned by the md-image-localizer library.
///
/// Per-image failures use [`FetchError`] and never surface here.
#[derive(Debug, Error)]
pub enum LocalizeError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The root folder does not exist or is not a directory.
    #[error("Root folder not found: '{path}'\nCheck the path exists and is a directory.")]
    RootNotFound { path: PathBuf },

    /// A document could not be read as UTF-8 text.
    #[error("Failed to read document '{path}': {source}")]
    DocumentRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Output errors ─────────────────────────────────────────────────────
    /// The rewritten document could not be written back in place.
    #[error("Failed to write document '{path}': {source}")]
    DocumentWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── HTTP errors ───────────────────────────────────────────────────────
    /// The shared HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single image download.
///
/// Every variant is retryable; the fetcher gives up after
/// [`crate::config::LocalizerConfig::max_retries`] extra attempts.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum FetchError {
    /// Connection refused, reset, DNS failure or a broken body stream.
    #[error("Network error: {detail}")]
    Network { detail: String },

    /// The request did not complete within the configured timeout.
    #[error("Request timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The server answered with a non-2xx status.
    #[error("HTTP {status}")]
    HttpStatus { status: u16 },

    /// The body is too small to be a real image.
    #[error("Payload too small: {len} bytes (minimum {min})")]
    PayloadTooSmall { len: usize, min: usize },

    /// The image could not be persisted.
    #[error("Failed to write '{path}': {detail}")]
    Write { path: PathBuf, detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_not_found_display() {
        let e = LocalizeError::RootNotFound {
            path: PathBuf::from("/no/such/dir"),
        };
        assert!(e.to_string().contains("/no/such/dir"));
    }

    #[test]
    fn document_write_keeps_source() {
        use std::error::Error as _;
        let e = LocalizeError::DocumentWrite {
            path: PathBuf::from("a.md"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(e.to_string().contains("a.md"));
        assert!(e.source().is_some());
    }

    #[test]
    fn http_status_display() {
        let e = FetchError::HttpStatus { status: 404 };
        assert_eq!(e.to_string(), "HTTP 404");
    }

    #[test]
    fn payload_too_small_display() {
        let e = FetchError::PayloadTooSmall { len: 12, min: 100 };
        let msg = e.to_string();
        assert!(msg.contains("12 bytes"), "got: {msg}");
        assert!(msg.contains("100"), "got: {msg}");
    }

    #[test]
    fn fetch_error_serialises() {
        let e = FetchError::Timeout { secs: 30 };
        let json = serde_json::to_string(&e).expect("serialise");
        assert!(json.contains("Timeout"));
    }
}
