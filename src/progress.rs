//! Progress-callback trait for per-document and per-image events.
//!
//! Inject an [`Arc<dyn LocalizeProgressCallback>`] via
//! [`crate::config::LocalizerConfigBuilder::progress_callback`] to receive
//! events as the driver walks documents and the coordinator finishes images.
//! The trait is `Send + Sync` because image events fire from concurrent
//! download futures.
//!
//! # Example
//!
//! ```rust
//! use md_image_localizer::{LocalizeProgressCallback, LocalizerConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     downloaded: AtomicUsize,
//! }
//!
//! impl LocalizeProgressCallback for CountingCallback {
//!     fn on_image_complete(&self, url: &str, relative_path: &str) {
//!         self.downloaded.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{url} -> {relative_path}");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { downloaded: AtomicUsize::new(0) });
//!
//! let config = LocalizerConfig::builder()
//!     .progress_callback(counter as Arc<dyn LocalizeProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::path::Path;
use std::sync::Arc;

/// Called by the driver and coordinator as a run progresses.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
///
/// # Thread safety
///
/// `on_image_complete` and `on_image_error` may be called concurrently for
/// images of the same document. Implementations must protect shared mutable
/// state (e.g. `Mutex`, `AtomicUsize`).
pub trait LocalizeProgressCallback: Send + Sync {
    /// Called once after discovery, before any document is read.
    fn on_run_start(&self, total_documents: usize) {
        let _ = total_documents;
    }

    /// Called before a document's references are fetched.
    ///
    /// # Arguments
    /// * `path`       — the document being processed
    /// * `index`      — 1-indexed position in the run
    /// * `references` — number of remote image references found
    fn on_document_start(&self, path: &Path, index: usize, references: usize) {
        let _ = (path, index, references);
    }

    /// Called when one image is available locally (downloaded or already present).
    fn on_image_complete(&self, url: &str, relative_path: &str) {
        let _ = (url, relative_path);
    }

    /// Called when one image failed after all retries.
    fn on_image_error(&self, url: &str, error: &str) {
        let _ = (url, error);
    }

    /// Called after a document has been handled.
    ///
    /// # Arguments
    /// * `replaced` — number of references rewritten to local paths
    /// * `failed`   — number of references left pointing at the remote URL
    fn on_document_complete(&self, path: &Path, replaced: usize, failed: usize) {
        let _ = (path, replaced, failed);
    }

    /// Called once after every document was attempted.
    fn on_run_complete(&self, total_documents: usize, images_downloaded: usize) {
        let _ = (total_documents, images_downloaded);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl LocalizeProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::LocalizerConfig`].
pub type ProgressCallback = Arc<dyn LocalizeProgressCallback>;
