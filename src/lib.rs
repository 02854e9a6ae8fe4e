//! # md-image-localizer
//!
//! Download the remote images referenced by Markdown documents and rewrite
//! the documents to point at the local copies.
//!
//! ## Why this crate?
//!
//! Notes and docs that hotlink images rot: hosts go away, links expire, and
//! the documents stop rendering offline. This crate walks a folder tree,
//! stores every remote image next to the document that uses it, and rewrites
//! the link, leaving the rest of the text untouched. Runs are idempotent: an
//! image already on disk is never fetched or overwritten again.
//!
//! ## Pipeline Overview
//!
//! ```text
//! root folder
//!  │
//!  ├─ 1. Discover   every *.md below the root (walkdir, sorted)
//!  ├─ 2. Extract    ![alt](https://…) and <img src="https://…">
//!  ├─ 3. Name       <stem>_<sha256[..12]>.<ext>, deterministic per URL
//!  ├─ 4. Fetch      bounded concurrent downloads with retry/backoff
//!  ├─ 5. Shrink     oversized rasters re-encoded as JPEG (spawn_blocking)
//!  └─ 6. Rewrite    links swapped for images/<file>, written atomically
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use md_image_localizer::{localize_dir, LocalizerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = LocalizerConfig::default();
//!     let output = localize_dir("notes/", &config).await?;
//!     eprintln!(
//!         "{} images downloaded, {} failed",
//!         output.stats.images_downloaded, output.stats.images_failed
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `mdimg` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! md-image-localizer = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod localize;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{LocalizerConfig, LocalizerConfigBuilder, DEFAULT_USER_AGENT};
pub use error::{FetchError, LocalizeError};
pub use localize::{localize_dir, localize_dir_sync, localize_dir_with_source};
pub use output::{DocumentReport, RunOutput, RunStats};
pub use pipeline::fetch::{FetchedImage, HttpImageSource, ImageSource};
pub use progress::{LocalizeProgressCallback, NoopProgressCallback, ProgressCallback};
