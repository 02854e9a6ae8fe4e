//! Pipeline stages for localising remote images.
//!
//! Each submodule implements exactly one step, so every step can be tested
//! on its own and the network can be swapped for an in-memory source.
//!
//! ## Data Flow
//!
//! ```text
//! discover ──▶ extract ──▶ coordinate ──▶ rewrite
//! (walkdir)    (regex)     │  naming       (pure)
//!                          │  fetch ──▶ recompress
//!                          └  (reqwest)   (image, spawn_blocking)
//! ```
//!
//! 1. [`discover`]   — walk the root and list documents, sorted
//! 2. [`extract`]    — find `![alt](url)` and `<img src=…>` references
//! 3. [`naming`]     — derive a deterministic file name from each URL
//! 4. [`fetch`]      — download with retry/backoff; the only stage with
//!    network I/O
//! 5. [`recompress`] — re-encode oversized raster images as JPEG
//! 6. [`coordinate`] — fan unique URLs out over a bounded worker pool and
//!    build the replacement map after the join
//! 7. [`rewrite`]    — substitute local paths into the document text

pub mod coordinate;
pub mod discover;
pub mod extract;
pub mod fetch;
pub mod naming;
pub mod recompress;
pub mod rewrite;

#[cfg(test)]
pub(crate) mod testing;
