//! Result types returned by a localisation run.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// What happened to one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentReport {
    pub path: PathBuf,
    /// Remote image references found, duplicates included.
    pub references: usize,
    /// Distinct remote URLs.
    pub unique_urls: usize,
    /// References rewritten to a local path.
    pub replaced: usize,
    /// References left pointing at their remote URL.
    pub failed: usize,
    /// Distinct URLs that failed after all retries.
    pub failed_urls: usize,
    /// Images written by this run.
    pub downloaded: usize,
    /// Images that were already on disk.
    pub skipped_existing: usize,
    /// Whether the document was written back.
    pub rewritten: bool,
    /// Set when the document could not be read or written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DocumentReport {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self {
            path,
            ..Self::default()
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate counters for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub documents_found: usize,
    /// Documents handled without a fatal error.
    pub documents_processed: usize,
    pub documents_failed: usize,
    pub documents_rewritten: usize,
    pub images_downloaded: usize,
    pub images_skipped: usize,
    /// Distinct URLs that failed after all retries.
    pub images_failed: usize,
    pub references_replaced: usize,
    pub references_failed: usize,
    pub duration_ms: u64,
}

impl RunStats {
    /// Fold one document's report into the totals.
    pub(crate) fn record(&mut self, report: &DocumentReport) {
        if report.is_ok() {
            self.documents_processed += 1;
        } else {
            self.documents_failed += 1;
        }
        if report.rewritten {
            self.documents_rewritten += 1;
        }
        self.images_downloaded += report.downloaded;
        self.images_skipped += report.skipped_existing;
        self.images_failed += report.failed_urls;
        self.references_replaced += report.replaced;
        self.references_failed += report.failed;
    }
}

/// Complete result of [`crate::localize::localize_dir`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunOutput {
    pub root: PathBuf,
    pub stats: RunStats,
    /// One report per discovered document, in discovery order.
    pub documents: Vec<DocumentReport>,
}

impl RunOutput {
    /// Documents that hit a fatal error.
    pub fn failed_documents(&self) -> impl Iterator<Item = &DocumentReport> {
        self.documents.iter().filter(|d| !d.is_ok())
    }
}
