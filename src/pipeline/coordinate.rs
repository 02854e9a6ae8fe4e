//! Download coordination: fan one document's references out to the fetcher.
//!
//! Work is deduplicated by URL, resolved to a [`NamePlan`] once, and driven
//! through `buffer_unordered(max_workers)` so at most `max_workers` requests
//! are in flight. Each future returns its own outcome; nothing is shared and
//! mutated between workers. The replacement map is assembled only after the
//! stream is drained, so the rewriter never sees a partial result.

use crate::pipeline::extract::ImageReference;
use crate::pipeline::fetch::{DownloadOutcome, Fetcher};
use crate::pipeline::naming::resolve;
use crate::progress::ProgressCallback;
use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, error};

/// Matched document text → local relative path.
///
/// Ordered so rewriting is reproducible.
pub type ReplacementMap = BTreeMap<String, String>;

/// Outcome for one unique URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlOutcome {
    pub url: String,
    /// Number of references in the document pointing at this URL.
    pub references: usize,
    pub outcome: DownloadOutcome,
}

/// Everything the coordinator learned about one document.
#[derive(Debug, Clone, Default)]
pub struct CoordinatorResult {
    pub replacements: ReplacementMap,
    /// One entry per unique URL, in order of first appearance.
    pub outcomes: Vec<UrlOutcome>,
}

impl CoordinatorResult {
    /// Images written by this run.
    pub fn downloaded(&self) -> usize {
        self.count(|o| matches!(o, DownloadOutcome::Success(img) if !img.skipped_existing()))
    }

    /// Images that were already on disk.
    pub fn skipped_existing(&self) -> usize {
        self.count(|o| matches!(o, DownloadOutcome::Success(img) if img.skipped_existing()))
    }

    /// URLs that failed after all retries.
    pub fn failed_urls(&self) -> usize {
        self.count(|o| !o.is_success())
    }

    /// References left pointing at their remote URL.
    pub fn failed_references(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| !o.outcome.is_success())
            .map(|o| o.references)
            .sum()
    }

    fn count(&self, pred: impl Fn(&DownloadOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.outcome)).count()
    }
}

/// Download every referenced image into `folder` and build the replacement map.
///
/// `images_dir_name` is the folder name used in the rewritten relative links.
/// Failures are logged and leave the reference out of the map.
pub async fn coordinate(
    references: &[ImageReference],
    folder: &Path,
    images_dir_name: &str,
    fetcher: &Fetcher,
    max_workers: usize,
    progress: Option<&ProgressCallback>,
) -> CoordinatorResult {
    if references.is_empty() {
        return CoordinatorResult::default();
    }

    // Unique URLs in order of first appearance, with their reference counts.
    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for r in references {
        let n = counts.entry(r.url.as_str()).or_insert(0);
        if *n == 0 {
            order.push(r.url.as_str());
        }
        *n += 1;
    }
    debug!(
        "{} references, {} unique URLs, {} workers",
        references.len(),
        order.len(),
        max_workers
    );

    let mut finished: Vec<(usize, DownloadOutcome)> =
        stream::iter(order.iter().enumerate().map(|(idx, &url)| async move {
            let plan = resolve(url, images_dir_name);
            let outcome = fetcher.fetch(url, &plan, folder).await;
            if let Some(cb) = progress {
                match &outcome {
                    DownloadOutcome::Success(img) => {
                        cb.on_image_complete(url, &img.name.relative_path)
                    }
                    DownloadOutcome::Failure(e) => cb.on_image_error(url, &e.to_string()),
                }
            }
            (idx, outcome)
        }))
        .buffer_unordered(max_workers.max(1))
        .collect()
        .await;

    // Join point: every fetch has resolved. Merge in document order.
    finished.sort_by_key(|(idx, _)| *idx);

    let outcomes: Vec<UrlOutcome> = finished
        .into_iter()
        .map(|(idx, outcome)| {
            let url = order[idx];
            UrlOutcome {
                url: url.to_string(),
                references: counts.get(url).copied().unwrap_or(0),
                outcome,
            }
        })
        .collect();

    let by_url: HashMap<&str, &DownloadOutcome> = outcomes
        .iter()
        .map(|o| (o.url.as_str(), &o.outcome))
        .collect();

    let mut replacements = ReplacementMap::new();
    for r in references {
        match by_url.get(r.url.as_str()) {
            Some(DownloadOutcome::Success(img)) => {
                replacements.insert(r.matched_text.clone(), img.name.relative_path.clone());
            }
            Some(DownloadOutcome::Failure(e)) => {
                error!("Keeping original link for {}: {}", r.url, e);
            }
            None => {}
        }
    }

    CoordinatorResult {
        replacements,
        outcomes,
    }
}
