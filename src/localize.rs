//! Run driver: localise every document under a root folder.
//!
//! Documents are handled one after another; the images of a single document
//! are fetched concurrently by the coordinator. A document that cannot be
//! read or written back is recorded in its [`DocumentReport`] and the run
//! moves on, so one broken file never costs the rest of the tree.

use crate::config::LocalizerConfig;
use crate::error::LocalizeError;
use crate::output::{DocumentReport, RunOutput, RunStats};
use crate::pipeline::coordinate::coordinate;
use crate::pipeline::discover::discover;
use crate::pipeline::extract::extract_references;
use crate::pipeline::fetch::{Fetcher, HttpImageSource, ImageSource};
use crate::pipeline::rewrite;
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Download the remote images of every document under `root`.
///
/// # Returns
/// `Ok(RunOutput)` once every document was attempted, even if some images or
/// documents failed (check `output.stats`).
///
/// # Errors
/// Returns `Err(LocalizeError)` only for fatal errors:
/// - `root` does not exist or is not a directory
/// - the HTTP client cannot be built
pub async fn localize_dir(
    root: impl AsRef<Path>,
    config: &LocalizerConfig,
) -> Result<RunOutput, LocalizeError> {
    let source = HttpImageSource::new(config)?;
    localize_dir_with_source(root, config, Arc::new(source)).await
}

/// [`localize_dir`] with a caller-supplied image source.
///
/// Useful for tests and for callers that need custom transport (proxies,
/// caching, rate limiting).
pub async fn localize_dir_with_source(
    root: impl AsRef<Path>,
    config: &LocalizerConfig,
    source: Arc<dyn ImageSource>,
) -> Result<RunOutput, LocalizeError> {
    let start = Instant::now();
    let root = root.as_ref();
    info!("Scanning {}", root.display());

    // ── Step 1: Discover documents ───────────────────────────────────────
    let documents = discover(root, config)?;
    info!("Found {} documents", documents.len());

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(documents.len());
    }

    // ── Step 2: Localise each document in turn ───────────────────────────
    let fetcher = Fetcher::new(source, config);
    let mut stats = RunStats {
        documents_found: documents.len(),
        ..RunStats::default()
    };
    let mut reports = Vec::with_capacity(documents.len());

    for (i, path) in documents.iter().enumerate() {
        info!("Processing [{}/{}]: {}", i + 1, documents.len(), path.display());
        let mut report = DocumentReport::new(path.clone());

        if let Err(e) = localize_document(path, i + 1, &fetcher, config, &mut report).await {
            error!("Document failed {}: {}", path.display(), e);
            report.error = Some(e.to_string());
        }

        if let Some(ref cb) = config.progress_callback {
            cb.on_document_complete(path, report.replaced, report.failed);
        }
        stats.record(&report);
        reports.push(report);
    }

    // ── Step 3: Summarise ────────────────────────────────────────────────
    stats.duration_ms = start.elapsed().as_millis() as u64;
    info!(
        "Run complete: {} documents, {} images downloaded, {} skipped, {} failed, {}ms",
        stats.documents_found,
        stats.images_downloaded,
        stats.images_skipped,
        stats.images_failed,
        stats.duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(stats.documents_found, stats.images_downloaded);
    }

    Ok(RunOutput {
        root: root.to_path_buf(),
        stats,
        documents: reports,
    })
}

/// Synchronous wrapper around [`localize_dir`].
///
/// Creates a temporary tokio runtime internally.
pub fn localize_dir_sync(
    root: impl AsRef<Path>,
    config: &LocalizerConfig,
) -> Result<RunOutput, LocalizeError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| LocalizeError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(localize_dir(root, config))
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Read, fetch, rewrite. Counters are filled in as the steps complete so a
/// late write failure still reports the images already stored.
async fn localize_document(
    path: &Path,
    index: usize,
    fetcher: &Fetcher,
    config: &LocalizerConfig,
    report: &mut DocumentReport,
) -> Result<(), LocalizeError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| LocalizeError::DocumentRead {
            path: path.to_path_buf(),
            source,
        })?;

    let references = extract_references(&text);
    report.references = references.len();
    report.unique_urls = references
        .iter()
        .map(|r| r.url.as_str())
        .collect::<HashSet<_>>()
        .len();

    if let Some(ref cb) = config.progress_callback {
        cb.on_document_start(path, index, references.len());
    }

    if references.is_empty() {
        debug!("No remote images in {}", path.display());
        return Ok(());
    }
    info!(
        "{} image references ({} unique) in {}",
        report.references,
        report.unique_urls,
        path.display()
    );

    let folder = document_dir(path).join(&config.images_dir_name);
    let result = coordinate(
        &references,
        &folder,
        &config.images_dir_name,
        fetcher,
        config.max_workers,
        config.progress_callback.as_ref(),
    )
    .await;

    report.downloaded = result.downloaded();
    report.skipped_existing = result.skipped_existing();
    report.failed_urls = result.failed_urls();
    report.failed = result.failed_references();
    report.replaced = report.references - report.failed;

    if result.replacements.is_empty() {
        info!("Nothing to rewrite in {}", path.display());
        return Ok(());
    }

    let rewritten = rewrite::apply(&text, &result.replacements);
    if rewritten == text {
        return Ok(());
    }
    write_document(path, rewritten).await?;
    report.rewritten = true;
    info!(
        "Updated {}: {} replaced, {} kept remote",
        path.display(),
        report.replaced,
        report.failed
    );
    Ok(())
}

/// Folder containing `path`; `.` for bare file names.
fn document_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

/// Replace `path` with `text` atomically: temp file in the same folder, then rename.
async fn write_document(path: &Path, text: String) -> Result<(), LocalizeError> {
    let target: PathBuf = path.to_path_buf();
    let written = tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        let mut tmp = tempfile::Builder::new()
            .prefix(".mdimg")
            .suffix(".tmp")
            .tempfile_in(document_dir(&target))?;
        tmp.write_all(text.as_bytes())?;
        tmp.as_file().sync_all()?;
        if let Ok(meta) = std::fs::metadata(&target) {
            tmp.as_file().set_permissions(meta.permissions())?;
        }
        tmp.persist(&target).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(|e| LocalizeError::Internal(format!("Document write task failed: {}", e)))?;

    written.map_err(|source| LocalizeError::DocumentWrite {
        path: path.to_path_buf(),
        source,
    })
}
