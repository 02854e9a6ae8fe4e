//! Document discovery: every matching file below the root, sorted.
//!
//! No exclusion rules are applied; hidden folders and vendored trees are
//! walked like any other. Image folders contain no documents, so they never
//! contribute entries.

use crate::config::LocalizerConfig;
use crate::error::LocalizeError;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Collect documents under `root` whose extension is in `config.extensions`.
///
/// Unreadable entries are logged and skipped. Symlinks are not followed.
pub fn discover(root: &Path, config: &LocalizerConfig) -> Result<Vec<PathBuf>, LocalizeError> {
    if !root.is_dir() {
        return Err(LocalizeError::RootNotFound {
            path: root.to_path_buf(),
        });
    }

    let mut documents: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| config.matches_extension(ext))
        })
        .map(|e| e.into_path())
        .collect();

    documents.sort();
    debug!("Discovered {} documents under {}", documents.len(), root.display());
    Ok(documents)
}
