//! Document discovery.

use crate::error::Result;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Extension of documents PIE processes.
pub const DOCUMENT_EXTENSION: &str = "pdf";

/// Check if a path has the document extension (case-insensitive).
pub fn is_document(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(DOCUMENT_EXTENSION))
}

/// Recursively collect every document under `root`, sorted by path.
///
/// Only the extension is checked. Links to files are collected; links to
/// directories are not descended into, so a link cycle cannot trap the walk.
/// A missing root yields no documents. Unreadable directories are logged and
/// skipped.
pub fn scan_documents(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.exists() {
        warn!("Source directory {} does not exist", root.display());
        return Ok(Vec::new());
    }

    let mut documents = Vec::new();

    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                continue;
            }
        };

        if is_file(&entry) && is_document(entry.path()) {
            documents.push(entry.into_path());
        }
    }

    debug!("Found {} document(s) under {}", documents.len(), root.display());
    Ok(documents)
}

/// A regular file, or a link that resolves to one.
fn is_file(entry: &DirEntry) -> bool {
    let file_type = entry.file_type();
    file_type.is_file() || (file_type.is_symlink() && entry.path().is_file())
}
