//! Utility functions for path classification and file cleanup

use std::path::Path;
use tracing::{debug, error};

/// Path segment marking macOS resource-fork metadata folders
pub const MACOS_METADATA_MARKER: &str = "__MACOSX";

/// Lowercased final extension of a path, if any
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

/// Check if a path's file name starts with a dot
pub fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}

/// Check if a path lies inside (or is) a macOS metadata folder
pub fn is_macos_metadata(path: &Path) -> bool {
    path.components()
        .any(|c| c.as_os_str().to_string_lossy().contains(MACOS_METADATA_MARKER))
}

/// Remove a file, treating "already gone" as success
///
/// Any other failure is logged and swallowed. Returns whether the file is
/// gone afterwards.
pub async fn remove_file_best_effort(path: &Path) -> bool {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            debug!(?path, "removed source archive");
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(?path, "source archive already removed");
            true
        }
        Err(e) => {
            error!(?path, error = %e, "unable to delete source archive");
            false
        }
    }
}
