use crate::error::ExtractionError;
use crate::types::ArchiveType;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::spawn_blocking;
use tracing::{debug, warn};

use super::release::ReleaseLookup;
use super::sevenz::SevenZipExtractor;
use super::zip::ZipExtractor;

/// Buffered backend events between the blocking extractor and the orchestrator
const BACKEND_CHANNEL_CAPACITY: usize = 64;

/// Position of an extraction within the archive's entry list
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EntryProgress {
    /// Index of the entry being extracted (0-based)
    pub entry_index: usize,
    /// Number of entries in the archive
    pub total_entries: usize,
    /// Overall progress in [0.0, 1.0]
    pub fraction: f32,
}

/// Event reported by an archive backend
#[derive(Clone, Debug, PartialEq)]
pub enum BackendEvent {
    /// Extraction advanced
    Progress(EntryProgress),
    /// Extraction finished; extracted files in archive order
    Entries(Vec<PathBuf>),
}

/// Format-specific extraction engine, selected by [`ArchiveType`]
pub enum ArchiveBackend {
    /// Single pass that unpacks and reports progress per entry (ZIP)
    Streaming(ZipExtractor),
    /// Lists every entry first, then extracts with scalar progress (7z)
    TwoPhase(SevenZipExtractor),
}

impl std::fmt::Debug for ArchiveBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArchiveBackend::Streaming(_) => f.write_str("Streaming(zip)"),
            ArchiveBackend::TwoPhase(_) => f.write_str("TwoPhase(7z)"),
        }
    }
}

impl ArchiveBackend {
    /// Backend for an archive type
    pub fn for_type(archive_type: ArchiveType, lookup: Arc<dyn ReleaseLookup>) -> Self {
        match archive_type {
            ArchiveType::Zip => ArchiveBackend::Streaming(ZipExtractor),
            ArchiveType::SevenZip => ArchiveBackend::TwoPhase(SevenZipExtractor::new(lookup)),
        }
    }

    /// Extract synchronously, reporting events through `emit`
    ///
    /// On success the last event emitted is always [`BackendEvent::Entries`].
    pub fn extract(
        &self,
        archive_path: &Path,
        dest_path: &Path,
        emit: &mut dyn FnMut(BackendEvent),
    ) -> Result<(), ExtractionError> {
        match self {
            ArchiveBackend::Streaming(zip) => zip.extract(archive_path, dest_path, emit),
            ArchiveBackend::TwoPhase(sevenz) => sevenz.extract(archive_path, dest_path, emit),
        }
    }
}

/// Run a backend on the blocking pool and stream its events back
///
/// The extraction itself cannot be interrupted: if the receiver is dropped the
/// backend keeps running to completion and its events are discarded, so the
/// destination directory is never left half-written by a cancellation.
pub(crate) fn spawn_backend(
    backend: ArchiveBackend,
    archive_path: PathBuf,
    dest_path: PathBuf,
) -> mpsc::Receiver<Result<BackendEvent, ExtractionError>> {
    let (tx, rx) = mpsc::channel(BACKEND_CHANNEL_CAPACITY);

    spawn_blocking(move || {
        debug!(?archive_path, ?backend, "running archive backend");

        let mut emit = |event: BackendEvent| {
            // receiver gone: keep extracting, drop the event
            let _ = tx.blocking_send(Ok(event));
        };

        if let Err(e) = backend.extract(&archive_path, &dest_path, &mut emit) {
            warn!(?archive_path, error = %e, "archive backend failed");
            let _ = tx.blocking_send(Err(e));
        }
    });

    rx
}

/// Create a directory and its parents, mapping failures to an extraction error
pub(crate) fn create_dir_all(path: &Path, archive_path: &Path) -> Result<(), ExtractionError> {
    std::fs::create_dir_all(path).map_err(|e| {
        ExtractionError::failed(
            archive_path,
            format!("failed to create directory {}: {}", path.display(), e),
        )
    })
}

/// Create a file for writing, mapping failures to an extraction error
pub(crate) fn create_file(
    path: &Path,
    archive_path: &Path,
) -> Result<std::fs::File, ExtractionError> {
    std::fs::File::create(path).map_err(|e| {
        ExtractionError::failed(
            archive_path,
            format!("failed to create output file {}: {}", path.display(), e),
        )
    })
}
