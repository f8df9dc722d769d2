//! Archive extraction with lifecycle events
//!
//! This module drives one archive at a time through
//! `Started -> Updated* -> (Completed | Failed)` and removes the source archive
//! once the terminal event has been emitted. ZIP files go through the streaming
//! [`ZipExtractor`], 7z files through the two-phase [`SevenZipExtractor`].

mod release;
mod sevenz;
mod shared;
mod zip;


// Re-exports
pub use release::{NoOpReleaseLookup, ReleaseLookup, crc_fingerprint};
pub use sevenz::{ProgressStep, ProgressSynthesizer, SevenZipExtractor};
pub use shared::{ArchiveBackend, BackendEvent, EntryProgress};
pub use zip::ZipExtractor;

use crate::error::ExtractionError;
use crate::types::{ArchiveType, ExtractionEvent};
use crate::utils::{is_macos_metadata, remove_file_best_effort};
use futures::Stream;
use shared::spawn_backend;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Extraction orchestrator
///
/// Cheap to clone; clones share the release lookup.
#[derive(Clone)]
pub struct Extractor {
    destination: PathBuf,
    lookup: Arc<dyn ReleaseLookup>,
}

impl std::fmt::Debug for Extractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extractor")
            .field("destination", &self.destination)
            .finish_non_exhaustive()
    }
}

impl Extractor {
    /// Create an extractor writing into `destination`
    pub fn new(destination: impl Into<PathBuf>, lookup: Arc<dyn ReleaseLookup>) -> Self {
        Self {
            destination: destination.into(),
            lookup,
        }
    }

    /// Directory archives are extracted into
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Extract one archive, passing every lifecycle event to `emit`
    ///
    /// Emits nothing at all for paths under a macOS metadata folder or for
    /// files that no longer exist. Otherwise emits `Started`, progress updates
    /// and exactly one terminal event, then deletes the source archive. A
    /// missing source at delete time counts as deleted; any other delete
    /// failure is logged.
    ///
    /// An unrecognized extension yields `Started` then `Failed`, and the file
    /// is deleted like any other failed archive.
    ///
    /// If `cancel` fires mid-extraction, forwarding stops without a terminal
    /// event and the source is kept. The backend call itself runs to
    /// completion in the background.
    pub async fn run(
        &self,
        archive: &Path,
        cancel: &CancellationToken,
        mut emit: impl FnMut(ExtractionEvent),
    ) {
        if is_macos_metadata(archive) {
            debug!(?archive, "ignoring macOS metadata file");
            return;
        }

        if !tokio::fs::try_exists(archive).await.unwrap_or(false) {
            warn!(?archive, "no file at path, skipping extraction");
            return;
        }

        let path = archive.to_path_buf();
        emit(ExtractionEvent::Started { path: path.clone() });
        info!(?archive, destination = ?self.destination, "extraction started");

        let terminal = match ArchiveType::from_path(archive) {
            Some(archive_type) => {
                match self.drive_backend(archive_type, &path, cancel, &mut emit).await {
                    Some(terminal) => terminal,
                    None => return,
                }
            }
            None => {
                warn!(?archive, "no extraction backend for this file type");
                ExtractionEvent::Failed {
                    path: path.clone(),
                    reason: ExtractionError::UnsupportedFormat { archive: path }.to_string(),
                }
            }
        };

        emit(terminal);
        remove_file_best_effort(archive).await;
    }

    /// Forward backend progress until the backend finishes
    ///
    /// Returns the terminal event, or `None` when `cancel` fired first.
    async fn drive_backend(
        &self,
        archive_type: ArchiveType,
        path: &Path,
        cancel: &CancellationToken,
        emit: &mut impl FnMut(ExtractionEvent),
    ) -> Option<ExtractionEvent> {
        let backend = ArchiveBackend::for_type(archive_type, self.lookup.clone());
        let mut events = spawn_backend(backend, path.to_path_buf(), self.destination.clone());

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(archive = ?path, "extraction cancelled, result will be discarded");
                    return None;
                }
                next = events.recv() => next,
            };

            let error = match next {
                Some(Ok(BackendEvent::Progress(progress))) => {
                    emit(ExtractionEvent::Updated {
                        path: path.to_path_buf(),
                        progress: progress.fraction,
                    });
                    continue;
                }
                Some(Ok(BackendEvent::Entries(files))) => {
                    info!(archive = ?path, file_count = files.len(), "extraction complete");
                    return Some(ExtractionEvent::Completed {
                        path: path.to_path_buf(),
                        files,
                    });
                }
                Some(Err(e)) => e,
                None => ExtractionError::Interrupted {
                    archive: path.to_path_buf(),
                },
            };

            warn!(archive = ?path, error = %error, "extraction failed");
            return Some(ExtractionEvent::Failed {
                path: path.to_path_buf(),
                reason: error.to_string(),
            });
        }
    }

    /// Extract one archive on a new task and stream its events
    ///
    /// The stream ends after the source archive has been removed (or
    /// immediately, when the entry guard rejects the path).
    pub fn extract(&self, archive: impl Into<PathBuf>) -> impl Stream<Item = ExtractionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let extractor = self.clone();
        let archive = archive.into();

        tokio::spawn(async move {
            let cancel = CancellationToken::new();
            extractor
                .run(&archive, &cancel, |event| {
                    let _ = tx.send(event);
                })
                .await;
        });

        UnboundedReceiverStream::new(rx)
    }
}
