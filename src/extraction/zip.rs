use crate::error::ExtractionError;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::shared::{BackendEvent, EntryProgress, create_dir_all, create_file};

/// Streaming extractor for ZIP files
///
/// Entries are unpacked in archive order in a single pass. A progress event is
/// reported before each entry, so an archive with `n` named entries reports
/// fractions `0/n, 1/n, ..., (n-1)/n`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ZipExtractor;

impl ZipExtractor {
    fn open(archive_path: &Path) -> Result<zip::ZipArchive<std::fs::File>, ExtractionError> {
        let file = std::fs::File::open(archive_path).map_err(|e| {
            ExtractionError::failed(archive_path, format!("failed to open ZIP archive: {}", e))
        })?;

        zip::ZipArchive::new(file).map_err(|e| {
            ExtractionError::failed(archive_path, format!("failed to read ZIP archive: {}", e))
        })
    }

    /// Number of entries with a non-empty name
    fn named_entry_count(
        archive: &mut zip::ZipArchive<std::fs::File>,
        archive_path: &Path,
    ) -> Result<usize, ExtractionError> {
        let mut count = 0;
        for i in 0..archive.len() {
            let entry = archive.by_index_raw(i).map_err(|e| {
                ExtractionError::failed(archive_path, format!("failed to read ZIP entry: {}", e))
            })?;
            if !entry.name().is_empty() {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Extract a single ZIP entry to disk, creating directories as needed
    ///
    /// Returns the extracted file path, or `None` for directories and entries
    /// whose name would escape the destination.
    fn extract_entry(
        mut file: zip::read::ZipFile,
        dest_path: &Path,
        archive_path: &Path,
    ) -> Result<Option<PathBuf>, ExtractionError> {
        let file_path = match file.enclosed_name() {
            Some(path) => dest_path.join(path),
            None => {
                warn!(name = file.name(), "skipping entry with unsafe path");
                return Ok(None);
            }
        };

        if file.is_dir() {
            create_dir_all(&file_path, archive_path)?;
            return Ok(None);
        }

        if let Some(parent) = file_path.parent() {
            create_dir_all(parent, archive_path)?;
        }

        let mut outfile = create_file(&file_path, archive_path)?;
        std::io::copy(&mut file, &mut outfile).map_err(|e| {
            ExtractionError::failed(
                archive_path,
                format!("failed to extract {}: {}", file_path.display(), e),
            )
        })?;

        Ok(Some(file_path))
    }

    /// Extract a ZIP archive into `dest_path`
    pub fn extract(
        &self,
        archive_path: &Path,
        dest_path: &Path,
        emit: &mut dyn FnMut(BackendEvent),
    ) -> Result<(), ExtractionError> {
        debug!(?archive_path, ?dest_path, "starting ZIP extraction");

        create_dir_all(dest_path, archive_path)?;
        let mut archive = Self::open(archive_path)?;
        let total = Self::named_entry_count(&mut archive, archive_path)?;

        let mut extracted_files = Vec::new();
        let mut entry_index = 0;

        for i in 0..archive.len() {
            let file = archive.by_index(i).map_err(|e| {
                ExtractionError::failed(archive_path, format!("failed to read ZIP entry: {}", e))
            })?;

            if file.name().is_empty() {
                continue;
            }

            emit(BackendEvent::Progress(EntryProgress {
                entry_index,
                total_entries: total,
                fraction: entry_index as f32 / total as f32,
            }));
            entry_index += 1;

            if let Some(file_path) = Self::extract_entry(file, dest_path, archive_path)? {
                extracted_files.push(file_path);
            }
        }

        // release the archive handle before the source gets deleted
        drop(archive);

        info!(
            ?archive_path,
            extracted_count = extracted_files.len(),
            "ZIP extraction successful"
        );
        emit(BackendEvent::Entries(extracted_files));

        Ok(())
    }
}
