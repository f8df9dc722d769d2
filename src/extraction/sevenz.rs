use crate::error::ExtractionError;
use crate::types::ArchiveEntry;
use sevenz_rust::{Password, SevenZReader};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::release::{ReleaseLookup, crc_fingerprint};
use super::shared::{BackendEvent, EntryProgress, create_dir_all};

/// Copy buffer size used while streaming entry contents to disk
const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Resolution of the scalar extraction progress (0.1%)
const PROGRESS_STEPS: f32 = 1000.0;

/// Outcome of feeding one scalar progress value to a [`ProgressSynthesizer`]
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ProgressStep {
    /// A new progress value to report
    Update(EntryProgress),
    /// Same as the last reported value
    Unchanged,
    /// Progress reached 1.0; extraction is done
    Complete,
}

/// Turns a scalar progress in [0, 1] into entry-indexed progress
///
/// The entry index is `floor(progress * total)`, which is only an estimate:
/// with entries of very different sizes it lags behind the entry actually
/// being written.
#[derive(Debug)]
pub struct ProgressSynthesizer {
    total_entries: usize,
    last: Option<EntryProgress>,
    complete: bool,
}

impl ProgressSynthesizer {
    /// Create a synthesizer for an archive with `total_entries` entries
    pub fn new(total_entries: usize) -> Self {
        Self {
            total_entries,
            last: None,
            complete: false,
        }
    }

    /// Feed the next scalar progress value
    pub fn observe(&mut self, progress: f32) -> ProgressStep {
        if self.complete {
            return ProgressStep::Unchanged;
        }
        if progress >= 1.0 {
            self.complete = true;
            return ProgressStep::Complete;
        }

        let progress = progress.max(0.0);
        let step = EntryProgress {
            entry_index: (progress * self.total_entries as f32).floor() as usize,
            total_entries: self.total_entries,
            fraction: progress,
        };

        if self.last == Some(step) {
            ProgressStep::Unchanged
        } else {
            self.last = Some(step);
            ProgressStep::Update(step)
        }
    }
}

/// Tracks how much of the archive has been written
struct ProgressCounter {
    total_bytes: u64,
    done_bytes: u64,
    total_entries: usize,
    done_entries: usize,
}

impl ProgressCounter {
    /// Byte-weighted progress, or entry-weighted when the archive holds no data
    fn fraction(&self) -> f32 {
        let raw = if self.total_bytes > 0 {
            self.done_bytes as f64 / self.total_bytes as f64
        } else if self.total_entries > 0 {
            self.done_entries as f64 / self.total_entries as f64
        } else {
            1.0
        };
        ((raw.min(1.0) as f32) * PROGRESS_STEPS).floor() / PROGRESS_STEPS
    }
}

/// Two-phase extractor for 7z files
///
/// Phase one opens the archive and lists every entry, which also yields the
/// CRC fingerprint passed to the [`ReleaseLookup`]. Phase two extracts the
/// listed entries flat into the destination, ignoring folder structure.
pub struct SevenZipExtractor {
    lookup: Arc<dyn ReleaseLookup>,
}

impl SevenZipExtractor {
    /// Create an extractor reporting fingerprints to `lookup`
    pub fn new(lookup: Arc<dyn ReleaseLookup>) -> Self {
        Self { lookup }
    }

    /// Open a 7z archive and list its entries
    pub fn list_entries(
        archive_path: &Path,
    ) -> Result<(SevenZReader<std::fs::File>, Vec<ArchiveEntry>), ExtractionError> {
        let reader = SevenZReader::open(archive_path, Password::empty()).map_err(|e| {
            ExtractionError::failed(archive_path, format!("failed to open 7z archive: {}", e))
        })?;

        let entries = reader
            .archive()
            .files
            .iter()
            .map(|file| ArchiveEntry {
                name: file.name.clone(),
                is_directory: file.is_directory,
                crc: file.has_crc.then_some(file.crc as u32),
            })
            .collect();

        Ok((reader, entries))
    }

    /// Destination of an entry when extracting without folder structure
    fn flat_destination(entry_name: &str, dest_path: &Path) -> Option<PathBuf> {
        Path::new(entry_name)
            .file_name()
            .map(|file_name| dest_path.join(file_name))
    }

    fn report_fingerprint(&self, archive_path: &Path, entries: &[ArchiveEntry]) {
        let crcs = crc_fingerprint(entries);
        if crcs.is_empty() {
            return;
        }
        if let Some(release_id) = self.lookup.lookup_identifier(&crcs) {
            info!(?archive_path, release_id, "found a release ID inside this 7z archive");
        }
    }

    /// Extract a 7z archive into `dest_path`
    pub fn extract(
        &self,
        archive_path: &Path,
        dest_path: &Path,
        emit: &mut dyn FnMut(BackendEvent),
    ) -> Result<(), ExtractionError> {
        debug!(?archive_path, ?dest_path, "starting 7z extraction");

        // Phase 1: list
        let (mut reader, entries) = Self::list_entries(archive_path)?;
        self.report_fingerprint(archive_path, &entries);

        let extracted_files: Vec<PathBuf> = entries
            .iter()
            .filter(|entry| entry.is_extractable_file())
            .filter_map(|entry| Self::flat_destination(&entry.name, dest_path))
            .collect();

        // Phase 2: extract
        create_dir_all(dest_path, archive_path)?;

        let mut counter = ProgressCounter {
            total_bytes: reader
                .archive()
                .files
                .iter()
                .filter(|file| !file.is_directory)
                .map(|file| file.size)
                .sum(),
            done_bytes: 0,
            total_entries: entries.len(),
            done_entries: 0,
        };
        let mut synthesizer = ProgressSynthesizer::new(entries.len());
        let mut report = |counter: &ProgressCounter| {
            if let ProgressStep::Update(progress) = synthesizer.observe(counter.fraction()) {
                emit(BackendEvent::Progress(progress));
            }
        };

        let mut failure: Option<ExtractionError> = None;
        let mut buffer = vec![0u8; COPY_BUFFER_SIZE];

        let result = reader.for_each_entries(|entry, data| {
            report(&counter);

            let target = if entry.is_directory || entry.name.is_empty() {
                None
            } else {
                Self::flat_destination(&entry.name, dest_path)
            };

            let written = match target {
                Some(target) => Self::write_entry(data, &target, &mut buffer, |n| {
                    counter.done_bytes += n as u64;
                    report(&counter);
                }),
                None => {
                    if !entry.is_directory {
                        warn!(name = %entry.name, "skipping 7z entry without a file name");
                    }
                    std::io::copy(data, &mut std::io::sink()).map(|_| ())
                }
            };

            match written {
                Ok(()) => {
                    counter.done_entries += 1;
                    Ok(true)
                }
                Err(e) => {
                    failure = Some(ExtractionError::failed(
                        archive_path,
                        format!("failed to extract {}: {}", entry.name, e),
                    ));
                    Ok(false)
                }
            }
        });

        if let Err(e) = result {
            return Err(ExtractionError::failed(
                archive_path,
                format!("failed to extract 7z archive: {}", e),
            ));
        }
        if let Some(e) = failure {
            return Err(e);
        }

        // completion signal; never reported as an update
        report(&counter);
        drop(reader);

        info!(
            ?archive_path,
            extracted_count = extracted_files.len(),
            "7z extraction successful"
        );
        emit(BackendEvent::Entries(extracted_files));

        Ok(())
    }

    /// Stream one entry to `target`, calling `on_chunk` with each chunk size
    fn write_entry(
        data: &mut dyn Read,
        target: &Path,
        buffer: &mut [u8],
        mut on_chunk: impl FnMut(usize),
    ) -> std::io::Result<()> {
        let mut outfile = std::fs::File::create(target)?;
        loop {
            let n = data.read(buffer)?;
            if n == 0 {
                break;
            }
            outfile.write_all(&buffer[..n])?;
            on_chunk(n);
        }
        outfile.flush()
    }
}
