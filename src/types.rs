//! Core types and events

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::time::Instant;

use crate::utils::extension_of;

/// A single size sample taken by the stability poller
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileSnapshot {
    /// File that was sampled
    pub path: PathBuf,
    /// Size in bytes (0 when the file could not be read)
    pub size: u64,
    /// Tick at which the sample was taken
    pub observed_at: Instant,
}

/// Outcome of one stability poll
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StabilityResult {
    /// Size repeated on two consecutive non-zero samples
    Stable(PathBuf),
    /// Still changing, empty, or already reported
    Pending,
}

/// An entry listed from an archive
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Name as stored in the archive
    pub name: String,
    /// Whether the entry only describes a directory
    pub is_directory: bool,
    /// CRC32 of the entry contents, when the archive records one
    pub crc: Option<u32>,
}

impl ArchiveEntry {
    /// Whether this entry produces a file in the extracted output
    pub fn is_extractable_file(&self) -> bool {
        !self.is_directory && !self.name.is_empty()
    }
}

/// Archive type detected by file extension
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveType {
    /// 7-Zip archive (.7z), extracted in two phases (list, then extract)
    SevenZip,
    /// ZIP archive (.zip), extracted in a single streaming pass
    Zip,
}

impl ArchiveType {
    /// Map an extension (without dot, any case) to an archive type
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "zip" => Some(ArchiveType::Zip),
            "7z" => Some(ArchiveType::SevenZip),
            _ => None,
        }
    }

    /// Detect the archive type of a path from its extension
    pub fn from_path(path: &Path) -> Option<Self> {
        extension_of(path).and_then(|ext| Self::from_extension(&ext))
    }
}

/// Lifecycle event for a single archive
///
/// Every archive that passes the entry guard produces exactly one `Started`,
/// any number of `Updated` with non-decreasing progress, then exactly one
/// terminal event (`Completed` or `Failed`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExtractionEvent {
    /// Extraction began
    Started {
        /// Archive path
        path: PathBuf,
    },

    /// Extraction progress
    Updated {
        /// Archive path
        path: PathBuf,
        /// Progress fraction in [0.0, 1.0]
        progress: f32,
    },

    /// Extraction finished
    Completed {
        /// Archive path
        path: PathBuf,
        /// Extracted files, in archive order
        files: Vec<PathBuf>,
    },

    /// Extraction failed
    Failed {
        /// Archive path
        path: PathBuf,
        /// Error message
        reason: String,
    },
}

impl ExtractionEvent {
    /// Archive this event belongs to
    pub fn path(&self) -> &Path {
        match self {
            ExtractionEvent::Started { path }
            | ExtractionEvent::Updated { path, .. }
            | ExtractionEvent::Completed { path, .. }
            | ExtractionEvent::Failed { path, .. } => path,
        }
    }

    /// Whether this is the last event for its archive
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExtractionEvent::Completed { .. } | ExtractionEvent::Failed { .. }
        )
    }
}

/// Event emitted by a watch session
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WatcherEvent {
    /// Non-archive files appeared in the watched directory
    FilesDetected {
        /// New files (no particular order)
        files: Vec<PathBuf>,
    },

    /// Lifecycle event of an archive extraction
    Extraction(ExtractionEvent),
}

impl From<ExtractionEvent> for WatcherEvent {
    fn from(event: ExtractionEvent) -> Self {
        WatcherEvent::Extraction(event)
    }
}
