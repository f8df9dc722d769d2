//! Archive fixtures and watcher setup

use archive_watch::{DirectoryWatcher, WatchConfig, WatchSession};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Poll interval used by most pipeline tests
pub const FAST_POLL: Duration = Duration::from_millis(50);

/// Build a ZIP archive in memory
///
/// Entries are stored uncompressed in the given order. An empty name produces
/// an entry that extraction skips.
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options =
        zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Stored);
    for (name, content) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Write a ZIP archive to `path` in one go
pub fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
    std::fs::write(path, zip_bytes(entries)).unwrap();
}

/// Compress `files` into a 7z archive at `path`
///
/// The source tree is staged in a scratch directory next to nothing the
/// watcher can see.
pub fn write_7z(path: &Path, files: &[(&str, &[u8])]) {
    let staging = tempfile::TempDir::new().unwrap();
    for (name, content) in files {
        let file_path = staging.path().join(name);
        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(file_path, content).unwrap();
    }

    // compress next to the staging tree, then move into place atomically
    let scratch = staging.path().with_extension("7z");
    sevenz_rust::compress_to_path(staging.path(), &scratch).unwrap();
    std::fs::rename(&scratch, path)
        .or_else(|_| std::fs::copy(&scratch, path).map(|_| ()))
        .unwrap();
    let _ = std::fs::remove_file(&scratch);
}

/// Write bytes that no archive backend can read
pub fn write_corrupt(path: &Path) {
    std::fs::write(path, b"this is definitely not an archive").unwrap();
}

/// Watch `dir` with a short poll interval, extracting into `destination`
pub fn start_watch(dir: &Path, destination: Option<PathBuf>, interval: Duration) -> WatchSession {
    let config = WatchConfig {
        path: dir.to_path_buf(),
        destination,
        poll_interval: interval,
        ..Default::default()
    };
    DirectoryWatcher::with_defaults(config)
        .unwrap()
        .start()
        .unwrap()
}

/// Sorted file names directly inside `dir`
pub fn list_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
