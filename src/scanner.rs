//! Polling directory scanner
//!
//! Lists the immediate children of a directory on every tick and reports the
//! paths that were not present on the previous tick. A path that disappears
//! and comes back is reported again.

use crate::ticker::{Scheduler, Ticks};
use crate::utils::{is_hidden, is_macos_metadata};
use futures::{Stream, StreamExt};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Diffs consecutive directory listings
#[derive(Debug, Default)]
pub struct SeenSet {
    previous: HashSet<PathBuf>,
}

impl SeenSet {
    /// Create an empty seen-set
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a listing and return the paths new since the previous one
    ///
    /// Returns `None` instead of an empty batch.
    pub fn diff(&mut self, current: HashSet<PathBuf>) -> Option<HashSet<PathBuf>> {
        let added: HashSet<PathBuf> = current.difference(&self.previous).cloned().collect();
        self.previous = current;

        if added.is_empty() { None } else { Some(added) }
    }

    /// Paths seen on the most recent listing
    pub fn current(&self) -> &HashSet<PathBuf> {
        &self.previous
    }
}

/// List the immediate children of a directory
///
/// Hidden entries and anything under a macOS metadata folder are skipped.
pub async fn list_children(dir: &Path) -> std::io::Result<HashSet<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut children = HashSet::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if is_hidden(&path) || is_macos_metadata(&path) {
            continue;
        }
        children.insert(path);
    }

    Ok(children)
}

/// Reports batches of newly appeared paths in one directory
pub struct DirectoryScanner {
    dir: PathBuf,
    ticks: Ticks,
    seen: SeenSet,
}

impl std::fmt::Debug for DirectoryScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryScanner")
            .field("dir", &self.dir)
            .field("seen", &self.seen.current().len())
            .finish_non_exhaustive()
    }
}

impl DirectoryScanner {
    /// Create a scanner listing `dir` every `period`
    pub fn new(dir: impl Into<PathBuf>, period: Duration, scheduler: &dyn Scheduler) -> Self {
        Self {
            dir: dir.into(),
            ticks: scheduler.interval(period),
            seen: SeenSet::new(),
        }
    }

    /// Directory being scanned
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// List the directory once and diff it against the previous listing
    ///
    /// A listing failure is treated as "nothing new" and leaves the previous
    /// listing in place, so a transient error does not make every file look
    /// new on the next successful tick.
    pub async fn scan(&mut self) -> Option<HashSet<PathBuf>> {
        match list_children(&self.dir).await {
            Ok(children) => {
                let added = self.seen.diff(children)?;
                debug!(dir = ?self.dir, count = added.len(), "new entries in watched folder");
                Some(added)
            }
            Err(e) => {
                debug!(dir = ?self.dir, error = %e, "failed to list watched folder, retrying next tick");
                None
            }
        }
    }

    /// Paths present on the most recent successful listing
    pub fn listing(&self) -> &HashSet<PathBuf> {
        self.seen.current()
    }

    /// Wait for the next tick and scan once
    ///
    /// The batch is empty when nothing new appeared. Returns `None` once the
    /// scheduler stops ticking.
    pub async fn tick(&mut self) -> Option<HashSet<PathBuf>> {
        self.ticks.next().await?;
        Some(self.scan().await.unwrap_or_default())
    }

    /// Wait for the next tick that produces a non-empty batch
    ///
    /// Returns `None` once the scheduler stops ticking.
    pub async fn next_batch(&mut self) -> Option<HashSet<PathBuf>> {
        loop {
            let added = self.tick().await?;
            if !added.is_empty() {
                return Some(added);
            }
        }
    }

    /// Stream of non-empty batches
    pub fn into_stream(self) -> impl Stream<Item = HashSet<PathBuf>> + Send {
        futures::stream::unfold(self, |mut scanner| async move {
            let batch = scanner.next_batch().await?;
            Some((batch, scanner))
        })
    }
}
