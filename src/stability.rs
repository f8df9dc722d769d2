//! Size-based stability polling
//!
//! There is no portable "file fully written" signal, so a file counts as
//! complete once two consecutive size samples are equal and non-zero. A read
//! failure counts as size 0: a file that is locked or briefly missing while a
//! download is still writing it must not be reported as stable, and must not
//! abort the poll either.

use crate::ticker::{Scheduler, Ticks};
use crate::types::{FileSnapshot, StabilityResult};
use futures::{Stream, StreamExt};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, trace};

/// Compares consecutive size samples of one file
///
/// Reports [`StabilityResult::Stable`] at most once; every observation after
/// that is [`StabilityResult::Pending`].
#[derive(Debug, Default)]
pub struct SizeTracker {
    previous: Option<u64>,
    reported: bool,
}

impl SizeTracker {
    /// Create a tracker with no samples yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next sample
    pub fn observe(&mut self, snapshot: &FileSnapshot) -> StabilityResult {
        if self.reported {
            return StabilityResult::Pending;
        }

        let previous = self.previous.replace(snapshot.size);
        if previous == Some(snapshot.size) && snapshot.size > 0 {
            self.reported = true;
            StabilityResult::Stable(snapshot.path.clone())
        } else {
            StabilityResult::Pending
        }
    }
}

/// Current size of a regular file, or 0 if it cannot be read
pub async fn sample_size(path: &Path) -> u64 {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => meta.len(),
        _ => 0,
    }
}

/// Polls one file until its size settles
///
/// Consumed by [`wait_until_stable`](Self::wait_until_stable) or
/// [`into_stream`](Self::into_stream); a poller cannot be restarted.
pub struct StabilityPoller {
    path: PathBuf,
    ticks: Ticks,
    tracker: SizeTracker,
}

impl std::fmt::Debug for StabilityPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StabilityPoller")
            .field("path", &self.path)
            .field("tracker", &self.tracker)
            .finish_non_exhaustive()
    }
}

impl StabilityPoller {
    /// Create a poller sampling `path` every `period`
    pub fn new(path: impl Into<PathBuf>, period: Duration, scheduler: &dyn Scheduler) -> Self {
        Self {
            path: path.into(),
            ticks: scheduler.interval(period),
            tracker: SizeTracker::new(),
        }
    }

    /// Path being polled
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wait for the next tick and take one sample
    ///
    /// Returns `None` once the scheduler stops ticking.
    pub async fn tick(&mut self) -> Option<StabilityResult> {
        let observed_at = self.ticks.next().await?;
        let snapshot = FileSnapshot {
            size: sample_size(&self.path).await,
            path: self.path.clone(),
            observed_at,
        };
        trace!(path = ?snapshot.path, size = snapshot.size, "size sample");
        Some(self.tracker.observe(&snapshot))
    }

    /// Poll until the file is stable
    ///
    /// Returns `None` only if the scheduler runs out of ticks first. With a
    /// periodic scheduler a file that never settles keeps this pending.
    pub async fn wait_until_stable(mut self) -> Option<PathBuf> {
        debug!(path = ?self.path, "watching file size");
        while let Some(result) = self.tick().await {
            if let StabilityResult::Stable(path) = result {
                debug!(?path, "file size is stable");
                return Some(path);
            }
        }
        None
    }

    /// Stream yielding the path once, when it becomes stable
    pub fn into_stream(self) -> impl Stream<Item = PathBuf> + Send {
        futures::stream::once(self.wait_until_stable()).filter_map(futures::future::ready)
    }
}
