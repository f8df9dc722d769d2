//! Folder watching with automatic archive extraction
//!
//! A [`DirectoryWatcher`] polls one directory and merges two kinds of output
//! into a single [`WatcherEvent`] sequence:
//! - new non-archive files are reported as [`WatcherEvent::FilesDetected`]
//! - new archives are watched until their size settles, then extracted, with
//!   every lifecycle event forwarded as [`WatcherEvent::Extraction`]
//!
//! Watching is non-recursive: only the immediate children of the directory are
//! considered.
//!
//! # Example
//!
//! ```no_run
//! use archive_watch::{DirectoryWatcher, WatchConfig, WatcherEvent};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let watcher = DirectoryWatcher::with_defaults(WatchConfig::for_path("/path/to/imports"))?;
//! let mut session = watcher.start()?;
//!
//! while let Some(event) = session.next_event().await {
//!     match event {
//!         WatcherEvent::FilesDetected { files } => println!("new files: {:?}", files),
//!         WatcherEvent::Extraction(event) => println!("extraction: {:?}", event),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use crate::config::WatchConfig;
use crate::error::{Error, Result};
use crate::extraction::{Extractor, NoOpReleaseLookup, ReleaseLookup};
use crate::scanner::DirectoryScanner;
use crate::stability::StabilityPoller;
use crate::ticker::{Scheduler, TokioScheduler};
use crate::types::WatcherEvent;
use futures::Stream;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// Watches one folder for new files and extracts archives dropped into it
#[derive(Clone, Debug)]
pub struct DirectoryWatcher {
    /// Validated watch configuration
    config: WatchConfig,

    /// Timer source for the directory scan and every per-archive size poll
    scheduler: Arc<dyn Scheduler>,

    /// Shared extraction orchestrator
    extractor: Extractor,
}

impl DirectoryWatcher {
    /// Create a new directory watcher
    ///
    /// # Arguments
    /// * `config` - Folder, interval and archive classification
    /// * `scheduler` - Timer source for all polling
    /// * `lookup` - Release lookup handed the CRC fingerprint of 7z archives
    ///
    /// # Errors
    /// Returns a configuration error if `config` does not validate
    pub fn new(
        config: WatchConfig,
        scheduler: Arc<dyn Scheduler>,
        lookup: Arc<dyn ReleaseLookup>,
    ) -> Result<Self> {
        config.validate()?;
        let extractor = Extractor::new(config.destination_dir(), lookup);

        Ok(Self {
            config,
            scheduler,
            extractor,
        })
    }

    /// Create a watcher on the tokio clock that never identifies releases
    pub fn with_defaults(config: WatchConfig) -> Result<Self> {
        Self::new(config, Arc::new(TokioScheduler), Arc::new(NoOpReleaseLookup))
    }

    /// Configuration this watcher was built with
    pub fn config(&self) -> &WatchConfig {
        &self.config
    }

    /// Start a watch session
    ///
    /// Creates the watched directory first when `create_if_missing` is set.
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// Returns error if the directory cannot be created
    pub fn start(&self) -> Result<WatchSession> {
        let path = &self.config.path;
        if !path.exists() {
            if self.config.create_if_missing {
                std::fs::create_dir_all(path).map_err(|e| {
                    Error::FolderWatch(format!("Failed to create watch folder: {}", e))
                })?;
                info!(?path, "created watch folder");
            } else {
                warn!(?path, "watch folder does not exist yet, polling anyway");
            }
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let tracker = TaskTracker::new();

        let scan = ScanLoop {
            watcher: self.clone(),
            tracker: tracker.clone(),
            cancel: cancel.clone(),
            tx,
            pending: HashMap::new(),
        };
        tracker.spawn(scan.run());

        info!(
            ?path,
            destination = ?self.config.destination_dir(),
            interval_ms = self.config.poll_interval.as_millis() as u64,
            "watching folder"
        );

        Ok(WatchSession {
            events: rx,
            cancel,
            tracker,
        })
    }
}

/// State owned by the directory scanning task of one session
struct ScanLoop {
    watcher: DirectoryWatcher,
    tracker: TaskTracker,
    cancel: CancellationToken,
    tx: mpsc::UnboundedSender<WatcherEvent>,

    /// Archives still waiting for their size to settle, keyed by path
    ///
    /// Each token is a child of the session token. The archive task cancels
    /// its own token once polling is over, so a cancelled entry is stale.
    pending: HashMap<PathBuf, CancellationToken>,
}

impl ScanLoop {
    async fn run(mut self) {
        let config = &self.watcher.config;
        let mut scanner = DirectoryScanner::new(
            &config.path,
            config.poll_interval,
            self.watcher.scheduler.as_ref(),
        );

        loop {
            let added = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                added = scanner.tick() => added,
            };
            let Some(added) = added else {
                debug!(dir = ?scanner.dir(), "scheduler stopped ticking");
                break;
            };

            self.forget_vanished(scanner.listing());
            if !added.is_empty() {
                self.dispatch(added);
            }
        }

        debug!(dir = ?scanner.dir(), "directory scan stopped");
    }

    /// Stop polling archives that are gone from the latest listing
    ///
    /// A file removed before it settled must not be extracted by its old
    /// poller if it is written again; the re-appearance gets a fresh one.
    fn forget_vanished(&mut self, listing: &HashSet<PathBuf>) {
        self.pending.retain(|archive, poll| {
            if poll.is_cancelled() {
                return false;
            }
            if listing.contains(archive) {
                return true;
            }
            debug!(?archive, "archive vanished before it settled");
            poll.cancel();
            false
        });
    }

    /// Report plain files and hand every archive to its own task
    fn dispatch(&mut self, batch: HashSet<PathBuf>) {
        let (archives, mut files): (Vec<_>, Vec<_>) = batch
            .into_iter()
            .partition(|path| self.watcher.config.is_archive(path));

        if !files.is_empty() {
            files.sort();
            debug!(count = files.len(), "new files detected");
            let _ = self.tx.send(WatcherEvent::FilesDetected { files });
        }

        for archive in archives {
            if let Some(previous) = self.pending.remove(&archive) {
                debug!(?archive, "archive reappeared, restarting its size poll");
                previous.cancel();
            }
            debug!(?archive, "new archive, waiting for it to finish writing");

            let poll = self.cancel.child_token();
            self.pending.insert(archive.clone(), poll.clone());
            self.tracker.spawn(process_archive(
                archive,
                self.watcher.config.poll_interval,
                self.watcher.scheduler.clone(),
                self.watcher.extractor.clone(),
                ArchiveCancel {
                    poll,
                    session: self.cancel.clone(),
                },
                self.tx.clone(),
            ));
        }
    }
}

/// Cancellation scopes of one archive task
struct ArchiveCancel {
    /// Ends the size poll only; a child of `session`
    poll: CancellationToken,
    /// Ends the whole session, extraction included
    session: CancellationToken,
}

/// Wait for one archive to become stable, then extract it
async fn process_archive(
    archive: PathBuf,
    period: Duration,
    scheduler: Arc<dyn Scheduler>,
    extractor: Extractor,
    cancel: ArchiveCancel,
    tx: mpsc::UnboundedSender<WatcherEvent>,
) {
    let poller = StabilityPoller::new(archive, period, scheduler.as_ref());

    let stable = tokio::select! {
        biased;
        _ = cancel.poll.cancelled() => None,
        stable = poller.wait_until_stable() => stable,
    };
    // polling is over either way; lets the scan loop drop this entry
    cancel.poll.cancel();

    let Some(archive) = stable else {
        return;
    };

    extractor
        .run(&archive, &cancel.session, |event| {
            let _ = tx.send(WatcherEvent::Extraction(event));
        })
        .await;
}

/// A running watch
///
/// Events for a single archive arrive in lifecycle order; events for
/// different archives and `FilesDetected` batches interleave as they are
/// produced. Dropping the session stops it without waiting.
#[derive(Debug)]
pub struct WatchSession {
    events: mpsc::UnboundedReceiver<WatcherEvent>,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl WatchSession {
    /// Receive the next event
    ///
    /// Returns `None` once the session has stopped and every buffered event
    /// has been received.
    pub async fn next_event(&mut self) -> Option<WatcherEvent> {
        self.events.recv().await
    }

    /// Whether the session is still watching
    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// Stop polling and wait for every session task to finish
    ///
    /// In-flight extractions stop forwarding events and keep their source
    /// archive. Their blocking backend calls finish in the background with
    /// the result discarded.
    pub async fn stop(&self) {
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        info!("folder watcher stopped");
    }
}

impl Stream for WatchSession {
    type Item = WatcherEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_recv(cx)
    }
}

impl Drop for WatchSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
