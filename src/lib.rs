//! # archive-watch
//!
//! Watches a folder for new files and extracts archives dropped into it.
//!
//! ## Design Philosophy
//!
//! archive-watch is designed to be:
//! - **Poll-based** - Works the same on every filesystem, including network shares
//! - **Patient** - An archive is only touched once its size stops changing
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers read one merged event sequence
//!
//! ## Quick Start
//!
//! ```no_run
//! use archive_watch::{DirectoryWatcher, WatchConfig};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = WatchConfig {
//!         path: "/srv/roms/imports".into(),
//!         destination: Some("/srv/roms/library".into()),
//!         poll_interval: Duration::from_secs(2),
//!         ..Default::default()
//!     };
//!
//!     let mut session = DirectoryWatcher::with_defaults(config)?.start()?;
//!
//!     // Consume events until the session stops
//!     let consumer = tokio::spawn(async move {
//!         while let Some(event) = session.next_event().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     consumer.await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Archive extraction
pub mod extraction;
/// Folder watching with automatic archive extraction
pub mod folder_watcher;
/// New-file detection by periodic directory listing
pub mod scanner;
/// File size stability detection
pub mod stability;
/// Periodic timer abstraction
pub mod ticker;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::WatchConfig;
pub use error::{Error, ExtractionError, Result};
pub use extraction::{Extractor, NoOpReleaseLookup, ReleaseLookup};
pub use folder_watcher::{DirectoryWatcher, WatchSession};
pub use ticker::{Scheduler, TokioScheduler};
pub use types::{ArchiveEntry, ArchiveType, ExtractionEvent, WatcherEvent};

/// Helper function to run a watch session until the process is asked to stop.
///
/// Waits for a termination signal and then calls the session's `stop()` method.
/// Events already produced stay readable from the session afterwards.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use archive_watch::{DirectoryWatcher, WatchConfig, run_until_signal};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let watcher = DirectoryWatcher::with_defaults(WatchConfig::default())?;
///     let session = watcher.start()?;
///
///     // Run with automatic signal handling
///     run_until_signal(&session).await;
///
///     Ok(())
/// }
/// ```
pub async fn run_until_signal(session: &WatchSession) {
    wait_for_signal().await;
    session.stop().await;
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // registration can fail in restricted environments (containers, tests)
    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => tokio::select! {
            _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
            _ = sigint.recv() => tracing::info!("Received SIGINT signal (Ctrl+C)"),
        },
        (Ok(mut remaining), Err(e)) | (Err(e), Ok(mut remaining)) => {
            tracing::warn!(error = %e, "Could not register every signal handler, waiting on the other one");
            remaining.recv().await;
            tracing::info!("Received termination signal");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "Could not register any signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
