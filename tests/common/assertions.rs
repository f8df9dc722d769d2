//! Event collection helpers for pipeline tests

use archive_watch::{ExtractionEvent, WatchSession, WatcherEvent};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Read events until `terminals` extraction terminal events have been seen
///
/// Panics if the session ends or `timeout` elapses first.
pub async fn collect_until_terminals(
    session: &mut WatchSession,
    terminals: usize,
    timeout: Duration,
) -> Vec<WatcherEvent> {
    let mut events = Vec::new();
    let mut seen = 0;

    let result = tokio::time::timeout(timeout, async {
        while seen < terminals {
            match session.next_event().await {
                Some(event) => {
                    if matches!(&event, WatcherEvent::Extraction(e) if e.is_terminal()) {
                        seen += 1;
                    }
                    events.push(event);
                }
                None => panic!("session ended early, events so far: {events:?}"),
            }
        }
    })
    .await;

    if result.is_err() {
        panic!("timed out waiting for {terminals} terminal events, got: {events:?}");
    }
    events
}

/// Read whatever the session produces within `window`
pub async fn collect_for(session: &mut WatchSession, window: Duration) -> Vec<WatcherEvent> {
    let mut events = Vec::new();
    let _ = tokio::time::timeout(window, async {
        while let Some(event) = session.next_event().await {
            events.push(event);
        }
    })
    .await;
    events
}

/// Extraction events concerning `path`, in arrival order
pub fn extraction_events_for(events: &[WatcherEvent], path: &Path) -> Vec<ExtractionEvent> {
    events
        .iter()
        .filter_map(|event| match event {
            WatcherEvent::Extraction(e) if e.path() == path => Some(e.clone()),
            _ => None,
        })
        .collect()
}

/// Every path reported through `FilesDetected`
pub fn detected_files(events: &[WatcherEvent]) -> Vec<PathBuf> {
    events
        .iter()
        .filter_map(|event| match event {
            WatcherEvent::FilesDetected { files } => Some(files.clone()),
            _ => None,
        })
        .flatten()
        .collect()
}

/// Check the per-archive lifecycle: `Started`, then updates with
/// non-decreasing progress, then exactly one terminal event
pub fn assert_lifecycle(events: &[ExtractionEvent]) {
    assert!(
        matches!(events.first(), Some(ExtractionEvent::Started { .. })),
        "lifecycle must open with Started: {events:?}"
    );
    assert!(
        events.last().is_some_and(|e| e.is_terminal()),
        "lifecycle must end with a terminal event: {events:?}"
    );
    assert_eq!(
        events.iter().filter(|e| e.is_terminal()).count(),
        1,
        "exactly one terminal event: {events:?}"
    );

    let progress: Vec<f32> = events
        .iter()
        .filter_map(|e| match e {
            ExtractionEvent::Updated { progress, .. } => Some(*progress),
            _ => None,
        })
        .collect();
    assert!(
        progress.windows(2).all(|w| w[0] <= w[1]),
        "progress must be non-decreasing: {progress:?}"
    );
}

/// Wait until `path` no longer exists
pub async fn wait_for_absence(path: &Path, timeout: Duration) {
    let deadline = tokio::time::Instant::now() + timeout;
    while path.exists() {
        if tokio::time::Instant::now() >= deadline {
            panic!("{} still exists after {timeout:?}", path.display());
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
