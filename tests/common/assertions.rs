//! Custom test assertions for integration tests

use std::path::Path;
use std::time::Duration;

use hls_dl::{DownloadId, Event};
use tokio::sync::broadcast;

/// Collect every event for `id` until its terminal event (or the timeout)
pub async fn collect_until_terminal(
    events: &mut broadcast::Receiver<Event>,
    id: DownloadId,
    timeout: Duration,
) -> Vec<Event> {
    let mut seen = Vec::new();
    let _ = tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Ok(event) if event_id(&event) == id => {
                    let terminal = matches!(
                        event,
                        Event::Completed { .. } | Event::Failed { .. } | Event::Cancelled { .. }
                    );
                    seen.push(event);
                    if terminal {
                        return;
                    }
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }
    })
    .await;
    seen
}

/// ID carried by any event
pub fn event_id(event: &Event) -> DownloadId {
    match event {
        Event::PlaylistResolved { id, .. }
        | Event::VariantSelected { id, .. }
        | Event::Started { id, .. }
        | Event::Progress { id, .. }
        | Event::Paused { id }
        | Event::Resumed { id }
        | Event::Completed { id, .. }
        | Event::Failed { id, .. }
        | Event::Cancelled { id } => *id,
    }
}

/// Assert that progress percentages never decrease and finish at 100
pub fn assert_progress_monotonic(events: &[Event]) {
    let percents: Vec<f32> = events
        .iter()
        .filter_map(|e| match e {
            Event::Progress { percent, .. } => Some(*percent),
            _ => None,
        })
        .collect();
    assert!(!percents.is_empty(), "no progress events were emitted");
    for pair in percents.windows(2) {
        assert!(
            pair[1] >= pair[0],
            "progress went backwards: {} -> {}",
            pair[0],
            pair[1]
        );
    }
    assert_eq!(percents.last().copied(), Some(100.0));
}

/// Assert no file (final or `.part`) was left in `dir`
pub fn assert_dir_empty(dir: &Path) {
    if !dir.exists() {
        return;
    }
    let leftovers: Vec<_> = std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .collect();
    assert!(leftovers.is_empty(), "unexpected files left behind: {leftovers:?}");
}
