//! Per-folder progress reporting.
//!
//! The coordinator calls [`ProgressSink::folder_completed`] once per root
//! folder, strictly in processing order. It makes no assumption about the
//! host's threading model; implementations must return quickly.

use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderProgress {
    pub profile_id: String,
    pub completed: usize,
    pub total: usize,
    pub folder: String,
    /// Running count of audio files found so far in this run.
    pub synced_songs: usize,
    pub failed: bool,
}

pub trait ProgressSink: Send + Sync {
    fn folder_completed(&self, progress: &FolderProgress);
}

/// Publishes progress as [`SyncEvent::FolderCompleted`].
#[derive(Debug, Clone)]
pub struct EventBusProgressSink {
    event_bus: EventBus,
}

impl EventBusProgressSink {
    pub fn new(event_bus: EventBus) -> Self {
        Self { event_bus }
    }
}

impl ProgressSink for EventBusProgressSink {
    fn folder_completed(&self, progress: &FolderProgress) {
        self.event_bus
            .emit(CoreEvent::Sync(SyncEvent::FolderCompleted {
                profile_id: progress.profile_id.clone(),
                completed: progress.completed,
                total: progress.total,
                folder: progress.folder.clone(),
                synced_songs: progress.synced_songs,
                failed: progress.failed,
            }))
            .ok();
    }
}

/// Discards progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgressSink;

impl ProgressSink for NoopProgressSink {
    fn folder_completed(&self, _progress: &FolderProgress) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_bus_sink_publishes_folder_completed() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        let sink = EventBusProgressSink::new(bus);

        sink.folder_completed(&FolderProgress {
            profile_id: "p1".to_string(),
            completed: 1,
            total: 2,
            folder: "/Podcasts".to_string(),
            synced_songs: 0,
            failed: true,
        });

        match rx.recv().await.unwrap() {
            CoreEvent::Sync(SyncEvent::FolderCompleted {
                completed,
                total,
                folder,
                failed,
                ..
            }) => {
                assert_eq!((completed, total), (1, 2));
                assert_eq!(folder, "/Podcasts");
                assert!(failed);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_sink_without_subscribers_does_not_fail() {
        let sink = EventBusProgressSink::new(EventBus::new(1));
        sink.folder_completed(&FolderProgress {
            profile_id: "p1".to_string(),
            completed: 1,
            total: 1,
            folder: "/Music".to_string(),
            synced_songs: 3,
            failed: false,
        });
    }
}
