//! # Event Bus System
//!
//! Broadcasts sync lifecycle and cache change notifications using
//! `tokio::sync::broadcast`, so hosts can observe a run without depending on
//! the engine's threading model.
//!
//! ## Overview
//!
//! - **Event Types**: [`SyncEvent`] (run lifecycle, per-folder progress) and
//!   [`CacheEvent`] (rows written or removed), wrapped in [`CoreEvent`]
//! - **EventBus**: central broadcast channel
//! - **EventStream**: receiver wrapper with optional filtering
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, EventStream, SyncEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(100);
//! let mut progress = EventStream::new(bus.subscribe())
//!     .filter(|event| matches!(event, CoreEvent::Sync(SyncEvent::FolderCompleted { .. })));
//!
//! bus.emit(CoreEvent::Sync(SyncEvent::FolderCompleted {
//!     profile_id: "nas".to_string(),
//!     completed: 1,
//!     total: 2,
//!     folder: "/Music".to_string(),
//!     synced_songs: 42,
//!     failed: false,
//! }))
//! .ok();
//!
//! let event = progress.recv().await.unwrap();
//! assert_eq!(event.description(), "Folder scan finished");
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber missed `n` events; it can keep receiving.
//! - **`RecvError::Closed`**: every sender was dropped; treat as shutdown.
//!
//! Emitting with no subscribers returns `Err`, which publishers ignore with `.ok()`.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event published through the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Sync run lifecycle
    Sync(SyncEvent),
    /// Song cache mutations
    Cache(CacheEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Sync(e) => e.description(),
            CoreEvent::Cache(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Sync(SyncEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Sync(SyncEvent::PartialFailure { .. }) => EventSeverity::Warning,
            CoreEvent::Sync(SyncEvent::FolderCompleted { failed: true, .. }) => {
                EventSeverity::Warning
            }
            CoreEvent::Sync(SyncEvent::Completed { .. }) => EventSeverity::Info,
            CoreEvent::Cache(CacheEvent::Cleared { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }

    pub fn profile_id(&self) -> &str {
        match self {
            CoreEvent::Sync(e) => e.profile_id(),
            CoreEvent::Cache(e) => e.profile_id(),
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Sync Events
// ============================================================================

/// Lifecycle of one sync run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SyncEvent {
    /// Run accepted and about to scan.
    Started {
        job_id: String,
        profile_id: String,
        /// Folders planned for this run, in processing order.
        folders: Vec<String>,
        /// Only previously failed folders are scanned.
        retry_failed_only: bool,
    },
    /// One root folder finished scanning. Emitted in folder order.
    FolderCompleted {
        profile_id: String,
        completed: usize,
        total: usize,
        folder: String,
        /// Running count of songs discovered so far in this run.
        synced_songs: usize,
        failed: bool,
    },
    /// Every planned folder scanned and persisted.
    Completed {
        job_id: String,
        profile_id: String,
        upserted: usize,
        deleted_by_selection: usize,
        deleted_by_absence: usize,
        duration_ms: u64,
    },
    /// Persisted, but some folders failed and were left untouched.
    PartialFailure {
        job_id: String,
        profile_id: String,
        upserted: usize,
        failed_folders: Vec<String>,
    },
    /// No folder could be scanned; nothing under the scanned roots changed.
    Failed {
        job_id: String,
        profile_id: String,
        message: String,
        /// Whether retrying later may succeed.
        recoverable: bool,
    },
    /// Stopped at a folder boundary on request.
    Cancelled {
        job_id: String,
        profile_id: String,
        folders_completed: usize,
    },
}

impl SyncEvent {
    fn description(&self) -> &str {
        match self {
            SyncEvent::Started { .. } => "Sync started",
            SyncEvent::FolderCompleted { .. } => "Folder scan finished",
            SyncEvent::Completed { .. } => "Sync completed successfully",
            SyncEvent::PartialFailure { .. } => "Sync completed with failed folders",
            SyncEvent::Failed { .. } => "Sync failed",
            SyncEvent::Cancelled { .. } => "Sync cancelled",
        }
    }

    fn profile_id(&self) -> &str {
        match self {
            SyncEvent::Started { profile_id, .. }
            | SyncEvent::FolderCompleted { profile_id, .. }
            | SyncEvent::Completed { profile_id, .. }
            | SyncEvent::PartialFailure { profile_id, .. }
            | SyncEvent::Failed { profile_id, .. }
            | SyncEvent::Cancelled { profile_id, .. } => profile_id,
        }
    }
}

// ============================================================================
// Cache Events
// ============================================================================

/// Why cached songs were removed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RemovalReason {
    /// The containing root folder is no longer selected.
    Deselected,
    /// The file is gone from a folder that scanned successfully.
    RemoteAbsent,
}

/// Changes to the persisted song cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum CacheEvent {
    SongsUpserted { profile_id: String, count: usize },
    SongsRemoved {
        profile_id: String,
        count: usize,
        reason: RemovalReason,
    },
    /// Every cached song for the profile was dropped.
    Cleared { profile_id: String },
}

impl CacheEvent {
    fn description(&self) -> &str {
        match self {
            CacheEvent::SongsUpserted { .. } => "Cached songs written",
            CacheEvent::SongsRemoved { .. } => "Cached songs removed",
            CacheEvent::Cleared { .. } => "Song cache cleared",
        }
    }

    fn profile_id(&self) -> &str {
        match self {
            CacheEvent::SongsUpserted { profile_id, .. }
            | CacheEvent::SongsRemoved { profile_id, .. }
            | CacheEvent::Cleared { profile_id } => profile_id,
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Cloning shares the same channel. Slow subscribers receive
/// `RecvError::Lagged` instead of blocking publishers.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus buffering `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with an optional filter.
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by `recv()`/`try_recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Returns `None` if no matching event is currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn folder_event(folder: &str, failed: bool) -> CoreEvent {
        CoreEvent::Sync(SyncEvent::FolderCompleted {
            profile_id: "nas".to_string(),
            completed: 1,
            total: 2,
            folder: folder.to_string(),
            synced_songs: 3,
            failed,
        })
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::default();
        assert_eq!(bus.subscriber_count(), 0);
        assert!(bus.emit(folder_event("/Music", false)).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        let event = folder_event("/Music", false);
        assert_eq!(bus.emit(event.clone()).unwrap(), 2);

        assert_eq!(first.recv().await.unwrap(), event);
        assert_eq!(second.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_event_stream_with_filter() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe())
            .filter(|event| matches!(event, CoreEvent::Cache(_)));

        bus.emit(folder_event("/Music", false)).unwrap();
        let cleared = CoreEvent::Cache(CacheEvent::Cleared {
            profile_id: "nas".to_string(),
        });
        bus.emit(cleared.clone()).unwrap();

        assert_eq!(stream.recv().await.unwrap(), cleared);
    }

    #[tokio::test]
    async fn test_try_recv_skips_filtered_events() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe())
            .filter(|event| event.severity() >= EventSeverity::Warning);

        assert!(stream.try_recv().is_none());

        bus.emit(folder_event("/Music", false)).unwrap();
        bus.emit(folder_event("/Podcasts", true)).unwrap();

        match stream.try_recv() {
            Some(Ok(CoreEvent::Sync(SyncEvent::FolderCompleted { folder, .. }))) => {
                assert_eq!(folder, "/Podcasts")
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert!(stream.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();

        for i in 0..5 {
            bus.emit(folder_event(&format!("/Folder{}", i), false)).ok();
        }

        assert!(matches!(sub.recv().await, Err(RecvError::Lagged(_))));
    }

    #[test]
    fn test_event_severity() {
        let failed = CoreEvent::Sync(SyncEvent::Failed {
            job_id: "job".to_string(),
            profile_id: "nas".to_string(),
            message: "unable to scan selected folders".to_string(),
            recoverable: true,
        });
        assert_eq!(failed.severity(), EventSeverity::Error);
        assert_eq!(folder_event("/a", true).severity(), EventSeverity::Warning);
        assert_eq!(folder_event("/a", false).severity(), EventSeverity::Debug);
        assert_eq!(failed.profile_id(), "nas");
    }

    #[test]
    fn test_event_serialization() {
        let event = CoreEvent::Cache(CacheEvent::SongsRemoved {
            profile_id: "nas".to_string(),
            count: 4,
            reason: RemovalReason::RemoteAbsent,
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Cache");
        assert_eq!(json["payload"]["event"], "SongsRemoved");
        assert_eq!(json["payload"]["reason"], "RemoteAbsent");

        let back: CoreEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
