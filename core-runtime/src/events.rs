//! # Event Bus System
//!
//! Broadcasts sync progress through `tokio::sync::broadcast` so hosts can
//! observe a run without coupling to the engine.
//!
//! ## Overview
//!
//! - **SyncEvent**: run lifecycle, phase changes and the computed plan
//! - **EventBus**: central broadcast channel for publishing events
//! - **EventStream**: wrapper for consuming events with filtering
//!
//! ```text
//! ┌─────────────────┐    emit    ┌──────────┐   subscribe   ┌────────────┐
//! │ SyncCoordinator ├───────────>│ EventBus ├──────────────>│ Subscriber │
//! └─────────────────┘            └──────────┘               └────────────┘
//! ```
//!
//! Emission never fails a run: with no subscribers the event is dropped.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{EventBus, SyncEvent};
//!
//! # core_async::runtime::block_on(async {
//! let bus = EventBus::new(16);
//! let mut subscriber = bus.subscribe();
//!
//! bus.emit(SyncEvent::PhaseChanged {
//!     run_id: "run-1".to_string(),
//!     phase: "add_users".to_string(),
//! })
//! .ok();
//!
//! let event = subscriber.recv().await.unwrap();
//! assert_eq!(event.run_id(), "run-1");
//! # });
//! ```

use core_async::sync::broadcast;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use core_async::sync::broadcast::error::{RecvError, SendError};
pub use core_async::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Subscribers that can't keep up will receive `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

/// Events emitted over the life of one sync run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SyncEvent {
    /// Run initiated.
    Started {
        run_id: String,
        /// `groups` or `users_groups`.
        method: String,
        dry_run: bool,
    },
    /// Run entered a new phase.
    PhaseChanged { run_id: String, phase: String },
    /// The full-reconciliation plan is known.
    PlanComputed {
        run_id: String,
        users_to_add: u64,
        users_to_update: u64,
        users_to_delete: u64,
        groups_to_add: u64,
        groups_to_delete: u64,
        members_to_add: u64,
        members_to_remove: u64,
    },
    /// Run finished without error.
    Completed {
        run_id: String,
        users_added: u64,
        users_updated: u64,
        users_deleted: u64,
        groups_added: u64,
        groups_deleted: u64,
        members_added: u64,
        members_removed: u64,
        duration_secs: u64,
    },
    /// Run stopped on an error or cancellation.
    Failed {
        run_id: String,
        phase: String,
        message: String,
        cancelled: bool,
    },
}

impl SyncEvent {
    /// Run this event belongs to.
    pub fn run_id(&self) -> &str {
        match self {
            SyncEvent::Started { run_id, .. }
            | SyncEvent::PhaseChanged { run_id, .. }
            | SyncEvent::PlanComputed { run_id, .. }
            | SyncEvent::Completed { run_id, .. }
            | SyncEvent::Failed { run_id, .. } => run_id,
        }
    }

    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            SyncEvent::Started { .. } => "Sync started",
            SyncEvent::PhaseChanged { .. } => "Sync phase changed",
            SyncEvent::PlanComputed { .. } => "Sync plan computed",
            SyncEvent::Completed { .. } => "Sync completed successfully",
            SyncEvent::Failed { cancelled: true, .. } => "Sync cancelled",
            SyncEvent::Failed { .. } => "Sync failed",
        }
    }

    pub fn severity(&self) -> EventSeverity {
        match self {
            SyncEvent::Failed {
                cancelled: false, ..
            } => EventSeverity::Error,
            SyncEvent::Failed { cancelled: true, .. } => EventSeverity::Warning,
            SyncEvent::Started { .. }
            | SyncEvent::PlanComputed { .. }
            | SyncEvent::Completed { .. } => EventSeverity::Info,
            SyncEvent::PhaseChanged { .. } => EventSeverity::Debug,
        }
    }
}

/// Central event bus for publishing and subscribing to events.
///
/// Cloning the bus shares the underlying channel; each `subscribe()` creates
/// an independent receiver that sees every event emitted after it subscribed.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SyncEvent>,
}

impl EventBus {
    /// Creates a new event bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are no active subscribers.
    pub fn emit(&self, event: SyncEvent) -> Result<usize, SendError<SyncEvent>> {
        self.sender.send(event)
    }

    pub fn subscribe(&self) -> Receiver<SyncEvent> {
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

type EventFilter = Box<dyn Fn(&SyncEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with optional filtering.
///
/// ```rust
/// use core_runtime::events::{EventBus, EventSeverity, EventStream};
///
/// let bus = EventBus::default();
/// let errors = EventStream::new(bus.subscribe())
///     .filter(|event| event.severity() >= EventSeverity::Warning);
/// ```
pub struct EventStream {
    receiver: Receiver<SyncEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<SyncEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&SyncEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn matches(&self, event: &SyncEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<SyncEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.matches(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no matching events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<SyncEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.matches(&event) {
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

    fn phase(run_id: &str, phase: &str) -> SyncEvent {
        SyncEvent::PhaseChanged {
            run_id: run_id.to_string(),
            phase: phase.to_string(),
        }
    }

    #[core_async::test]
    async fn test_event_bus_subscription() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
        let _sub1 = bus.subscribe();
        let _sub2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[core_async::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus.emit(phase("run-1", "plan")).is_err());
    }

    #[core_async::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        let event = SyncEvent::Started {
            run_id: "run-1".to_string(),
            method: "groups".to_string(),
            dry_run: false,
        };

        assert_eq!(bus.emit(event.clone()).unwrap(), 2);
        assert_eq!(sub1.recv().await.unwrap(), event);
        assert_eq!(sub2.recv().await.unwrap(), event);
    }

    #[core_async::test]
    async fn test_event_stream_with_filter() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe())
            .filter(|event| matches!(event, SyncEvent::Failed { .. }));

        bus.emit(phase("run-1", "add_users")).ok();
        let failed = SyncEvent::Failed {
            run_id: "run-1".to_string(),
            phase: "add_users".to_string(),
            message: "transport failure".to_string(),
            cancelled: false,
        };
        bus.emit(failed.clone()).ok();

        assert_eq!(stream.recv().await.unwrap(), failed);
    }

    #[core_async::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();

        for i in 0..5 {
            bus.emit(phase(&format!("run-{}", i), "plan")).ok();
        }

        assert!(matches!(sub.recv().await, Err(RecvError::Lagged(_))));
    }

    #[test]
    fn test_event_severity_and_description() {
        let cancelled = SyncEvent::Failed {
            run_id: "run-1".to_string(),
            phase: "collect_snapshots".to_string(),
            message: "cancelled".to_string(),
            cancelled: true,
        };
        assert_eq!(cancelled.severity(), EventSeverity::Warning);
        assert_eq!(cancelled.description(), "Sync cancelled");
        assert_eq!(phase("run-1", "plan").severity(), EventSeverity::Debug);
    }

    #[test]
    fn test_event_serialization() {
        let event = SyncEvent::PlanComputed {
            run_id: "run-9".to_string(),
            users_to_add: 1,
            users_to_update: 0,
            users_to_delete: 2,
            groups_to_add: 0,
            groups_to_delete: 0,
            members_to_add: 4,
            members_to_remove: 3,
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"PlanComputed\""));
        assert!(json.contains("\"members_to_add\":4"));

        let deserialized: SyncEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, event);
    }

    #[core_async::test]
    async fn test_try_recv() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe());
        assert!(stream.try_recv().is_none());

        bus.emit(phase("run-1", "plan")).ok();
        let received = stream.try_recv().unwrap().unwrap();
        assert_eq!(received.run_id(), "run-1");
    }
}
