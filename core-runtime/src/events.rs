//! # Event Bus System
//!
//! Provides an event-driven architecture for the photo browser core using
//! `tokio::sync::broadcast`. Hosts subscribe to drive busy indicators, refresh
//! result grids when pages land, and surface persistence failures.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────┐   emit    ┌───────────┐
//! │   Dispatcher   ├──────────>│           │
//! └────────────────┘           │           │   subscribe   ┌────────────┐
//!                              │ EventBus  ├──────────────>│ Subscriber │
//! ┌────────────────┐   emit    │ (broadcast│               └────────────┘
//! │ Search service ├──────────>│  channel) │
//! └────────────────┘           │           │   subscribe   ┌────────────┐
//! ┌────────────────┐   emit    │           ├──────────────>│ Subscriber │
//! │   Favorites    ├──────────>│           │               └────────────┘
//! └────────────────┘           └───────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, SearchEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut stream = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Search(SearchEvent::Started {
//!         search_term: "Cats".to_string(),
//!     }))
//!     .ok();
//!
//! let event = stream.recv().await.unwrap();
//! assert_eq!(event.description(), "Search started");
//! # }
//! ```
//!
//! ## Event Types
//!
//! ### Request Events
//! - `BusyStarted`: A request that asked for a busy indicator was accepted
//! - `BusyEnded`: That request finished; emitted before its completion runs
//!
//! ### Search Events
//! - `Started`: A new search replaced the cached results
//! - `PageCached`: A listing page was appended to the cache
//! - `PageRejected`: A listing page could not be stored
//! - `ThumbnailCached`: Thumbnail bytes were attached to an item
//!
//! ### Favorites Events
//! - `Added` / `Removed`: The favorites list changed
//! - `Saved` / `Restored`: The archive was written or read
//! - `PersistenceFailed`: Writing or reading the archive failed
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n` events.
//!   This is non-fatal; the subscriber can continue receiving new events.
//! - **`RecvError::Closed`**: All senders have been dropped. This indicates shutdown.
//!
//! Emitting with no subscribers returns an error that callers ignore.

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

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// In-flight request lifecycle
    Request(RequestEvent),
    /// Search results cache changes
    Search(SearchEvent),
    /// Favorites list and archive changes
    Favorites(FavoritesEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Request(e) => e.description(),
            CoreEvent::Search(e) => e.description(),
            CoreEvent::Favorites(e) => e.description(),
        }
    }

    /// Returns the severity level of this event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Favorites(FavoritesEvent::PersistenceFailed { .. }) => EventSeverity::Error,
            CoreEvent::Search(SearchEvent::PageRejected { .. }) => EventSeverity::Warning,
            CoreEvent::Search(SearchEvent::Started { .. })
            | CoreEvent::Favorites(FavoritesEvent::Saved { .. })
            | CoreEvent::Favorites(FavoritesEvent::Restored { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
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
// Request Events
// ============================================================================

/// Busy-indicator signals for dispatched requests.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum RequestEvent {
    BusyStarted {
        /// Caller-supplied context (e.g. the screen that asked)
        context: Option<String>,
        /// Resolved target, with credentials redacted
        target: String,
    },
    BusyEnded {
        context: Option<String>,
        target: String,
    },
}

impl RequestEvent {
    pub fn description(&self) -> &str {
        match self {
            RequestEvent::BusyStarted { .. } => "Request started",
            RequestEvent::BusyEnded { .. } => "Request finished",
        }
    }
}

// ============================================================================
// Search Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SearchEvent {
    Started {
        search_term: String,
    },
    PageCached {
        search_term: String,
        page: u32,
        /// Items now addressable by flat index
        item_count: usize,
        /// Total reported by the remote service
        total: u64,
    },
    PageRejected {
        search_term: String,
        page: u32,
        reason: String,
    },
    ThumbnailCached {
        index: usize,
        photo_id: String,
    },
}

impl SearchEvent {
    pub fn description(&self) -> &str {
        match self {
            SearchEvent::Started { .. } => "Search started",
            SearchEvent::PageCached { .. } => "Results page cached",
            SearchEvent::PageRejected { .. } => "Results page rejected",
            SearchEvent::ThumbnailCached { .. } => "Thumbnail cached",
        }
    }
}

// ============================================================================
// Favorites Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum FavoritesEvent {
    Added { photo_id: String, count: usize },
    Removed { photo_id: String, removed: usize, count: usize },
    Saved { count: usize },
    Restored { count: usize },
    PersistenceFailed { operation: String, message: String },
}

impl FavoritesEvent {
    pub fn description(&self) -> &str {
        match self {
            FavoritesEvent::Added { .. } => "Favorite added",
            FavoritesEvent::Removed { .. } => "Favorite removed",
            FavoritesEvent::Saved { .. } => "Favorites saved",
            FavoritesEvent::Restored { .. } => "Favorites restored",
            FavoritesEvent::PersistenceFailed { .. } => "Favorites persistence failed",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to core events.
///
/// Cloning is cheap; all clones share one channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// Subscribers that fall behind by more than `capacity` events receive
    /// `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
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

/// A wrapper around `broadcast::Receiver` with optional filtering.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let event_bus = EventBus::new(100);
/// let busy_only = EventStream::new(event_bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Request(_)));
/// ```
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

    /// Only events matching `predicate` are returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn matches(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter (if any).
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.matches(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
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
