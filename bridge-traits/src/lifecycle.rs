//! Application Lifecycle
//!
//! Lets the core react to foreground/background transitions. The favorites
//! archive is written when the app leaves the foreground and restored when
//! it returns.

use async_trait::async_trait;

use crate::error::Result;

/// Lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Application is in the foreground and active
    Foreground,
    /// Application is in the background
    Background,
    /// Application is being suspended or torn down
    Suspended,
}

impl LifecycleState {
    /// Whether the app is leaving the foreground (time to persist state).
    pub fn is_leaving_foreground(&self) -> bool {
        matches!(self, LifecycleState::Background | LifecycleState::Suspended)
    }
}

/// Lifecycle observer trait
///
/// Notifies the core about app lifecycle transitions so it can:
/// - Persist user state before being backgrounded or torn down
/// - Restore user state when foregrounded
///
/// # Platform Support
///
/// - **Mobile**: Application lifecycle notifications
/// - **Desktop**: Window focus/minimize events, or an explicit host signal
///
/// # Example
///
/// ```ignore
/// use bridge_traits::lifecycle::{LifecycleObserver, LifecycleState};
///
/// async fn follow(observer: &dyn LifecycleObserver) -> Result<()> {
///     let mut stream = observer.subscribe_changes().await?;
///
///     while let Some(state) = stream.next().await {
///         match state {
///             LifecycleState::Foreground => restore(),
///             _ => persist(),
///         }
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait LifecycleObserver: Send + Sync {
    /// Get current lifecycle state
    async fn get_state(&self) -> Result<LifecycleState>;

    /// Subscribe to lifecycle state changes
    async fn subscribe_changes(&self) -> Result<Box<dyn LifecycleChangeStream>>;
}

/// Stream of lifecycle state changes
#[async_trait]
pub trait LifecycleChangeStream: Send {
    /// Get the next lifecycle state update
    ///
    /// Returns `None` when the stream is closed.
    async fn next(&mut self) -> Option<LifecycleState>;
}
