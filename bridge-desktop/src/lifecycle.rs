//! Host-driven lifecycle observer
//!
//! Desktop shells have no single app-lifecycle API, so the host reports
//! transitions (window minimized, quit requested, ...) through [`notify`].
//!
//! [`notify`]: ChannelLifecycleObserver::notify

use async_trait::async_trait;
use bridge_traits::{
    error::Result,
    lifecycle::{LifecycleChangeStream, LifecycleObserver, LifecycleState},
};
use tokio::sync::watch;
use tracing::debug;

/// Lifecycle observer backed by a `tokio::sync::watch` channel.
///
/// Subscribers only see the latest state; intermediate transitions that
/// happen between two polls are coalesced.
pub struct ChannelLifecycleObserver {
    sender: watch::Sender<LifecycleState>,
}

impl ChannelLifecycleObserver {
    /// Create an observer starting in the foreground.
    pub fn new() -> Self {
        let (sender, _) = watch::channel(LifecycleState::Foreground);
        Self { sender }
    }

    /// Report a lifecycle transition from the host.
    pub fn notify(&self, state: LifecycleState) {
        debug!(?state, "Lifecycle transition");
        self.sender.send_replace(state);
    }
}

impl Default for ChannelLifecycleObserver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LifecycleObserver for ChannelLifecycleObserver {
    async fn get_state(&self) -> Result<LifecycleState> {
        Ok(*self.sender.borrow())
    }

    async fn subscribe_changes(&self) -> Result<Box<dyn LifecycleChangeStream>> {
        Ok(Box::new(WatchLifecycleStream {
            receiver: self.sender.subscribe(),
        }))
    }
}

struct WatchLifecycleStream {
    receiver: watch::Receiver<LifecycleState>,
}

#[async_trait]
impl LifecycleChangeStream for WatchLifecycleStream {
    async fn next(&mut self) -> Option<LifecycleState> {
        self.receiver.changed().await.ok()?;
        let state = *self.receiver.borrow_and_update();
        Some(state)
    }
}
