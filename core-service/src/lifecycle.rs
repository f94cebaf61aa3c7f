//! Lifecycle-driven favorites persistence.

use bridge_traits::lifecycle::LifecycleState;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::service::PhotoBrowserService;

impl PhotoBrowserService {
    /// Save favorites when leaving the foreground, restore them on return.
    pub async fn handle_lifecycle(&self, state: LifecycleState) -> Result<()> {
        debug!(?state, "Lifecycle transition");
        if state.is_leaving_foreground() {
            self.save_favorites().await?;
        } else {
            self.load_favorites().await?;
        }
        Ok(())
    }

    /// Follow the configured lifecycle observer on a background task.
    ///
    /// Returns `None` when no observer was configured. Persistence failures
    /// are logged and reported as events; the task keeps running until the
    /// observer's stream ends.
    pub async fn watch_lifecycle(&self) -> Result<Option<JoinHandle<()>>> {
        let Some(observer) = self.lifecycle_observer() else {
            return Ok(None);
        };

        let mut changes = observer.subscribe_changes().await?;
        let service = self.clone();

        let handle = tokio::spawn(async move {
            while let Some(state) = changes.next().await {
                if let Err(e) = service.handle_lifecycle(state).await {
                    warn!(?state, error = %e, "Lifecycle persistence failed");
                }
            }
            info!("Lifecycle stream closed");
        });

        Ok(Some(handle))
    }
}
