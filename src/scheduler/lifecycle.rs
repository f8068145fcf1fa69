//! Shutdown coordination.

use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::error::Result;
use crate::types::Event;

use super::DownloadScheduler;

impl DownloadScheduler {
    /// Gracefully shut down the scheduler
    ///
    /// 1. Stops accepting submissions ([`Error::ShuttingDown`](crate::Error::ShuttingDown))
    /// 2. Cancels every task, queued or running
    /// 3. Waits up to `shutdown_timeout` for workers to stop their processes
    /// 4. Stops the coordinator and emits [`Event::Shutdown`]
    ///
    /// Calling it twice is harmless.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        self.accepting_new.store(false, Ordering::SeqCst);
        tracing::info!("Stopped accepting new downloads");

        self.cancel_all_tasks().await;

        let timeout = self.config.download.shutdown_timeout;
        match tokio::time::timeout(timeout, self.wait_for_running_tasks()).await {
            Ok(()) => tracing::info!("All running tasks stopped"),
            Err(_) => tracing::warn!(
                timeout_secs = timeout.as_secs(),
                "Timeout waiting for tasks to stop, proceeding with shutdown"
            ),
        }

        self.coordinator_stop.cancel();
        self.emit_event(Event::Shutdown);
        tracing::info!("Graceful shutdown complete");
        Ok(())
    }

    /// Whether [`shutdown`](Self::shutdown) has been started
    pub fn is_shutting_down(&self) -> bool {
        !self.accepting_new.load(Ordering::SeqCst)
    }

    async fn wait_for_running_tasks(&self) {
        loop {
            let (running, listed) = {
                let state = self.state.lock().await;
                (state.pool.running(), state.tasks.len())
            };
            if running == 0 && listed == 0 {
                return;
            }
            tracing::debug!(running, listed, "Waiting for running tasks to stop");
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}
