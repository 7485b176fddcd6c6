//! Shutdown coordination.

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Coordinator for graceful shutdown.
///
/// The server, the config reload loop and the store sweeper each hold a
/// receiver and stop when it fires.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Number of tasks still listening.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Wait up to `deadline` for a task to drain, then abort it.
///
/// Returns `None` if the task was aborted or panicked.
pub async fn drain<T>(mut task: JoinHandle<T>, deadline: Duration) -> Option<T> {
    match tokio::time::timeout(deadline, &mut task).await {
        Ok(Ok(output)) => Some(output),
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Task failed while draining");
            None
        }
        Err(_) => {
            tracing::warn!(deadline_secs = deadline.as_secs(), "Drain deadline passed, aborting");
            task.abort();
            None
        }
    }
}
