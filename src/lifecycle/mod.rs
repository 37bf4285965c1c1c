//! LifecycleController - Startup and Cooperative Shutdown
//!
//! ## Responsibilities
//!
//! - Own the shared stop signal every worker and the dispatcher subscribe to
//! - Track spawned tasks by name
//! - Drive shutdown: signal, then join each task with a bounded timeout
//!
//! Shutdown is cooperative: tasks observe the signal at their loop
//! boundaries. Events still in the alert queue when the dispatcher exits
//! are lost - accepted under the best-effort delivery model. A task that
//! fails to stop within its timeout is logged and abandoned, never awaited
//! indefinitely.

use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Named background task handle
struct ManagedTask {
    name: String,
    handle: JoinHandle<()>,
}

/// Controls the camera workers and the dispatcher
pub struct LifecycleController {
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<ManagedTask>,
    join_timeout: Duration,
}

impl LifecycleController {
    pub fn new(join_timeout: Duration) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            shutdown_tx,
            tasks: Vec::new(),
            join_timeout,
        }
    }

    /// Stop-signal receiver for a task about to be spawned
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Track a spawned task for joined shutdown
    pub fn register(&mut self, name: impl Into<String>, handle: JoinHandle<()>) {
        self.tasks.push(ManagedTask {
            name: name.into(),
            handle,
        });
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Signal every task to stop, then join each with the bounded timeout.
    pub async fn shutdown(self) {
        tracing::info!(tasks = self.tasks.len(), "Initiating shutdown");

        // Ignore send errors: no receivers means every task already exited
        let _ = self.shutdown_tx.send(true);

        for task in self.tasks {
            match tokio::time::timeout(self.join_timeout, task.handle).await {
                Ok(Ok(())) => {
                    tracing::info!(task = %task.name, "Task stopped");
                }
                Ok(Err(e)) => {
                    tracing::error!(task = %task.name, error = %e, "Task panicked");
                }
                Err(_) => {
                    tracing::warn!(
                        task = %task.name,
                        timeout_sec = self.join_timeout.as_secs(),
                        "Task did not stop in time"
                    );
                }
            }
        }

        tracing::info!("Shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn shutdown_joins_cooperative_tasks() {
        let mut controller = LifecycleController::new(Duration::from_millis(500));

        for i in 0..3 {
            let mut shutdown = controller.subscribe();
            let handle = tokio::spawn(async move {
                loop {
                    if *shutdown.borrow() {
                        break;
                    }
                    tokio::select! {
                        _ = tokio::time::sleep(Duration::from_millis(10)) => {}
                        _ = shutdown.changed() => {}
                    }
                }
            });
            controller.register(format!("worker-{}", i), handle);
        }

        assert_eq!(controller.task_count(), 3);
        tokio::time::timeout(Duration::from_secs(1), controller.shutdown())
            .await
            .expect("shutdown must complete");
    }

    #[tokio::test]
    async fn shutdown_abandons_stuck_tasks_after_timeout() {
        let mut controller = LifecycleController::new(Duration::from_millis(50));

        // Ignores the stop signal entirely
        let handle = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
        });
        controller.register("stuck", handle);

        // Completes despite the stuck task: bounded, not indefinite
        tokio::time::timeout(Duration::from_millis(500), controller.shutdown())
            .await
            .expect("shutdown must not wait forever on a stuck task");
    }

    #[tokio::test]
    async fn signal_reaches_late_subscribers() {
        let controller = LifecycleController::new(Duration::from_millis(100));
        let shutdown = controller.subscribe();
        assert!(!*shutdown.borrow());

        controller.shutdown().await;
        assert!(*shutdown.borrow());
    }
}
