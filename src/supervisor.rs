//! Task supervision and coordinated shutdown.
//!
//! Each component runs as its own task with a stop hook. A liveness loop
//! checks that every task is still running; if one ends on its own, or a
//! termination signal arrives, every component is stopped and the tasks are
//! awaited up to a timeout.

use crate::cache::CacheStore;
use crate::error::AppError;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

type StopHook = Box<dyn Fn() + Send + Sync>;

struct SupervisedTask {
    name: &'static str,
    handle: JoinHandle<()>,
    stop: StopHook,
}

pub struct Supervisor {
    tasks: Vec<SupervisedTask>,
    cancel_token: CancellationToken,
    liveness_interval: Duration,
    shutdown_timeout: Duration,
    cache: Option<Arc<CacheStore>>,
}

impl Supervisor {
    pub fn new(liveness_interval: Duration, shutdown_timeout: Duration) -> Self {
        Self {
            tasks: Vec::new(),
            cancel_token: CancellationToken::new(),
            liveness_interval,
            shutdown_timeout,
            cache: None,
        }
    }

    /// Log cache statistics on every liveness tick
    pub fn with_cache_stats(mut self, cache: Arc<CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Child token for a component; cancelled on shutdown
    pub fn child_token(&self) -> CancellationToken {
        self.cancel_token.child_token()
    }

    pub fn spawn<F, S>(&mut self, name: &'static str, stop: S, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
        S: Fn() + Send + Sync + 'static,
    {
        tracing::info!("🚀 Starting {}", name);
        self.tasks.push(SupervisedTask {
            name,
            handle: tokio::spawn(task),
            stop: Box::new(stop),
        });
    }

    pub fn live_count(&self) -> usize {
        self.tasks
            .iter()
            .filter(|task| !task.handle.is_finished())
            .count()
    }

    /// Supervise until SIGINT/SIGTERM or a task exits
    pub async fn run(self) -> Result<(), AppError> {
        self.run_until(shutdown_signal()).await
    }

    /// Supervise until `signal` resolves or a task exits, then shut everything down.
    ///
    /// Returns `TaskExited` when shutdown was caused by a task ending on its own.
    pub async fn run_until<F>(self, signal: F) -> Result<(), AppError>
    where
        F: Future<Output = ()>,
    {
        let expected = self.tasks.len();
        let mut ticker = tokio::time::interval(self.liveness_interval);
        tokio::pin!(signal);

        let result = loop {
            tokio::select! {
                _ = &mut signal => {
                    tracing::info!("🛑 Shutdown signal received");
                    break Ok(());
                }
                _ = ticker.tick() => {
                    if let Some(cache) = &self.cache {
                        let stats = cache.stats();
                        tracing::debug!(
                            entries = stats.entries,
                            addresses = stats.addresses,
                            hits = stats.hits,
                            misses = stats.misses,
                            invalidated = stats.invalidated,
                            "cache stats"
                        );
                    }

                    let live = self.live_count();
                    if live < expected {
                        let dead = self
                            .tasks
                            .iter()
                            .find(|task| task.handle.is_finished())
                            .map(|task| task.name)
                            .unwrap_or("unknown");
                        tracing::error!(
                            "❌ {} exited ({}/{} tasks alive), shutting down",
                            dead,
                            live,
                            expected
                        );
                        break Err(AppError::TaskExited(dead.to_string()));
                    }
                }
            }
        };

        self.shutdown().await;
        result
    }

    async fn shutdown(mut self) {
        for task in &self.tasks {
            tracing::debug!("Stopping {}", task.name);
            (task.stop)();
        }
        self.cancel_token.cancel();

        let timeout = self.shutdown_timeout;
        let shutdown_tasks = std::pin::pin!(async {
            for task in self.tasks.drain(..) {
                if let Err(e) = task.handle.await {
                    tracing::warn!("⚠️ {} ended abnormally: {}", task.name, e);
                }
            }
        });

        match tokio::time::timeout(timeout, shutdown_tasks).await {
            Ok(_) => {
                tracing::info!("✓ All tasks shut down gracefully");
            }
            Err(_) => {
                tracing::warn!("⏱️  Shutdown timeout: Some tasks did not complete");
            }
        }
    }
}

/// Resolves on Ctrl-C, or SIGTERM on Unix
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
