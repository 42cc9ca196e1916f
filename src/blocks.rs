//! Block poller: a second, HTTP-based source of transfers.
//!
//! Catches transfers the P2P stream missed (reconnect gaps, partial reads).
//! Every interval it reads the chain height and walks the blocks from the
//! cursor up to the tip, exclusive of the height itself. The cursor is then
//! set to the height, so the open tip block is read again next cycle while
//! the node keeps appending to it.

use crate::error::OriginError;
use crate::node::NodeApi;
use crate::observer::TransactionObserver;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub struct BlockPoller {
    node: Arc<dyn NodeApi>,
    observer: Arc<dyn TransactionObserver>,
    interval: Duration,
    /// Next height to read; 0 until the first successful cycle
    cursor: AtomicU64,
    cancel: CancellationToken,
}

impl BlockPoller {
    pub fn new(
        node: Arc<dyn NodeApi>,
        observer: Arc<dyn TransactionObserver>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            node,
            observer,
            interval,
            cursor: AtomicU64::new(0),
            cancel,
        }
    }

    /// Start from a known height instead of fast-forwarding to the tip
    pub fn with_cursor(self, cursor: u64) -> Self {
        self.cursor.store(cursor, Ordering::SeqCst);
        self
    }

    pub fn cursor(&self) -> u64 {
        self.cursor.load(Ordering::SeqCst)
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Poll until stopped. A failed cycle is logged and retried on the next tick.
    pub async fn run(&self) {
        tracing::info!("📦 Block poller started (every {:?})", self.interval);
        let mut ticker = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("🛑 Block poller stopped at height {}", self.cursor());
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.poll_once().await {
                        tracing::warn!("⚠️ Block poll failed, cursor stays at {}: {}", self.cursor(), e);
                    }
                }
            }
        }
    }

    /// One cycle. The cursor only moves when every block in range was read.
    pub async fn poll_once(&self) -> Result<(), OriginError> {
        let height = self.node.height().await?;
        let cursor = self.cursor();

        if cursor == 0 {
            tracing::info!("⏩ Block poller starting at height {}", height);
            self.cursor.store(height, Ordering::SeqCst);
            return Ok(());
        }

        for at in cursor..height {
            if self.cancel.is_cancelled() {
                return Ok(());
            }
            let block = self.node.block_at(at).await?;
            tracing::info!(
                "📦 Block {} {} ({} txs)",
                at,
                block.signature,
                block.transactions.len()
            );
            for (sender, recipient) in block.transfers() {
                self.observer.on_transfer(sender, recipient);
            }
        }

        self.cursor.fetch_max(height, Ordering::SeqCst);
        Ok(())
    }
}
