//! Transfer notifications shared by the P2P session and the block poller.

/// Receives every transfer seen on the network, from either source.
///
/// Called inline on the observing task, so implementations must not block.
/// The same transfer may be reported more than once.
pub trait TransactionObserver: Send + Sync {
    fn on_transfer(&self, sender: &str, recipient: &str);
}

/// Records every notification; used by tests across the crate
#[derive(Default)]
pub struct RecordingObserver {
    seen: parking_lot::Mutex<Vec<(String, String)>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transfers(&self) -> Vec<(String, String)> {
        self.seen.lock().clone()
    }
}

impl TransactionObserver for RecordingObserver {
    fn on_transfer(&self, sender: &str, recipient: &str) {
        self.seen
            .lock()
            .push((sender.to_string(), recipient.to_string()));
    }
}
