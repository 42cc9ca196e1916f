//! Persistent P2P session with one node.
//!
//! Lifecycle: `Disconnected -> Connecting -> Handshaking -> Active -> Disconnected`.
//! While active, a receive loop decodes every read and reports transfers to
//! the observer, and a keepalive loop re-sends the last score frame so the
//! node does not drop us as idle.
//!
//! Connect failures and socket errors are retried forever with a fixed
//! backoff. A zero-length read means the peer closed the connection; the
//! session then ends and leaves the restart decision to the supervisor.

use crate::constants::protocol::{
    CONTENT_ID_BLOCK, CONTENT_ID_GETPEERS, CONTENT_ID_SCORE, CONTENT_ID_TX, TRANSFER_TX_TYPE,
};
use crate::error::{ConnectionError, DecodeError};
use crate::network::transfer::{compute_txid, decode_transfer};
use crate::network::wire::{build_score_frame, decode_score, parse_frames, Frame, Handshake};
use crate::network_type::NetworkType;
use crate::observer::TransactionObserver;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Handshaking,
    Active,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// `host:port` of the node's P2P listener
    pub peer_addr: String,
    pub network: NetworkType,
    pub node_name: String,
    pub version: (u32, u32, u32),
    pub keepalive_interval: Duration,
    pub reconnect_backoff: Duration,
    pub recv_buffer_size: usize,
    /// Drop frames whose checksum does not match their payload
    pub verify_checksums: bool,
}

/// How a single connection ended
#[derive(Debug)]
pub enum SessionEnd {
    /// Zero-length read
    PeerClosed,
    /// `stop()` was called
    Stopped,
    Failed(ConnectionError),
}

pub struct ProtocolSession {
    config: SessionConfig,
    observer: Arc<dyn TransactionObserver>,
    state: RwLock<SessionState>,
    /// Re-sent by the keepalive loop; replaced on every received score
    score_frame: Mutex<Vec<u8>>,
    cancel: CancellationToken,
}

impl ProtocolSession {
    pub fn new(
        config: SessionConfig,
        observer: Arc<dyn TransactionObserver>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            observer,
            state: RwLock::new(SessionState::Disconnected),
            score_frame: Mutex::new(build_score_frame(0)),
            cancel,
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    pub fn peer_addr(&self) -> &str {
        &self.config.peer_addr
    }

    /// Frame the keepalive loop sends next
    pub fn score_frame(&self) -> Vec<u8> {
        self.score_frame.lock().clone()
    }

    /// Ends both loops and any pending connect or backoff
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    fn set_state(&self, state: SessionState) {
        let mut current = self.state.write();
        if *current != state {
            debug!("🔄 P2P session {:?} -> {:?}", *current, state);
            *current = state;
        }
    }

    /// Connect, handshake and serve until the peer closes or `stop()` is called.
    pub async fn run(&self) {
        loop {
            let Some(stream) = self.connect().await else {
                self.set_state(SessionState::Disconnected);
                return;
            };
            let local_port = stream.local_addr().map(|a| a.port()).unwrap_or(0);

            match self.run_connection(stream, local_port).await {
                SessionEnd::PeerClosed => {
                    info!("🔌 P2P connection to {} closed by peer", self.config.peer_addr);
                    return;
                }
                SessionEnd::Stopped => {
                    info!("🛑 P2P session stopped");
                    return;
                }
                SessionEnd::Failed(e) => {
                    warn!(
                        "⚠️ P2P connection to {} lost: {}, reconnecting in {:?}",
                        self.config.peer_addr, e, self.config.reconnect_backoff
                    );
                    if !self.backoff().await {
                        return;
                    }
                }
            }
        }
    }

    /// Retry until connected. `None` only when stopped.
    async fn connect(&self) -> Option<TcpStream> {
        loop {
            if self.cancel.is_cancelled() {
                return None;
            }
            self.set_state(SessionState::Connecting);
            info!("🔗 Connecting to node P2P at {}", self.config.peer_addr);

            let result = tokio::select! {
                _ = self.cancel.cancelled() => return None,
                result = TcpStream::connect(&self.config.peer_addr) => result,
            };
            match result {
                Ok(stream) => {
                    info!("✓ Socket opened to {}", self.config.peer_addr);
                    return Some(stream);
                }
                Err(source) => {
                    let e = ConnectionError::Connect {
                        addr: self.config.peer_addr.clone(),
                        source,
                    };
                    error!("❌ {}, retrying in {:?}", e, self.config.reconnect_backoff);
                    if !self.backoff().await {
                        return None;
                    }
                }
            }
        }
    }

    /// Sleep for the reconnect backoff. Returns false if stopped meanwhile.
    async fn backoff(&self) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(self.config.reconnect_backoff) => true,
        }
    }

    /// Serve one established connection; generic so tests can use in-memory streams.
    pub async fn run_connection<S>(&self, stream: S, local_port: u16) -> SessionEnd
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        self.set_state(SessionState::Handshaking);
        let (mut reader, mut writer) = tokio::io::split(stream);

        let handshake = Handshake::local(
            local_port,
            self.config.network,
            &self.config.node_name,
            self.config.version,
        )
        .encode();
        if let Err(e) = writer.write_all(&handshake).await {
            self.set_state(SessionState::Disconnected);
            return SessionEnd::Failed(ConnectionError::Write(e));
        }
        info!("🤝 Handshake sent ({} bytes, port {})", handshake.len(), local_port);

        *self.score_frame.lock() = build_score_frame(0);
        self.set_state(SessionState::Active);

        let end = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => SessionEnd::Stopped,
            end = self.receive_loop(&mut reader) => end,
            end = self.keepalive_loop(&mut writer) => end,
        };

        // Dropping both halves closes the socket
        self.set_state(SessionState::Disconnected);
        end
    }

    async fn receive_loop<R>(&self, reader: &mut R) -> SessionEnd
    where
        R: AsyncRead + Unpin,
    {
        let mut buf = vec![0u8; self.config.recv_buffer_size];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => return SessionEnd::PeerClosed,
                Ok(n) => {
                    trace!("📥 Received {} bytes", n);
                    self.handle_buffer(&buf[..n]);
                }
                Err(e) => return SessionEnd::Failed(ConnectionError::Read(e)),
            }
        }
    }

    async fn keepalive_loop<W>(&self, writer: &mut W) -> SessionEnd
    where
        W: AsyncWrite + Unpin,
    {
        let mut ticker = tokio::time::interval(self.config.keepalive_interval);
        loop {
            ticker.tick().await;
            let frame = self.score_frame();
            if let Err(e) = writer.write_all(&frame).await {
                return SessionEnd::Failed(ConnectionError::Write(e));
            }
            debug!("💓 Keepalive score sent ({} bytes)", frame.len());
        }
    }

    /// Decode one read: an optional peer handshake followed by frames.
    pub fn handle_buffer(&self, data: &[u8]) {
        let mut data = data;
        if let Some((handshake, used)) = Handshake::decode_prefix(data) {
            info!(
                "🤝 Peer handshake: {} v{}.{}.{} name={}",
                handshake.network,
                handshake.version.0,
                handshake.version.1,
                handshake.version.2,
                handshake.node_name
            );
            if handshake.network != self.config.network {
                warn!(
                    "⚠️ Peer is on {} but we are configured for {}",
                    handshake.network, self.config.network
                );
            }
            data = &data[used..];
        }

        for frame in parse_frames(data) {
            match frame {
                Ok(frame) => self.handle_frame(&frame),
                Err(DecodeError::BadMagic { found }) => {
                    error!(
                        "❌ Invalid magic {:#010x}, skipping rest of buffer: {}",
                        found,
                        hex::encode(data)
                    );
                }
                Err(e) => {
                    warn!("⚠️ Dropping undecodable frame: {} buffer={}", e, hex::encode(data));
                }
            }
        }
    }

    fn handle_frame(&self, frame: &Frame<'_>) {
        if !frame.checksum_valid() {
            warn!(
                "⚠️ Checksum mismatch on content id {:#04x} ({} byte payload)",
                frame.content_id,
                frame.payload.len()
            );
            if self.config.verify_checksums {
                return;
            }
        }

        match frame.content_id {
            CONTENT_ID_TX => self.handle_transaction(frame.payload),
            CONTENT_ID_SCORE => {
                match decode_score(frame.payload) {
                    Ok(score) => debug!("📊 Peer score {}", score),
                    Err(e) => warn!("⚠️ {}", e),
                }
                *self.score_frame.lock() = frame.encode();
            }
            CONTENT_ID_BLOCK => debug!("📦 Block frame ({} bytes)", frame.payload.len()),
            CONTENT_ID_GETPEERS => debug!("📇 GetPeers request"),
            other => trace!("Ignoring content id {:#04x}", other),
        }
    }

    fn handle_transaction(&self, payload: &[u8]) {
        if payload.first() != Some(&TRANSFER_TX_TYPE) {
            trace!("Ignoring non-transfer transaction");
            return;
        }

        match decode_transfer(payload) {
            Ok(tx) => {
                let txid = compute_txid(&tx);
                let sender = tx.sender_address(self.config.network).to_string();
                let recipient = tx.recipient.to_string();
                debug!(
                    txid = txid.as_str(),
                    amount = tx.amount,
                    fee = tx.fee,
                    "transfer observed on P2P"
                );
                self.observer.on_transfer(&sender, &recipient);
            }
            Err(e) => {
                let buffer = e.buffer_hex().unwrap_or_else(|| hex::encode(payload));
                warn!("⚠️ Dropping transfer: {} buffer={}", e, buffer);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::test_vectors::*;
    use crate::network::wire::encode_frame;
    use crate::observer::RecordingObserver;

    fn config() -> SessionConfig {
        SessionConfig {
            peer_addr: "127.0.0.1:1".to_string(),
            network: NetworkType::Testnet,
            node_name: "wavescache".to_string(),
            version: (0, 13, 2),
            keepalive_interval: Duration::from_secs(3600),
            reconnect_backoff: Duration::from_secs(3600),
            recv_buffer_size: 64 * 1024,
            verify_checksums: false,
        }
    }

    fn session(config: SessionConfig) -> (ProtocolSession, Arc<RecordingObserver>) {
        let observer = Arc::new(RecordingObserver::new());
        let session = ProtocolSession::new(config, observer.clone(), CancellationToken::new());
        (session, observer)
    }

    fn handshake_len() -> usize {
        Handshake::local(0, NetworkType::Testnet, "wavescache", (0, 13, 2))
            .encode()
            .len()
    }

    #[test]
    fn test_transfer_frame_reaches_observer() {
        let (session, observer) = session(config());
        session.handle_buffer(&bytes(TRANSFER_FRAME_HEX));
        assert_eq!(
            observer.transfers(),
            vec![(TRANSFER_SENDER.to_string(), TRANSFER_RECIPIENT.to_string())]
        );
    }

    #[test]
    fn test_frames_after_peer_handshake_are_decoded() {
        let (session, observer) = session(config());
        let mut buf = Handshake::local(6863, NetworkType::Testnet, "node", (1, 4, 0)).encode();
        buf.extend_from_slice(&bytes(TRANSFER_FRAME_HEX));
        session.handle_buffer(&buf);
        assert_eq!(observer.transfers().len(), 1);
    }

    #[test]
    fn test_score_replaces_keepalive_frame() {
        let (session, _) = session(config());
        assert_eq!(session.score_frame(), build_score_frame(0));

        session.handle_buffer(&bytes(SCORE_FRAME_HEX));
        assert_eq!(session.score_frame(), bytes(SCORE_FRAME_HEX));
    }

    #[test]
    fn test_bad_checksum_tolerated_by_default() {
        let mut frame = bytes(TRANSFER_FRAME_HEX);
        frame[13] ^= 0xff;

        let (tolerant, seen) = session(config());
        tolerant.handle_buffer(&frame);
        assert_eq!(seen.transfers().len(), 1);

        let (strict, seen) = session(SessionConfig {
            verify_checksums: true,
            ..config()
        });
        strict.handle_buffer(&frame);
        assert!(seen.transfers().is_empty());
    }

    #[test]
    fn test_garbage_is_dropped() {
        let (session, observer) = session(config());
        session.handle_buffer(&[0xde, 0xad, 0xbe, 0xef, 0, 0, 0, 0, 1, 2, 3, 4, 5]);

        // Truncated transfer payload inside a well-formed frame
        let payload = transfer_payload();
        session.handle_buffer(&encode_frame(CONTENT_ID_TX, &payload[..60]));

        assert!(observer.transfers().is_empty());
    }

    #[tokio::test]
    async fn test_peer_close_disconnects() {
        let (session, _) = session(config());
        let (client, mut peer) = tokio::io::duplex(64 * 1024);

        let peer_task = tokio::spawn(async move {
            // Our handshake, then the immediate keepalive
            let mut buf = vec![0u8; handshake_len() + build_score_frame(0).len()];
            peer.read_exact(&mut buf).await.unwrap();
            assert_eq!(buf[1..7], *b"wavesT");
            drop(peer);
        });

        let end = session.run_connection(client, 40000).await;
        peer_task.await.unwrap();
        assert!(matches!(end, SessionEnd::PeerClosed));
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_transfer_over_stream() {
        let (session, observer) = session(config());
        let (client, mut peer) = tokio::io::duplex(64 * 1024);

        let peer_task = tokio::spawn(async move {
            let mut buf = vec![0u8; handshake_len() + build_score_frame(0).len()];
            peer.read_exact(&mut buf).await.unwrap();
            let mut reply = Handshake::local(6863, NetworkType::Testnet, "node", (1, 4, 0)).encode();
            reply.extend_from_slice(&bytes(TRANSFER_FRAME_HEX));
            peer.write_all(&reply).await.unwrap();
        });

        let end = session.run_connection(client, 40000).await;
        peer_task.await.unwrap();
        assert!(matches!(end, SessionEnd::PeerClosed));
        assert_eq!(observer.transfers().len(), 1);
    }

    #[tokio::test]
    async fn test_stop_interrupts_reconnect_backoff() {
        // Bind then drop to get a port nobody listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (session, _) = session(SessionConfig {
            peer_addr: addr.to_string(),
            ..config()
        });
        let session = Arc::new(session);
        let runner = {
            let session = session.clone();
            tokio::spawn(async move { session.run().await })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        session.stop();
        tokio::time::timeout(Duration::from_secs(5), runner)
            .await
            .expect("session did not stop")
            .unwrap();
        assert_eq!(session.state(), SessionState::Disconnected);
    }
}
