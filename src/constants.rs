//! Global constants for the Waves cache proxy
//!
//! Centralizes the wire-protocol numbers and the default timings so the
//! decoder, the session and the config defaults agree on them.

/// Waves P2P wire protocol constants
pub mod protocol {
    /// Magic marker carried by every frame (0x12345678)
    pub const MAGIC: u32 = 305_419_896;

    pub const CONTENT_ID_GETPEERS: u8 = 0x01;
    pub const CONTENT_ID_BLOCK: u8 = 0x17;
    pub const CONTENT_ID_SCORE: u8 = 0x18;
    pub const CONTENT_ID_TX: u8 = 0x19;

    /// length(4) + magic(4) + content_id(1) + payload_len(4)
    pub const FRAME_HEADER_LEN: usize = 13;

    /// Header plus the 4-byte payload checksum
    pub const FRAME_HEADER_WITH_CHECKSUM_LEN: usize = FRAME_HEADER_LEN + CHECKSUM_LEN;

    pub const CHECKSUM_LEN: usize = 4;

    /// Transaction type byte of a transfer
    pub const TRANSFER_TX_TYPE: u8 = 4;

    /// Recipient type byte of a plain address
    pub const RECIPIENT_ADDRESS: u8 = 1;

    /// Size of an address recipient: version, chain id, 20-byte hash, 4-byte checksum
    pub const ADDRESS_LEN: usize = 26;

    /// Application version announced in our handshake
    pub const DEFAULT_VERSION: (u32, u32, u32) = (0, 13, 2);

    /// Declared address 127.0.0.1 announced in our handshake
    pub const DECLARED_LOOPBACK: u32 = 0x7f00_0001;
}

/// Timing and sizing defaults
pub mod network {
    /// Interval between keepalive score frames (the node kicks peers idle for a minute)
    pub const KEEPALIVE_INTERVAL_SECS: u64 = 20;

    /// Fixed delay between P2P connect attempts
    pub const RECONNECT_BACKOFF_SECS: u64 = 10;

    /// Receive buffer for a single socket read (1 MB)
    pub const RECV_BUFFER_SIZE: usize = 1024 * 1024;

    /// Block poller interval
    pub const POLL_INTERVAL_SECS: u64 = 20;

    /// Timeout for HTTP requests to the node
    pub const REQUEST_TIMEOUT_SECS: u64 = 30;

    pub const PROXY_LISTEN_ADDRESS: &str = "127.0.0.1:5100";

    pub const NODE_HTTP_BASE_URL: &str = "http://127.0.0.1:6869";
}

/// Supervisor timings
pub mod supervisor {
    pub const LIVENESS_CHECK_SECS: u64 = 1;

    /// Max time to wait for tasks after a stop request
    pub const SHUTDOWN_TIMEOUT_SECS: u64 = 10;
}
