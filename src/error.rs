use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Supervised task '{0}' exited unexpectedly")]
    TaskExited(String),

    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

/// Malformed or truncated wire data. Never fatal: the frame is logged and dropped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Frame truncated: need {needed} bytes, have {available}")]
    TruncatedFrame { needed: usize, available: usize },

    #[error("Invalid magic: {found:#010x}")]
    BadMagic { found: u32 },

    #[error("Payload too short to decode {stage}: need {needed} bytes, have {available}")]
    PayloadTooShort {
        stage: &'static str,
        needed: usize,
        available: usize,
        /// Offending buffer, kept for diagnostic capture
        buffer: Vec<u8>,
    },

    #[error("Unexpected transaction type {0}")]
    UnexpectedType(u8),

    #[error("Score payload of {0} bytes does not fit in 128 bits")]
    ScoreTooLarge(usize),
}

impl DecodeError {
    /// Hex rendering of the captured buffer, if any
    pub fn buffer_hex(&self) -> Option<String> {
        match self {
            DecodeError::PayloadTooShort { buffer, .. } => Some(hex::encode(buffer)),
            _ => None,
        }
    }
}

/// P2P socket failures; the session reconnects after a fixed backoff.
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Socket read failed: {0}")]
    Read(#[source] std::io::Error),

    #[error("Socket write failed: {0}")]
    Write(#[source] std::io::Error),
}

/// Failures talking to the node's HTTP API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OriginError {
    #[error("Origin request timed out")]
    Timeout,

    #[error("Origin unreachable: {0}")]
    Unreachable(String),

    #[error("Origin returned status {0}")]
    Status(u16),

    #[error("Invalid origin response body: {0}")]
    InvalidBody(String),
}

impl From<reqwest::Error> for OriginError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            OriginError::Timeout
        } else if e.is_decode() {
            OriginError::InvalidBody(e.to_string())
        } else if let Some(status) = e.status() {
            OriginError::Status(status.as_u16())
        } else {
            OriginError::Unreachable(e.to_string())
        }
    }
}
