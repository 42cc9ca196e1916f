//! TOML configuration for the cache proxy.
//!
//! Every field has a default, so a partial file (or none at all) is valid.
//! A missing file is written out with defaults on first start.

use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::constants::{network as net, protocol, supervisor};
use crate::error::AppError;
use crate::network::session::SessionConfig;
use crate::network_type::NetworkType;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub poller: PollerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_true")]
    pub testnet: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self { testnet: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default = "default_http_base_url")]
    pub http_base_url: String,
    #[serde(default = "default_p2p_host")]
    pub p2p_host: String,
    /// Falls back to the network's standard P2P port
    #[serde(default)]
    pub p2p_port: Option<u16>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            http_base_url: default_http_base_url(),
            p2p_host: default_p2p_host(),
            p2p_port: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    #[serde(default = "default_node_name")]
    pub node_name: String,
    #[serde(default = "default_version")]
    pub version: [u32; 3],
    #[serde(default = "default_keepalive_interval_secs")]
    pub keepalive_interval_secs: u64,
    #[serde(default = "default_reconnect_backoff_secs")]
    pub reconnect_backoff_secs: u64,
    #[serde(default = "default_recv_buffer_size")]
    pub recv_buffer_size: usize,
    /// Drop frames whose checksum does not match (mismatches are always logged)
    #[serde(default)]
    pub verify_checksums: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            node_name: default_node_name(),
            version: default_version(),
            keepalive_interval_secs: default_keepalive_interval_secs(),
            reconnect_backoff_secs: default_reconnect_backoff_secs(),
            recv_buffer_size: default_recv_buffer_size(),
            verify_checksums: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub interval_secs: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// "pretty" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    #[serde(default = "default_liveness_check_secs")]
    pub liveness_check_secs: u64,
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            liveness_check_secs: default_liveness_check_secs(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_http_base_url() -> String {
    net::NODE_HTTP_BASE_URL.to_string()
}

fn default_p2p_host() -> String {
    "127.0.0.1".to_string()
}

fn default_request_timeout_secs() -> u64 {
    net::REQUEST_TIMEOUT_SECS
}

fn default_listen_address() -> String {
    net::PROXY_LISTEN_ADDRESS.to_string()
}

fn default_node_name() -> String {
    "wavescache".to_string()
}

fn default_version() -> [u32; 3] {
    let (major, minor, patch) = protocol::DEFAULT_VERSION;
    [major, minor, patch]
}

fn default_keepalive_interval_secs() -> u64 {
    net::KEEPALIVE_INTERVAL_SECS
}

fn default_reconnect_backoff_secs() -> u64 {
    net::RECONNECT_BACKOFF_SECS
}

fn default_recv_buffer_size() -> usize {
    net::RECV_BUFFER_SIZE
}

fn default_poll_interval_secs() -> u64 {
    net::POLL_INTERVAL_SECS
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_liveness_check_secs() -> u64 {
    supervisor::LIVENESS_CHECK_SECS
}

fn default_shutdown_timeout_secs() -> u64 {
    supervisor::SHUTDOWN_TIMEOUT_SECS
}

impl Config {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load `path`, or write the defaults there and use them if it does not exist
    pub fn load_or_create(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref();
        if path.exists() {
            let config = Self::load_from_file(path)?;
            config.validate()?;
            return Ok(config);
        }

        let config = Self::default();
        config.save_to_file(path)?;
        tracing::info!("📝 Wrote default config to {}", path.display());
        Ok(config)
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), AppError> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), AppError> {
        let url = &self.node.http_base_url;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(AppError::Config(format!(
                "node.http_base_url must start with http:// or https://, got '{}'",
                url
            )));
        }
        self.proxy_listen_addr()?;

        let intervals = [
            ("node.request_timeout_secs", self.node.request_timeout_secs),
            (
                "session.keepalive_interval_secs",
                self.session.keepalive_interval_secs,
            ),
            (
                "session.reconnect_backoff_secs",
                self.session.reconnect_backoff_secs,
            ),
            ("poller.interval_secs", self.poller.interval_secs),
            (
                "supervisor.liveness_check_secs",
                self.supervisor.liveness_check_secs,
            ),
        ];
        for (name, value) in intervals {
            if value == 0 {
                return Err(AppError::Config(format!("{} must be greater than 0", name)));
            }
        }
        if self.session.recv_buffer_size == 0 {
            return Err(AppError::Config(
                "session.recv_buffer_size must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn network_type(&self) -> NetworkType {
        NetworkType::from_testnet_flag(self.network.testnet)
    }

    /// `host:port` of the node's P2P listener
    pub fn p2p_address(&self) -> String {
        let port = self
            .node
            .p2p_port
            .unwrap_or_else(|| self.network_type().default_p2p_port());
        format!("{}:{}", self.node.p2p_host, port)
    }

    pub fn proxy_listen_addr(&self) -> Result<SocketAddr, AppError> {
        self.proxy.listen_address.parse().map_err(|e| {
            AppError::Config(format!(
                "proxy.listen_address '{}' is not a socket address: {}",
                self.proxy.listen_address, e
            ))
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.node.request_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poller.interval_secs)
    }

    pub fn session_config(&self) -> SessionConfig {
        let [major, minor, patch] = self.session.version;
        SessionConfig {
            peer_addr: self.p2p_address(),
            network: self.network_type(),
            node_name: self.session.node_name.clone(),
            version: (major, minor, patch),
            keepalive_interval: Duration::from_secs(self.session.keepalive_interval_secs),
            reconnect_backoff: Duration::from_secs(self.session.reconnect_backoff_secs),
            recv_buffer_size: self.session.recv_buffer_size,
            verify_checksums: self.session.verify_checksums,
        }
    }
}
