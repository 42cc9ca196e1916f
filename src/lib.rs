//! Caching proxy for a Waves node's HTTP API.
//!
//! Responses are cached in memory and invalidated per address as soon as a
//! transfer touching that address is seen, either on the node's P2P stream
//! or through the block poller.

pub mod address;
pub mod blocks;
pub mod cache;
pub mod config;
pub mod constants;
pub mod error;
pub mod network;
pub mod network_type;
pub mod node;
pub mod observer;
pub mod proxy;
pub mod supervisor;

pub use network_type::NetworkType;
