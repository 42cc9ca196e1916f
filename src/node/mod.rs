//! Boundary to the Waves node's HTTP API.
//!
//! `Origin` is the raw request/response surface the proxy forwards to;
//! `NodeApi` is the typed block surface the poller reads.

pub mod client;

use crate::constants::protocol::TRANSFER_TX_TYPE;
use crate::error::OriginError;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

pub use client::NodeClient;

/// Response relayed verbatim from the node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl OriginResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait Origin: Send + Sync {
    /// GET `path` (relative to the node base URL, query string included)
    async fn get(&self, path: &str) -> Result<OriginResponse, OriginError>;

    async fn post(
        &self,
        path: &str,
        body: Bytes,
        content_type: Option<&str>,
    ) -> Result<OriginResponse, OriginError>;
}

#[async_trait]
pub trait NodeApi: Send + Sync {
    /// `GET /blocks/height`
    async fn height(&self) -> Result<u64, OriginError>;

    /// `GET /blocks/at/{height}`
    async fn block_at(&self, height: u64) -> Result<Block, OriginError>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct HeightResponse {
    pub height: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub height: Option<u64>,
    #[serde(default)]
    pub transactions: Vec<BlockTransaction>,
}

/// Any block transaction; only transfers carry sender and recipient
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockTransaction {
    #[serde(rename = "type")]
    pub tx_type: u8,
    pub id: Option<String>,
    pub sender: Option<String>,
    pub asset_id: Option<String>,
    pub timestamp: Option<u64>,
    pub amount: Option<u64>,
    pub fee: Option<u64>,
    pub recipient: Option<String>,
    pub attachment: Option<String>,
}

impl Block {
    /// (sender, recipient) of every transfer in the block
    pub fn transfers(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.transactions
            .iter()
            .filter(|tx| tx.tx_type == TRANSFER_TX_TYPE)
            .filter_map(|tx| Some((tx.sender.as_deref()?, tx.recipient.as_deref()?)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_transfers_skip_other_types() {
        let block: Block = serde_json::from_value(serde_json::json!({
            "signature": "5Zv8JLH8",
            "height": 52,
            "transactions": [
                {"type": 4, "id": "tx1", "sender": "3NA", "assetId": null,
                 "timestamp": 1, "amount": 5, "fee": 100000,
                 "recipient": "3NB", "attachment": ""},
                {"type": 8, "id": "lease", "sender": "3NC", "amount": 10,
                 "recipient": "3ND"},
                {"type": 1, "id": "genesis", "recipient": "3NE", "amount": 1}
            ]
        }))
        .unwrap();

        let transfers: Vec<_> = block.transfers().collect();
        assert_eq!(transfers, vec![("3NA", "3NB")]);
    }

    #[test]
    fn test_block_without_transactions() {
        let block: Block = serde_json::from_str(r#"{"signature": "abc"}"#).unwrap();
        assert_eq!(block.transfers().count(), 0);
    }

    #[test]
    fn test_origin_response_success_range() {
        let mut resp = OriginResponse {
            status: 204,
            content_type: None,
            body: Bytes::new(),
        };
        assert!(resp.is_success());
        resp.status = 404;
        assert!(!resp.is_success());
    }
}
