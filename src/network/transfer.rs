//! Transfer transaction payloads carried in TX frames.
//!
//! Layout of a version-1 transfer as relayed over P2P:
//!
//! | field              | size                          |
//! |--------------------|-------------------------------|
//! | type (4)           | 1                             |
//! | signature          | 64                            |
//! | type (4)           | 1                             |
//! | sender public key  | 32                            |
//! | asset flag         | 1 (+32 asset id if nonzero)   |
//! | fee asset flag     | 1 (+32 asset id if nonzero)   |
//! | timestamp          | 8                             |
//! | amount             | 8                             |
//! | fee                | 8                             |
//! | recipient          | 26, or 4 + alias length       |
//! | attachment length  | 2                             |
//! | attachment         | attachment length             |

use crate::address::{blake2b256, Address, Recipient};
use crate::constants::protocol::{ADDRESS_LEN, RECIPIENT_ADDRESS, TRANSFER_TX_TYPE};
use crate::error::DecodeError;
use crate::network_type::NetworkType;
use std::fmt;

const SIGNATURE_LEN: usize = 64;
const PUBKEY_LEN: usize = 32;
const ASSET_ID_LEN: usize = 32;

/// type + signature + type + public key + asset flag
pub const FIXED_PREFIX_LEN: usize = 1 + SIGNATURE_LEN + 1 + PUBKEY_LEN + 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferTransaction {
    pub tx_type: u8,
    pub signature: [u8; SIGNATURE_LEN],
    pub sender_public_key: [u8; PUBKEY_LEN],
    pub asset_id: Option<[u8; ASSET_ID_LEN]>,
    pub fee_asset_id: Option<[u8; ASSET_ID_LEN]>,
    pub timestamp: u64,
    pub amount: u64,
    pub fee: u64,
    pub recipient: Recipient,
    pub attachment: Vec<u8>,
}

impl TransferTransaction {
    pub fn sender_address(&self, network: NetworkType) -> Address {
        Address::from_public_key(&self.sender_public_key, network)
    }

    /// P2P wire layout, the inverse of [`decode_transfer`]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(FIXED_PREFIX_LEN + 128 + self.attachment.len());
        out.push(self.tx_type);
        out.extend_from_slice(&self.signature);
        out.extend_from_slice(&self.body_bytes());
        out
    }

    /// Canonical bytes the transaction id is hashed from
    pub fn body_bytes(&self) -> Vec<u8> {
        let recipient = self.recipient.to_wire();
        let mut out = Vec::with_capacity(
            1 + PUBKEY_LEN + 2 + 2 * ASSET_ID_LEN + 24 + recipient.len() + 2 + self.attachment.len(),
        );
        out.push(TRANSFER_TX_TYPE);
        out.extend_from_slice(&self.sender_public_key);
        push_optional_asset(&mut out, self.asset_id.as_ref());
        push_optional_asset(&mut out, self.fee_asset_id.as_ref());
        out.extend_from_slice(&self.timestamp.to_be_bytes());
        out.extend_from_slice(&self.amount.to_be_bytes());
        out.extend_from_slice(&self.fee.to_be_bytes());
        out.extend_from_slice(&recipient);
        out.extend_from_slice(&(self.attachment.len() as u16).to_be_bytes());
        out.extend_from_slice(&self.attachment);
        out
    }
}

fn push_optional_asset(out: &mut Vec<u8>, asset: Option<&[u8; ASSET_ID_LEN]>) {
    match asset {
        Some(id) => {
            out.push(1);
            out.extend_from_slice(id);
        }
        None => out.push(0),
    }
}

/// Base58 transaction id
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransactionId(String);

impl TransactionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// blake2b-256 of the canonical body, base58 encoded
pub fn compute_txid(tx: &TransferTransaction) -> TransactionId {
    TransactionId(bs58::encode(blake2b256(&tx.body_bytes())).into_string())
}

fn ensure(payload: &[u8], stage: &'static str, needed: usize) -> Result<(), DecodeError> {
    if payload.len() < needed {
        return Err(DecodeError::PayloadTooShort {
            stage,
            needed,
            available: payload.len(),
            buffer: payload.to_vec(),
        });
    }
    Ok(())
}

fn read_u16(payload: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([payload[at], payload[at + 1]])
}

fn read_u64(payload: &[u8], at: usize) -> u64 {
    let mut out = [0u8; 8];
    out.copy_from_slice(&payload[at..at + 8]);
    u64::from_be_bytes(out)
}

fn read_array<const N: usize>(payload: &[u8], at: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&payload[at..at + N]);
    out
}

/// Size of the recipient starting at `offset`.
///
/// Type byte 1 is a 26-byte address. Anything else is an alias whose u16
/// length sits at `offset + 2`, after the type and chain id bytes; the
/// total adds those 4 header bytes.
pub fn recipient_len(payload: &[u8], offset: usize) -> Result<usize, DecodeError> {
    ensure(payload, "recipient type", offset + 1)?;
    if payload[offset] == RECIPIENT_ADDRESS {
        return Ok(ADDRESS_LEN);
    }
    ensure(payload, "alias length", offset + 4)?;
    Ok(4 + read_u16(payload, offset + 2) as usize)
}

pub fn decode_transfer(payload: &[u8]) -> Result<TransferTransaction, DecodeError> {
    ensure(payload, "fixed prefix", FIXED_PREFIX_LEN)?;

    let tx_type = payload[0];
    if tx_type != TRANSFER_TX_TYPE {
        return Err(DecodeError::UnexpectedType(tx_type));
    }
    let signature = read_array::<SIGNATURE_LEN>(payload, 1);
    let inner_type = payload[1 + SIGNATURE_LEN];
    if inner_type != TRANSFER_TX_TYPE {
        return Err(DecodeError::UnexpectedType(inner_type));
    }
    let sender_public_key = read_array::<PUBKEY_LEN>(payload, 2 + SIGNATURE_LEN);
    let asset_flag = payload[FIXED_PREFIX_LEN - 1];
    let mut offset = FIXED_PREFIX_LEN;

    let asset_id = if asset_flag != 0 {
        ensure(payload, "asset id", offset + ASSET_ID_LEN)?;
        let id = read_array::<ASSET_ID_LEN>(payload, offset);
        offset += ASSET_ID_LEN;
        Some(id)
    } else {
        None
    };

    ensure(payload, "fee asset flag", offset + 1)?;
    let fee_asset_flag = payload[offset];
    offset += 1;
    let fee_asset_id = if fee_asset_flag != 0 {
        ensure(payload, "fee asset id", offset + ASSET_ID_LEN)?;
        let id = read_array::<ASSET_ID_LEN>(payload, offset);
        offset += ASSET_ID_LEN;
        Some(id)
    } else {
        None
    };

    ensure(payload, "timestamp, amount and fee", offset + 24)?;
    let timestamp = read_u64(payload, offset);
    let amount = read_u64(payload, offset + 8);
    let fee = read_u64(payload, offset + 16);
    offset += 24;

    let recipient_size = recipient_len(payload, offset)?;
    ensure(payload, "recipient and attachment length", offset + recipient_size + 2)?;
    let recipient = Recipient::from_wire(&payload[offset..offset + recipient_size]);
    offset += recipient_size;

    let attachment_len = read_u16(payload, offset) as usize;
    offset += 2;
    ensure(payload, "attachment", offset + attachment_len)?;
    let attachment = payload[offset..offset + attachment_len].to_vec();

    Ok(TransferTransaction {
        tx_type,
        signature,
        sender_public_key,
        asset_id,
        fee_asset_id,
        timestamp,
        amount,
        fee,
        recipient,
        attachment,
    })
}
