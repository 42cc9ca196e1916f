// src/address.rs
use crate::constants::protocol::{ADDRESS_LEN, RECIPIENT_ADDRESS};
use crate::network_type::NetworkType;
use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use sha3::Keccak256;
use std::fmt;

type Blake2b256 = Blake2b<U32>;

/// Length of the public-key hash embedded in an address
const HASH_LEN: usize = 20;
const CHECKSUM_LEN: usize = 4;

pub fn blake2b256(data: &[u8]) -> [u8; 32] {
    Blake2b256::digest(data).into()
}

/// Waves "secure hash": keccak256(blake2b256(data))
pub fn secure_hash(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(blake2b256(data)).into()
}

/// Waves address format:
/// `[version = 1][chain id][20 bytes of secure_hash(pubkey)][4-byte checksum]`
///
/// The checksum is the first 4 bytes of secure_hash over the first 22 bytes.
/// Rendered as base58 (35 chars, `3P...` on mainnet, `3N...` on testnet).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Address {
    bytes: [u8; ADDRESS_LEN],
}

impl Address {
    /// Derive the address of an account from its public key
    pub fn from_public_key(pubkey: &[u8; 32], network: NetworkType) -> Self {
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes[0] = RECIPIENT_ADDRESS;
        bytes[1] = network.chain_id();
        bytes[2..2 + HASH_LEN].copy_from_slice(&secure_hash(pubkey)[..HASH_LEN]);
        let checksum = Self::compute_checksum(&bytes[..2 + HASH_LEN]);
        bytes[2 + HASH_LEN..].copy_from_slice(&checksum);
        Self { bytes }
    }

    /// Wrap 26 raw address bytes as carried on the wire. The checksum is not
    /// checked here; see [`Address::has_valid_checksum`].
    pub fn from_raw(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self { bytes }
    }

    /// Parse a base58 address string, verifying version and checksum
    pub fn from_string(s: &str) -> Result<Self, AddressError> {
        let decoded = bs58::decode(s)
            .into_vec()
            .map_err(|_| AddressError::InvalidBase58)?;

        let bytes: [u8; ADDRESS_LEN] = decoded
            .try_into()
            .map_err(|_| AddressError::InvalidLength)?;

        if bytes[0] != RECIPIENT_ADDRESS {
            return Err(AddressError::InvalidVersion(bytes[0]));
        }

        let address = Self { bytes };
        if !address.has_valid_checksum() {
            return Err(AddressError::InvalidChecksum);
        }
        Ok(address)
    }

    pub fn as_string(&self) -> String {
        bs58::encode(self.bytes).into_string()
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.bytes
    }

    pub fn chain_id(&self) -> u8 {
        self.bytes[1]
    }

    pub fn has_valid_checksum(&self) -> bool {
        Self::compute_checksum(&self.bytes[..2 + HASH_LEN]) == self.bytes[2 + HASH_LEN..]
    }

    fn compute_checksum(data: &[u8]) -> [u8; CHECKSUM_LEN] {
        let hash = secure_hash(data);
        let mut checksum = [0u8; CHECKSUM_LEN];
        checksum.copy_from_slice(&hash[..CHECKSUM_LEN]);
        checksum
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_string())
    }
}

/// Transfer recipient: a plain address or an alias
/// (`[2][chain id][u16 length][alias bytes]` on the wire).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Recipient {
    Address(Address),
    Alias { chain_id: u8, name: Vec<u8> },
}

impl Recipient {
    /// Interpret recipient bytes whose length was already resolved by the decoder
    pub fn from_wire(bytes: &[u8]) -> Self {
        if bytes.first() == Some(&RECIPIENT_ADDRESS) {
            if let Ok(raw) = <[u8; ADDRESS_LEN]>::try_from(bytes) {
                return Recipient::Address(Address::from_raw(raw));
            }
        }
        Recipient::Alias {
            chain_id: bytes.get(1).copied().unwrap_or_default(),
            name: bytes.get(4..).unwrap_or_default().to_vec(),
        }
    }

    /// Bytes exactly as they appear on the wire
    pub fn to_wire(&self) -> Vec<u8> {
        match self {
            Recipient::Address(address) => address.as_bytes().to_vec(),
            Recipient::Alias { chain_id, name } => {
                let mut out = Vec::with_capacity(4 + name.len());
                out.push(2);
                out.push(*chain_id);
                out.extend_from_slice(&(name.len() as u16).to_be_bytes());
                out.extend_from_slice(name);
                out
            }
        }
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recipient::Address(address) => write!(f, "{}", address),
            Recipient::Alias { chain_id, name } => write!(
                f,
                "alias:{}:{}",
                *chain_id as char,
                String::from_utf8_lossy(name)
            ),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("Invalid address length")]
    InvalidLength,
    #[error("Invalid address version {0} (expected 1)")]
    InvalidVersion(u8),
    #[error("Invalid checksum")]
    InvalidChecksum,
    #[error("Invalid base58 character")]
    InvalidBase58,
}
