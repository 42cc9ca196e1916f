use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum NetworkType {
    Mainnet,
    Testnet,
}

impl NetworkType {
    pub fn from_testnet_flag(testnet: bool) -> Self {
        if testnet {
            NetworkType::Testnet
        } else {
            NetworkType::Mainnet
        }
    }

    /// Six-byte application name sent in the handshake
    pub fn chain_name(&self) -> &'static [u8; 6] {
        match self {
            NetworkType::Mainnet => b"wavesW",
            NetworkType::Testnet => b"wavesT",
        }
    }

    pub fn from_chain_name(name: &[u8]) -> Option<Self> {
        match name {
            b"wavesW" => Some(NetworkType::Mainnet),
            b"wavesT" => Some(NetworkType::Testnet),
            _ => None,
        }
    }

    /// Chain id byte embedded in addresses
    pub fn chain_id(&self) -> u8 {
        match self {
            NetworkType::Mainnet => b'W',
            NetworkType::Testnet => b'T',
        }
    }

    pub fn default_p2p_port(&self) -> u16 {
        match self {
            NetworkType::Mainnet => 6868,
            NetworkType::Testnet => 6863,
        }
    }

    pub fn is_testnet(&self) -> bool {
        matches!(self, NetworkType::Testnet)
    }
}

impl std::fmt::Display for NetworkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkType::Mainnet => write!(f, "Mainnet"),
            NetworkType::Testnet => write!(f, "Testnet"),
        }
    }
}
