use std::str::FromStr;

use bitcoin::Network;
use serde::{Deserialize, Serialize};

use crate::error::BtcError;

/// Default Electrum server (TLS) for Bitcoin mainnet.
pub const MAINNET_ELECTRUM: (&str, u16) = ("electrum.blockstream.info", 50002);

/// Default Electrum server (TLS) for Bitcoin testnet.
pub const TESTNET_ELECTRUM: (&str, u16) = ("testnet4-electrumx.wakiyamap.dev", 51002);

/// Supported Bitcoin networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BtcNetwork {
    Mainnet,
    #[default]
    Testnet,
}

impl BtcNetwork {
    /// Convert to the `bitcoin` crate's `Network` type.
    pub fn to_bitcoin_network(self) -> Network {
        match self {
            BtcNetwork::Mainnet => Network::Bitcoin,
            BtcNetwork::Testnet => Network::Testnet,
        }
    }

    /// Return the default Electrum server `(host, port)` for this network.
    pub fn default_electrum_server(self) -> (&'static str, u16) {
        match self {
            BtcNetwork::Mainnet => MAINNET_ELECTRUM,
            BtcNetwork::Testnet => TESTNET_ELECTRUM,
        }
    }
}

impl std::fmt::Display for BtcNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BtcNetwork::Mainnet => write!(f, "mainnet"),
            BtcNetwork::Testnet => write!(f, "testnet"),
        }
    }
}

impl FromStr for BtcNetwork {
    type Err = BtcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" | "bitcoin" | "main" => Ok(BtcNetwork::Mainnet),
            "testnet" | "test" => Ok(BtcNetwork::Testnet),
            other => Err(BtcError::InvalidNetwork(other.to_string())),
        }
    }
}
