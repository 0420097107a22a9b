use btc_primitives::transaction::SpendPolicy;
use btc_primitives::{AddressFormat, BtcNetwork};
use electrum_client::ServerConfig;
use serde::{Deserialize, Serialize};

/// Everything a [`crate::Wallet`] needs besides its private key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    pub network: BtcNetwork,
    pub address_format: AddressFormat,
    pub server: ServerConfig,
    pub spend: SpendPolicy,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self::for_network(BtcNetwork::default())
    }
}

impl WalletConfig {
    /// Segwit wallet on `network` using that network's default server.
    pub fn for_network(network: BtcNetwork) -> Self {
        let (host, port) = network.default_electrum_server();
        Self {
            network,
            address_format: AddressFormat::default(),
            server: ServerConfig::new(host, port),
            spend: SpendPolicy::default(),
        }
    }

    pub fn with_address_format(mut self, format: AddressFormat) -> Self {
        self.address_format = format;
        self
    }

    pub fn with_server(mut self, server: ServerConfig) -> Self {
        self.server = server;
        self
    }

    pub fn with_spend_policy(mut self, spend: SpendPolicy) -> Self {
        self.spend = spend;
        self
    }
}
