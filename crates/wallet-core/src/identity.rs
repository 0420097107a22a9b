use bitcoin::Address;
use btc_primitives::address::{address_to_scripthash, derive_address};
use btc_primitives::{AddressFormat, BtcNetwork, ScriptHash, WalletKey};
use secrecy::{ExposeSecret, SecretString};

use crate::error::WalletError;

/// A private key and the one address it is used through.
///
/// Address and scripthash are derived once at construction and never change.
#[derive(Debug, Clone)]
pub struct WalletIdentity {
    key: WalletKey,
    network: BtcNetwork,
    format: AddressFormat,
    pubkey_hash: [u8; 20],
    address: Address,
    scripthash: ScriptHash,
}

impl WalletIdentity {
    pub fn new(key: WalletKey, network: BtcNetwork, format: AddressFormat) -> Result<Self, WalletError> {
        let pubkey_hash = key.pubkey_hash();
        let address = derive_address(&pubkey_hash, network, format)?;
        let scripthash = address_to_scripthash(&address.to_string(), network)?;
        Ok(Self {
            key,
            network,
            format,
            pubkey_hash,
            address,
            scripthash,
        })
    }

    /// Import a hex or WIF private key.
    pub fn from_private_key(
        private_key: &SecretString,
        network: BtcNetwork,
        format: AddressFormat,
    ) -> Result<Self, WalletError> {
        let key = WalletKey::import(private_key.expose_secret(), network)?;
        Self::new(key, network, format)
    }

    pub fn key(&self) -> &WalletKey {
        &self.key
    }

    pub fn network(&self) -> BtcNetwork {
        self.network
    }

    pub fn format(&self) -> AddressFormat {
        self.format
    }

    pub fn pubkey_hash(&self) -> &[u8; 20] {
        &self.pubkey_hash
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn scripthash(&self) -> &ScriptHash {
        &self.scripthash
    }
}
