use btc_primitives::BtcError;
use electrum_client::ElectrumError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("Not connected to Electrum server")]
    NotConnected,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Bitcoin(#[from] BtcError),

    #[error(transparent)]
    Electrum(ElectrumError),
}

impl From<ElectrumError> for WalletError {
    fn from(e: ElectrumError) -> Self {
        match e {
            ElectrumError::NotConnected => WalletError::NotConnected,
            ElectrumError::InvalidServer(msg) => WalletError::Config(msg),
            other => WalletError::Electrum(other),
        }
    }
}
