use thiserror::Error;

/// Bitcoin-side wallet errors: address handling, key import, coin selection
/// and transaction assembly.
#[derive(Debug, Error)]
pub enum BtcError {
    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("insufficient funds: have {available_sat} sat, need {required_sat} sat")]
    InsufficientFunds { available_sat: u64, required_sat: u64 },

    #[error("no UTXOs available")]
    NoUtxos,

    #[error("amount to send is too small (dust): {amount_sat} sat")]
    DustAmount { amount_sat: i64 },

    #[error("transaction build error: {0}")]
    TransactionBuildError(String),

    #[error("signing error: {0}")]
    SigningError(String),

    #[error("invalid network: {0}")]
    InvalidNetwork(String),
}
