//! Single-key Bitcoin wallet over the Electrum protocol.
//!
//! Ties the primitives in `btc_primitives` to an `electrum_client`
//! connection: address and balance queries, payments with change, and
//! sweeps.

pub mod config;
pub mod error;
pub mod identity;
pub mod wallet;

pub use config::WalletConfig;
pub use error::WalletError;
pub use identity::WalletIdentity;
pub use wallet::Wallet;

pub use btc_primitives::{AddressFormat, BtcNetwork};
pub use electrum_client::{Balance, ServerConfig, TlsMode, UnspentOutput};
