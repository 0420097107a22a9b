//! Bitcoin primitives for the minimal Electrum wallet.
//!
//! Address derivation for P2WPKH (bech32) and P2PKH (base58check), Electrum
//! scripthash computation, coin selection, fee estimation, and transaction
//! assembly/signing. Nothing in this crate performs I/O.

pub mod address;
pub mod error;
pub mod fee;
pub mod key;
pub mod network;
pub mod transaction;
pub mod utxo;

pub use address::{AddressFormat, ScriptHash};
pub use error::BtcError;
pub use key::WalletKey;
pub use network::BtcNetwork;
