//! Minimal blocking Electrum protocol client.
//!
//! Newline-delimited JSON-RPC 2.0 over one persistent TCP or TLS socket, with
//! just the scripthash balance/listunspent and transaction broadcast methods a
//! single-key wallet needs.

pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod transport;

pub use client::ElectrumClient;
pub use config::{ServerConfig, TlsMode};
pub use error::ElectrumError;
pub use protocol::{Balance, UnspentOutput};
pub use transport::ElectrumStream;
