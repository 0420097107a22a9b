use std::fmt;
use std::str::FromStr;

use bitcoin::address::{Address, AddressType, NetworkUnchecked};
use bitcoin::hashes::Hash;
use bitcoin::script::Script;
use bitcoin::{PubkeyHash, WitnessProgram, WitnessVersion};
use ripemd::Ripemd160;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::BtcError;
use crate::network::BtcNetwork;

/// The two single-key address formats a wallet can be configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFormat {
    /// Native SegWit v0 P2WPKH, bech32 encoded (`bc1q...` / `tb1q...`).
    #[default]
    Segwit,
    /// P2PKH, base58check encoded (`1...` / `m...`, `n...`).
    Legacy,
}

impl AddressFormat {
    /// Classify a parsed address, returning `None` for script types this
    /// wallet does not own (P2SH, P2WSH, P2TR, ...).
    pub fn of(address: &Address) -> Option<Self> {
        match address.address_type() {
            Some(AddressType::P2wpkh) => Some(AddressFormat::Segwit),
            Some(AddressType::P2pkh) => Some(AddressFormat::Legacy),
            _ => None,
        }
    }
}

impl fmt::Display for AddressFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressFormat::Segwit => write!(f, "segwit"),
            AddressFormat::Legacy => write!(f, "legacy"),
        }
    }
}

impl FromStr for AddressFormat {
    type Err = BtcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "segwit" | "bech32" | "p2wpkh" => Ok(AddressFormat::Segwit),
            "legacy" | "base58" | "p2pkh" => Ok(AddressFormat::Legacy),
            other => Err(BtcError::Encoding(format!("unknown address format: {other}"))),
        }
    }
}

/// Electrum scripthash: the byte-reversed SHA-256 of an output script.
///
/// This is the key the server indexes balances and UTXOs by, so it must match
/// the server's computation byte for byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScriptHash([u8; 32]);

impl ScriptHash {
    /// Raw bytes in Electrum (reversed) order.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex, as sent in `blockchain.scripthash.*` params.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ScriptHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// RIPEMD-160(SHA-256(data)), the public key hash committed to by P2PKH and
/// P2WPKH outputs.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let sha = Sha256::digest(data);
    Ripemd160::digest(sha).into()
}

/// Encode a 20-byte public key hash as an address of the given format.
///
/// Fails with [`BtcError::Encoding`] if `pubkey_hash` is not exactly 20 bytes.
pub fn derive_address(
    pubkey_hash: &[u8],
    network: BtcNetwork,
    format: AddressFormat,
) -> Result<Address, BtcError> {
    let hash: [u8; 20] = pubkey_hash.try_into().map_err(|_| {
        BtcError::Encoding(format!(
            "public key hash must be 20 bytes, got {}",
            pubkey_hash.len()
        ))
    })?;
    let net = network.to_bitcoin_network();

    match format {
        AddressFormat::Segwit => {
            let program = WitnessProgram::new(WitnessVersion::V0, &hash)
                .map_err(|e| BtcError::Encoding(format!("witness program: {e}")))?;
            Ok(Address::from_witness_program(program, net))
        }
        AddressFormat::Legacy => Ok(Address::p2pkh(PubkeyHash::from_byte_array(hash), net)),
    }
}

/// Parse an address string and require it to belong to `network`.
///
/// Any standard address type is accepted; this is what payment recipients go
/// through.
pub fn parse_address(address: &str, network: BtcNetwork) -> Result<Address, BtcError> {
    address
        .parse::<Address<NetworkUnchecked>>()
        .map_err(|e| BtcError::InvalidAddress(format!("failed to parse {address}: {e}")))?
        .require_network(network.to_bitcoin_network())
        .map_err(|e| BtcError::InvalidAddress(format!("{address} is not a {network} address: {e}")))
}

/// Compute the Electrum scripthash of an arbitrary output script.
pub fn script_to_scripthash(script: &Script) -> ScriptHash {
    let mut digest: [u8; 32] = Sha256::digest(script.as_bytes()).into();
    digest.reverse();
    ScriptHash(digest)
}

/// Convert a P2WPKH or P2PKH address into its Electrum scripthash.
///
/// The output script is rebuilt from the address (`OP_0 <20>` for P2WPKH,
/// `OP_DUP OP_HASH160 <20> OP_EQUALVERIFY OP_CHECKSIG` for P2PKH) and hashed.
/// Fails with [`BtcError::InvalidAddress`] on a bad checksum, a prefix for the
/// wrong network, or an unsupported address type.
pub fn address_to_scripthash(address: &str, network: BtcNetwork) -> Result<ScriptHash, BtcError> {
    let parsed = parse_address(address, network)?;
    if AddressFormat::of(&parsed).is_none() {
        return Err(BtcError::InvalidAddress(format!(
            "{address}: only P2WPKH and P2PKH addresses are supported"
        )));
    }
    Ok(script_to_scripthash(&parsed.script_pubkey()))
}
