use bitcoin::secp256k1::{PublicKey, Secp256k1, SecretKey};
use bitcoin::{CompressedPublicKey, NetworkKind, PrivateKey};
use zeroize::Zeroizing;

use crate::address::hash160;
use crate::error::BtcError;
use crate::network::BtcNetwork;

/// A single secp256k1 signing key with its compressed public key.
///
/// Public keys are always serialized compressed, matching what Electrum and
/// every modern wallet expect for both P2WPKH and P2PKH.
#[derive(Clone)]
pub struct WalletKey {
    secret: SecretKey,
    public: PublicKey,
}

impl WalletKey {
    /// Import a private key given as 64 hex characters or as WIF.
    ///
    /// A WIF key must be encoded for `network` and flagged compressed; an
    /// uncompressed WIF would map to a different address than its owner uses.
    /// The intermediate decoded bytes are zeroed on drop.
    pub fn import(encoded: &str, network: BtcNetwork) -> Result<Self, BtcError> {
        let encoded = encoded.trim();
        if encoded.len() == 64 && encoded.bytes().all(|b| b.is_ascii_hexdigit()) {
            let bytes = Zeroizing::new(
                hex::decode(encoded)
                    .map_err(|e| BtcError::InvalidPrivateKey(format!("invalid hex: {e}")))?,
            );
            return Self::from_slice(&bytes);
        }

        let wif = PrivateKey::from_wif(encoded)
            .map_err(|e| BtcError::InvalidPrivateKey(format!("neither hex nor WIF: {e}")))?;
        if wif.network != NetworkKind::from(network.to_bitcoin_network()) {
            return Err(BtcError::InvalidPrivateKey(format!(
                "WIF key is not encoded for {network}"
            )));
        }
        if !wif.compressed {
            return Err(BtcError::InvalidPrivateKey(
                "uncompressed WIF keys are not supported".into(),
            ));
        }
        Ok(Self::from_secret(wif.inner))
    }

    /// Build a key from a raw 32-byte scalar.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, BtcError> {
        let secret = SecretKey::from_slice(bytes)
            .map_err(|e| BtcError::InvalidPrivateKey(format!("invalid secret key: {e}")))?;
        Ok(Self::from_secret(secret))
    }

    fn from_secret(secret: SecretKey) -> Self {
        let secp = Secp256k1::signing_only();
        let public = PublicKey::from_secret_key(&secp, &secret);
        Self { secret, public }
    }

    pub fn secret_key(&self) -> &SecretKey {
        &self.secret
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    pub fn compressed_public_key(&self) -> CompressedPublicKey {
        CompressedPublicKey(self.public)
    }

    /// 33-byte compressed SEC1 encoding.
    pub fn public_key_bytes(&self) -> [u8; 33] {
        self.public.serialize()
    }

    /// hash160 of the compressed public key.
    pub fn pubkey_hash(&self) -> [u8; 20] {
        hash160(&self.public.serialize())
    }

    /// Export as compressed WIF for `network`.
    pub fn to_wif(&self, network: BtcNetwork) -> Zeroizing<String> {
        Zeroizing::new(PrivateKey::new(self.secret, network.to_bitcoin_network()).to_wif())
    }
}

impl std::fmt::Debug for WalletKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletKey")
            .field("public", &hex::encode(self.public.serialize()))
            .finish_non_exhaustive()
    }
}
