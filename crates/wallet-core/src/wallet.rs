use bitcoin::{Address, Amount};
use btc_primitives::address::parse_address;
use btc_primitives::transaction::{build_and_sign, plan_payment, plan_sweep, SignedBtcTx, SpendPolicy, TxPlan};
use btc_primitives::utxo::Utxo;
use electrum_client::{Balance, ElectrumClient, ElectrumStream, UnspentOutput};
use secrecy::SecretString;
use tracing::{debug, info, warn};

use crate::config::WalletConfig;
use crate::error::WalletError;
use crate::identity::WalletIdentity;

/// Single-key wallet backed by one Electrum server connection.
///
/// Starts disconnected. Every query and send requires [`Wallet::connect`]
/// (or [`Wallet::attach`]) first and fails with [`WalletError::NotConnected`]
/// otherwise.
pub struct Wallet {
    identity: WalletIdentity,
    config: WalletConfig,
    client: ElectrumClient,
}

impl Wallet {
    pub fn new(private_key: &SecretString, config: WalletConfig) -> Result<Self, WalletError> {
        let identity =
            WalletIdentity::from_private_key(private_key, config.network, config.address_format)?;
        info!(
            network = %config.network,
            format = %config.address_format,
            address = %identity.address(),
            "wallet loaded"
        );
        Ok(Self {
            identity,
            config,
            client: ElectrumClient::new(),
        })
    }

    pub fn from_identity(identity: WalletIdentity, config: WalletConfig) -> Self {
        Self {
            identity,
            config,
            client: ElectrumClient::new(),
        }
    }

    /// Connect to the configured server, replacing any open connection.
    pub fn connect(&mut self) -> Result<(), WalletError> {
        self.client.connect(&self.config.server)?;
        Ok(())
    }

    /// Use an already-open stream as the server connection.
    pub fn attach(&mut self, stream: Box<dyn ElectrumStream>) {
        self.client.attach(stream);
    }

    pub fn disconnect(&mut self) {
        self.client.disconnect();
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    pub fn identity(&self) -> &WalletIdentity {
        &self.identity
    }

    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    pub fn get_address(&self) -> String {
        self.identity.address().to_string()
    }

    /// Confirmed and unconfirmed balance in satoshis.
    pub fn balance(&mut self) -> Result<Balance, WalletError> {
        self.ensure_connected()?;
        let scripthash = self.identity.scripthash().to_hex();
        let balance = self.client.get_balance(&scripthash)?;
        debug!(
            confirmed = balance.confirmed,
            unconfirmed = balance.unconfirmed,
            "balance"
        );
        Ok(balance)
    }

    /// Confirmed balance in BTC.
    pub fn get_balance(&mut self) -> Result<f64, WalletError> {
        let balance = self.balance()?;
        Ok(Amount::from_sat(balance.confirmed).to_btc())
    }

    /// Unspent outputs of the wallet address, in server order.
    pub fn get_utxos(&mut self) -> Result<Vec<UnspentOutput>, WalletError> {
        self.ensure_connected()?;
        let scripthash = self.identity.scripthash().to_hex();
        let utxos = self.client.list_unspent(&scripthash)?;
        debug!(count = utxos.len(), "listunspent");
        Ok(utxos)
    }

    /// Pay `amount` to `to_address`, returning change to the wallet address.
    ///
    /// `fee_rate` is in sat/vbyte; `None` uses the configured spend policy.
    /// Returns the txid reported by the server.
    pub fn send_bitcoin(
        &mut self,
        to_address: &str,
        amount: Amount,
        fee_rate: Option<u64>,
    ) -> Result<String, WalletError> {
        self.ensure_connected()?;
        let recipient = parse_address(to_address, self.config.network)?;
        let policy = self.policy(fee_rate);

        let utxos = self.spendable()?;
        let plan = plan_payment(
            &utxos,
            &recipient,
            amount.to_sat(),
            self.identity.address(),
            &policy,
        )?;
        self.sign_and_broadcast(&plan, &recipient)
    }

    /// Sweep every UTXO to `to_address` in a single output.
    pub fn send_all_bitcoin(
        &mut self,
        to_address: &str,
        fee_rate: Option<u64>,
    ) -> Result<String, WalletError> {
        self.ensure_connected()?;
        let recipient = parse_address(to_address, self.config.network)?;
        let policy = self.policy(fee_rate);

        let utxos = self.spendable()?;
        let plan = plan_sweep(&utxos, &recipient, &policy)?;
        self.sign_and_broadcast(&plan, &recipient)
    }

    fn ensure_connected(&self) -> Result<(), WalletError> {
        if self.client.is_connected() {
            Ok(())
        } else {
            Err(WalletError::NotConnected)
        }
    }

    fn policy(&self, fee_rate: Option<u64>) -> SpendPolicy {
        match fee_rate {
            Some(rate) => self.config.spend.with_fee_rate(rate),
            None => self.config.spend,
        }
    }

    fn spendable(&mut self) -> Result<Vec<Utxo>, WalletError> {
        Ok(self.get_utxos()?.into_iter().map(to_utxo).collect())
    }

    fn sign_and_broadcast(&mut self, plan: &TxPlan, recipient: &Address) -> Result<String, WalletError> {
        let signed: SignedBtcTx = build_and_sign(
            plan,
            self.identity.key(),
            self.identity.address(),
            self.identity.format(),
        )?;
        info!(
            to = %recipient,
            inputs = plan.inputs.len(),
            outputs = ?plan.output_values(),
            fee_sat = plan.fee_sat,
            txid = %signed.txid,
            "broadcasting transaction"
        );

        let txid = self.client.broadcast(&signed.raw_hex)?;
        if txid != signed.txid.to_string() {
            warn!(local = %signed.txid, server = %txid, "server reported a different txid");
        }
        Ok(txid)
    }
}

fn to_utxo(output: UnspentOutput) -> Utxo {
    Utxo {
        txid: output.tx_hash,
        vout: output.tx_pos,
        amount_sat: output.value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use btc_primitives::{AddressFormat, BtcNetwork};

    fn wallet() -> Wallet {
        let key = SecretString::from("0000000000000000000000000000000000000000000000000000000000000001");
        Wallet::new(&key, WalletConfig::for_network(BtcNetwork::Mainnet)).unwrap()
    }

    #[test]
    fn new_wallet_is_disconnected() {
        let w = wallet();
        assert!(!w.is_connected());
        assert_eq!(w.get_address(), "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4");
    }

    #[test]
    fn queries_require_connection() {
        let mut w = wallet();
        assert!(matches!(w.balance(), Err(WalletError::NotConnected)));
        assert!(matches!(w.get_balance(), Err(WalletError::NotConnected)));
        assert!(matches!(w.get_utxos(), Err(WalletError::NotConnected)));
    }

    #[test]
    fn sends_require_connection() {
        let mut w = wallet();
        let to = "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4";
        assert!(matches!(
            w.send_bitcoin(to, Amount::from_sat(1000), None),
            Err(WalletError::NotConnected)
        ));
        assert!(matches!(
            w.send_all_bitcoin(to, Some(1)),
            Err(WalletError::NotConnected)
        ));
    }

    #[test]
    fn fee_rate_override() {
        let w = wallet();
        assert_eq!(w.policy(Some(3)).fee_rate_sat_per_byte, 3);
        assert_eq!(w.policy(None), w.config.spend);
    }

    #[test]
    fn legacy_wallet_address() {
        let key = SecretString::from("0000000000000000000000000000000000000000000000000000000000000001");
        let cfg = WalletConfig::for_network(BtcNetwork::Mainnet).with_address_format(AddressFormat::Legacy);
        let w = Wallet::new(&key, cfg).unwrap();
        assert_eq!(w.get_address(), "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH");
    }

    #[test]
    fn unspent_output_maps_to_utxo() {
        let utxo = to_utxo(UnspentOutput {
            tx_hash: "ab".repeat(32),
            tx_pos: 3,
            value: 1234,
            height: 100,
        });
        assert_eq!(utxo.vout, 3);
        assert_eq!(utxo.amount_sat, 1234);
    }
}
