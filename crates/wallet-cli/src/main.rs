//! minibtc - single-key Bitcoin wallet over an Electrum server.
//!
//! Without an action it prints the wallet address, UTXO count and confirmed
//! balance followed by usage, and exits with status 1.

mod logging;

use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use bitcoin::{Amount, Denomination};
use clap::{CommandFactory, Parser, ValueEnum};
use secrecy::SecretString;
use tracing::debug;
use wallet_core::{AddressFormat, BtcNetwork, ServerConfig, TlsMode, Wallet, WalletConfig};

#[derive(Parser, Debug)]
#[command(name = "minibtc")]
#[command(about = "Minimal Bitcoin wallet: balance, UTXOs, send and sweep via Electrum")]
#[command(version)]
struct Args {
    /// Private key, 64 hex characters or WIF
    #[arg(long, env = "MINIBTC_PRIVATE_KEY", hide_env_values = true)]
    private_key: String,

    /// Bitcoin network
    #[arg(long, default_value = "testnet")]
    network: BtcNetwork,

    /// Address format of the wallet
    #[arg(long, default_value = "segwit")]
    format: AddressFormat,

    /// Electrum server as host:port, optionally prefixed with ssl:// or tcp://
    #[arg(long)]
    server: Option<ServerConfig>,

    /// How to secure the server connection
    #[arg(long, value_enum)]
    tls: Option<TlsArg>,

    /// Fee rate in sat/byte
    #[arg(long)]
    fee_rate: Option<u64>,

    /// Connect/read/write timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Send AMOUNT_BTC to ADDRESS, change back to the wallet
    #[arg(long, num_args = 2, value_names = ["ADDRESS", "AMOUNT_BTC"], conflicts_with_all = ["send_all", "utxos"])]
    send: Option<Vec<String>>,

    /// Send every UTXO to ADDRESS
    #[arg(long, value_name = "ADDRESS", conflicts_with = "utxos")]
    send_all: Option<String>,

    /// Print the unspent outputs as JSON
    #[arg(long)]
    utxos: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TlsArg {
    Verified,
    AcceptInvalidCerts,
    Plaintext,
}

impl From<TlsArg> for TlsMode {
    fn from(arg: TlsArg) -> Self {
        match arg {
            TlsArg::Verified => TlsMode::Verified,
            TlsArg::AcceptInvalidCerts => TlsMode::AcceptInvalidCerts,
            TlsArg::Plaintext => TlsMode::Plaintext,
        }
    }
}

enum Action {
    Summary,
    Send { to: String, amount: Amount },
    SendAll { to: String },
    Utxos,
}

impl Args {
    fn config(&self) -> WalletConfig {
        let mut config =
            WalletConfig::for_network(self.network).with_address_format(self.format);
        if let Some(server) = &self.server {
            config = config.with_server(server.clone());
        }
        if let Some(tls) = self.tls {
            config.server = config.server.with_tls(tls.into());
        }
        if let Some(secs) = self.timeout {
            config.server = config.server.with_timeout(Duration::from_secs(secs));
        }
        if let Some(rate) = self.fee_rate {
            config.spend = config.spend.with_fee_rate(rate);
        }
        config
    }

    fn action(&self) -> Result<Action> {
        if let Some(send) = &self.send {
            let [to, amount] = send.as_slice() else {
                anyhow::bail!("--send takes an address and an amount");
            };
            let amount = Amount::from_str_in(amount, Denomination::Bitcoin)
                .with_context(|| format!("invalid BTC amount {amount:?}"))?;
            return Ok(Action::Send {
                to: to.clone(),
                amount,
            });
        }
        if let Some(to) = &self.send_all {
            return Ok(Action::SendAll { to: to.clone() });
        }
        if self.utxos {
            return Ok(Action::Utxos);
        }
        Ok(Action::Summary)
    }
}

fn main() -> Result<ExitCode> {
    logging::init_logging();

    let mut args = Args::parse();
    let private_key = SecretString::from(std::mem::take(&mut args.private_key));
    let action = args.action()?;
    let config = args.config();
    debug!(server = %config.server, network = %config.network, "starting");

    let mut wallet = Wallet::new(&private_key, config).context("failed to load private key")?;
    wallet
        .connect()
        .with_context(|| format!("failed to connect to {}", wallet.config().server))?;

    let status = run(&mut wallet, action)?;
    wallet.disconnect();
    Ok(status)
}

fn run(wallet: &mut Wallet, action: Action) -> Result<ExitCode> {
    match action {
        Action::Send { to, amount } => {
            let txid = wallet.send_bitcoin(&to, amount, None).context("send failed")?;
            println!("{txid}");
        }
        Action::SendAll { to } => {
            let txid = wallet.send_all_bitcoin(&to, None).context("sweep failed")?;
            println!("{txid}");
        }
        Action::Utxos => {
            let utxos = wallet.get_utxos()?;
            println!("{}", serde_json::to_string_pretty(&utxos)?);
        }
        Action::Summary => {
            let utxos = wallet.get_utxos()?;
            let balance = wallet.get_balance()?;
            println!("Address: {}", wallet.get_address());
            println!("UTXOs:   {}", utxos.len());
            println!("Balance: {balance:.8} BTC");
            println!();
            Args::command().print_help()?;
            return Ok(ExitCode::FAILURE);
        }
    }
    Ok(ExitCode::SUCCESS)
}
