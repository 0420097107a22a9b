use bitcoin::absolute::LockTime;
use bitcoin::address::Address;
use bitcoin::consensus::encode::serialize_hex;
use bitcoin::hashes::Hash;
use bitcoin::script::{PushBytesBuf, Script, ScriptBuf};
use bitcoin::secp256k1::{Message, Secp256k1};
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::transaction::Version;
use bitcoin::{Amount, OutPoint, Sequence, Transaction, TxIn, TxOut, Txid, Witness};
use serde::{Deserialize, Serialize};

use crate::address::AddressFormat;
use crate::error::BtcError;
use crate::fee::{estimate_fee, DEFAULT_FEE_RATE};
use crate::key::WalletKey;
use crate::utxo::{select_inputs_with, SelectionOrder, Utxo};

/// Outputs at or below this value are not created; the value goes to fee.
pub const DUST_THRESHOLD_SAT: u64 = 546;

/// How many outputs a payment's fee is sized for.
///
/// A payment's fee is estimated before it is known whether a change output
/// will exist. When change ends up at or below the dust threshold it is folded
/// into the fee, so the transaction always pays at least the estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeeEstimateMode {
    /// Always size for two outputs (payment + change). Folding dust change
    /// never leaves the fee below the two-output estimate.
    #[default]
    AssumeChange,
    /// When change is folded, only require the one-output estimate to be
    /// covered. Lets a payment through that would otherwise be short by the
    /// size of the change output it does not have.
    ExactOutputCount,
}

/// Knobs shared by payments and sweeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpendPolicy {
    pub fee_rate_sat_per_byte: u64,
    pub selection_order: SelectionOrder,
    pub fee_estimate_mode: FeeEstimateMode,
}

impl Default for SpendPolicy {
    fn default() -> Self {
        Self {
            fee_rate_sat_per_byte: DEFAULT_FEE_RATE,
            selection_order: SelectionOrder::default(),
            fee_estimate_mode: FeeEstimateMode::default(),
        }
    }
}

impl SpendPolicy {
    pub fn with_fee_rate(mut self, fee_rate_sat_per_byte: u64) -> Self {
        self.fee_rate_sat_per_byte = fee_rate_sat_per_byte;
        self
    }
}

/// Inputs and outputs chosen for a spend, before any signing.
#[derive(Debug, Clone)]
pub struct TxPlan {
    /// Spent UTXOs, in input order.
    pub inputs: Vec<Utxo>,
    /// Payment first, then change if any.
    pub outputs: Vec<TxOut>,
    /// Sum of input values.
    pub total_input_sat: u64,
    /// Fee the transaction actually pays (inputs minus outputs).
    pub fee_sat: u64,
}

impl TxPlan {
    pub fn output_values(&self) -> Vec<u64> {
        self.outputs.iter().map(|o| o.value.to_sat()).collect()
    }

    pub fn has_change(&self) -> bool {
        self.outputs.len() > 1
    }
}

/// An unsigned Bitcoin transaction ready for signing.
#[derive(Debug, Clone)]
pub struct UnsignedBtcTx {
    /// The bitcoin transaction with empty script_sigs and witnesses.
    pub tx: Transaction,
    /// The outputs being spent (in the same order as the transaction inputs).
    /// Needed for computing sighashes during signing.
    pub prevouts: Vec<TxOut>,
}

/// A fully signed transaction and its broadcast payload.
#[derive(Debug, Clone)]
pub struct SignedBtcTx {
    pub tx: Transaction,
    pub txid: Txid,
    /// Consensus serialization as hex, the `blockchain.transaction.broadcast`
    /// parameter.
    pub raw_hex: String,
}

/// Plan a payment of `amount_sat` to `recipient`, returning change to
/// `change_address`.
///
/// Inputs are selected until they cover `amount_sat`. The fee is then
/// estimated for two outputs; leftover change above [`DUST_THRESHOLD_SAT`]
/// becomes a second output, anything at or below it is added to the fee.
/// When the selected inputs cover the amount but not the fee, selection is
/// extended to `amount + fee` and the fee re-estimated for the larger input
/// count. Funds are insufficient only once every UTXO is selected.
pub fn plan_payment(
    utxos: &[Utxo],
    recipient: &Address,
    amount_sat: u64,
    change_address: &Address,
    policy: &SpendPolicy,
) -> Result<TxPlan, BtcError> {
    if amount_sat == 0 {
        return Err(BtcError::InvalidAmount("payment amount must be positive".into()));
    }

    let rate = policy.fee_rate_sat_per_byte;
    let payment = TxOut {
        value: Amount::from_sat(amount_sat),
        script_pubkey: recipient.script_pubkey(),
    };

    let mut target_sat = amount_sat;
    loop {
        let selection = select_inputs_with(utxos, Some(target_sat), policy.selection_order);
        if selection.total_sat < amount_sat {
            return Err(BtcError::InsufficientFunds {
                available_sat: selection.total_sat,
                required_sat: amount_sat,
            });
        }

        let num_inputs = selection.selected.len();
        let fee = estimate_fee(num_inputs, 2, rate);
        let excess = selection.total_sat - amount_sat;

        if let Some(change) = excess.checked_sub(fee).filter(|c| *c > DUST_THRESHOLD_SAT) {
            let change_out = TxOut {
                value: Amount::from_sat(change),
                script_pubkey: change_address.script_pubkey(),
            };
            return Ok(TxPlan {
                inputs: selection.selected,
                outputs: vec![payment, change_out],
                total_input_sat: selection.total_sat,
                fee_sat: fee,
            });
        }

        let required_fee = match policy.fee_estimate_mode {
            FeeEstimateMode::AssumeChange => fee,
            FeeEstimateMode::ExactOutputCount => estimate_fee(num_inputs, 1, rate),
        };
        if excess >= required_fee {
            // Dust change is not worth an output; it all goes to the miner.
            return Ok(TxPlan {
                inputs: selection.selected,
                outputs: vec![payment],
                total_input_sat: selection.total_sat,
                fee_sat: excess,
            });
        }

        // The selection is a prefix that reached `target_sat`, so a short
        // non-exhaustive selection always moves the target forward.
        let needed_sat = amount_sat.saturating_add(required_fee);
        if num_inputs == utxos.len() || needed_sat <= target_sat {
            return Err(BtcError::InsufficientFunds {
                available_sat: selection.total_sat,
                required_sat: needed_sat,
            });
        }
        target_sat = needed_sat;
    }
}

/// Plan a sweep of every UTXO to `recipient` as a single output.
///
/// Fails with [`BtcError::NoUtxos`] on an empty set and
/// [`BtcError::DustAmount`] if what is left after the fee is at or below
/// [`DUST_THRESHOLD_SAT`].
pub fn plan_sweep(
    utxos: &[Utxo],
    recipient: &Address,
    policy: &SpendPolicy,
) -> Result<TxPlan, BtcError> {
    if utxos.is_empty() {
        return Err(BtcError::NoUtxos);
    }

    let selection = select_inputs_with(utxos, None, policy.selection_order);
    let fee = estimate_fee(selection.selected.len(), 1, policy.fee_rate_sat_per_byte);

    let amount_sat = match selection.total_sat.checked_sub(fee) {
        Some(amount) if amount > DUST_THRESHOLD_SAT => amount,
        _ => {
            return Err(BtcError::DustAmount {
                amount_sat: signed(selection.total_sat).saturating_sub(signed(fee)),
            })
        }
    };

    Ok(TxPlan {
        inputs: selection.selected,
        outputs: vec![TxOut {
            value: Amount::from_sat(amount_sat),
            script_pubkey: recipient.script_pubkey(),
        }],
        total_input_sat: selection.total_sat,
        fee_sat: fee,
    })
}

fn signed(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Turn a plan into an unsigned transaction spending outputs locked to
/// `owner_script`.
pub fn build_unsigned(plan: &TxPlan, owner_script: &Script) -> Result<UnsignedBtcTx, BtcError> {
    let mut inputs = Vec::with_capacity(plan.inputs.len());
    let mut prevouts = Vec::with_capacity(plan.inputs.len());

    for utxo in &plan.inputs {
        let txid: Txid = utxo
            .txid
            .parse()
            .map_err(|e| BtcError::TransactionBuildError(format!("invalid txid {}: {e}", utxo.txid)))?;

        inputs.push(TxIn {
            previous_output: OutPoint::new(txid, utxo.vout),
            script_sig: ScriptBuf::new(),
            sequence: Sequence::MAX,
            witness: Witness::default(),
        });

        prevouts.push(TxOut {
            value: Amount::from_sat(utxo.amount_sat),
            script_pubkey: owner_script.to_owned(),
        });
    }

    if inputs.is_empty() {
        return Err(BtcError::TransactionBuildError("transaction has no inputs".into()));
    }

    let tx = Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: inputs,
        output: plan.outputs.clone(),
    };

    Ok(UnsignedBtcTx { tx, prevouts })
}

/// Sign every input of `unsigned` with `key`.
///
/// All inputs are assumed to be controlled by the same key and locked with
/// the script template of `format`: P2WPKH inputs get a `[sig, pubkey]`
/// witness, P2PKH inputs a `<sig> <pubkey>` script_sig.
pub fn sign_transaction(
    unsigned: &UnsignedBtcTx,
    key: &WalletKey,
    format: AddressFormat,
) -> Result<Transaction, BtcError> {
    let secp = Secp256k1::signing_only();
    let sighash_type = EcdsaSighashType::All;
    let mut signed_tx = unsigned.tx.clone();
    let mut cache = SighashCache::new(&unsigned.tx);

    for (index, prevout) in unsigned.prevouts.iter().enumerate() {
        let digest = match format {
            AddressFormat::Segwit => cache
                .p2wpkh_signature_hash(index, &prevout.script_pubkey, prevout.value, sighash_type)
                .map_err(|e| BtcError::SigningError(format!("sighash computation failed: {e}")))?
                .to_byte_array(),
            AddressFormat::Legacy => cache
                .legacy_signature_hash(index, &prevout.script_pubkey, sighash_type.to_u32())
                .map_err(|e| BtcError::SigningError(format!("sighash computation failed: {e}")))?
                .to_byte_array(),
        };

        let signature = secp.sign_ecdsa(&Message::from_digest(digest), key.secret_key());

        // DER signature followed by the sighash type byte.
        let mut sig_bytes = signature.serialize_der().to_vec();
        sig_bytes.push(sighash_type as u8);
        let pubkey = key.public_key_bytes();

        match format {
            AddressFormat::Segwit => {
                let mut witness = Witness::new();
                witness.push(&sig_bytes);
                witness.push(pubkey);
                signed_tx.input[index].witness = witness;
            }
            AddressFormat::Legacy => {
                let sig_push = PushBytesBuf::try_from(sig_bytes)
                    .map_err(|e| BtcError::SigningError(format!("signature push: {e}")))?;
                signed_tx.input[index].script_sig = ScriptBuf::builder()
                    .push_slice(sig_push)
                    .push_key(&bitcoin::PublicKey::new(*key.public_key()))
                    .into_script();
            }
        }
    }

    Ok(signed_tx)
}

/// Assemble, sign and serialize a plan spent from `owner`'s address.
pub fn build_and_sign(
    plan: &TxPlan,
    key: &WalletKey,
    owner: &Address,
    format: AddressFormat,
) -> Result<SignedBtcTx, BtcError> {
    let unsigned = build_unsigned(plan, &owner.script_pubkey())?;
    let tx = sign_transaction(&unsigned, key, format)?;
    Ok(SignedBtcTx {
        txid: tx.compute_txid(),
        raw_hex: serialize_hex(&tx),
        tx,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::derive_address;
    use crate::network::BtcNetwork;
    use bitcoin::secp256k1::ecdsa::Signature;

    const RECIPIENT: &str = "tb1qrp33g0q5c5txsp9arysrx4k6zdkfs4nce4xj0gdcccefvpysxf3q0sl5k7";

    fn recipient() -> Address {
        crate::address::parse_address(RECIPIENT, BtcNetwork::Testnet).unwrap()
    }

    fn own(format: AddressFormat) -> (WalletKey, Address) {
        let key = WalletKey::from_slice(&[0x42; 32]).unwrap();
        let addr = derive_address(&key.pubkey_hash(), BtcNetwork::Testnet, format).unwrap();
        (key, addr)
    }

    fn make_utxo(n: u8, amount_sat: u64) -> Utxo {
        Utxo {
            txid: format!("{n:02x}").repeat(32),
            vout: n as u32,
            amount_sat,
        }
    }

    fn policy(rate: u64) -> SpendPolicy {
        SpendPolicy::default().with_fee_rate(rate)
    }

    #[test]
    fn payment_with_change() {
        let (_, change) = own(AddressFormat::Segwit);
        let plan = plan_payment(&[make_utxo(1, 100_000)], &recipient(), 50_000, &change, &policy(10))
            .unwrap();
        // fee = (91 + 2*31 + 10) * 10
        assert_eq!(plan.fee_sat, 1_630);
        assert_eq!(plan.output_values(), vec![50_000, 48_370]);
        assert_eq!(plan.outputs[1].script_pubkey, change.script_pubkey());
        assert_eq!(plan.outputs[0].script_pubkey, recipient().script_pubkey());
    }

    #[test]
    fn payment_at_one_sat_per_byte() {
        let (_, change) = own(AddressFormat::Segwit);
        let plan = plan_payment(&[make_utxo(1, 100_000)], &recipient(), 50_000, &change, &policy(1))
            .unwrap();
        assert_eq!(plan.output_values(), vec![50_000, 49_837]);
        assert_eq!(plan.fee_sat, 163);
    }

    #[test]
    fn change_of_exactly_dust_threshold_is_folded() {
        let (_, change) = own(AddressFormat::Segwit);
        // 50_000 + 163 + 546
        let utxos = [make_utxo(1, 50_709)];
        let plan = plan_payment(&utxos, &recipient(), 50_000, &change, &policy(1)).unwrap();
        assert_eq!(plan.output_values(), vec![50_000]);
        assert_eq!(plan.fee_sat, 709);
        assert!(!plan.has_change());
    }

    #[test]
    fn change_one_above_dust_threshold_is_kept() {
        let (_, change) = own(AddressFormat::Segwit);
        let utxos = [make_utxo(1, 50_710)];
        let plan = plan_payment(&utxos, &recipient(), 50_000, &change, &policy(1)).unwrap();
        assert_eq!(plan.output_values(), vec![50_000, 547]);
        assert_eq!(plan.fee_sat, 163);
    }

    #[test]
    fn payment_short_of_amount_is_insufficient() {
        let (_, change) = own(AddressFormat::Segwit);
        let utxos = [make_utxo(1, 1_000), make_utxo(2, 2_000)];
        let err = plan_payment(&utxos, &recipient(), 500_000, &change, &policy(1)).unwrap_err();
        match err {
            BtcError::InsufficientFunds { available_sat, required_sat } => {
                assert_eq!(available_sat, 3_000);
                assert_eq!(required_sat, 500_000);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn payment_that_cannot_cover_fee_is_insufficient() {
        let (_, change) = own(AddressFormat::Segwit);
        // Covers the amount but not the 163 sat two-output fee.
        let utxos = [make_utxo(1, 50_100)];
        let err = plan_payment(&utxos, &recipient(), 50_000, &change, &policy(1)).unwrap_err();
        assert!(matches!(
            err,
            BtcError::InsufficientFunds { required_sat: 50_163, .. }
        ));
    }

    #[test]
    fn selection_grows_to_cover_fee() {
        let (_, change) = own(AddressFormat::Segwit);
        // The first UTXO covers the amount but not the 163 sat fee.
        let utxos = [make_utxo(1, 50_100), make_utxo(2, 1_000_000)];
        let plan = plan_payment(&utxos, &recipient(), 50_000, &change, &policy(1)).unwrap();
        assert_eq!(plan.inputs.len(), 2);
        assert_eq!(plan.total_input_sat, 1_050_100);
        // fee for 2 inputs, 2 outputs = 254
        assert_eq!(plan.fee_sat, 254);
        assert_eq!(plan.output_values(), vec![50_000, 999_846]);
    }

    #[test]
    fn grown_selection_still_short_is_insufficient() {
        let (_, change) = own(AddressFormat::Segwit);
        // Adding the second input raises the fee to 254, more than it brings.
        let utxos = [make_utxo(1, 50_100), make_utxo(2, 100)];
        let err = plan_payment(&utxos, &recipient(), 50_000, &change, &policy(1)).unwrap_err();
        match err {
            BtcError::InsufficientFunds { available_sat, required_sat } => {
                assert_eq!(available_sat, 50_200);
                assert_eq!(required_sat, 50_254);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn exact_output_count_mode_only_needs_single_output_fee() {
        let (_, change) = own(AddressFormat::Segwit);
        // One-output fee is 132, two-output fee is 163.
        let utxos = [make_utxo(1, 50_140)];
        let assume = policy(1);
        assert!(plan_payment(&utxos, &recipient(), 50_000, &change, &assume).is_err());

        let exact = SpendPolicy {
            fee_estimate_mode: FeeEstimateMode::ExactOutputCount,
            ..policy(1)
        };
        let plan = plan_payment(&utxos, &recipient(), 50_000, &change, &exact).unwrap();
        assert_eq!(plan.output_values(), vec![50_000]);
        assert_eq!(plan.fee_sat, 140);
    }

    #[test]
    fn zero_amount_is_rejected() {
        let (_, change) = own(AddressFormat::Segwit);
        let err = plan_payment(&[make_utxo(1, 10_000)], &recipient(), 0, &change, &policy(1))
            .unwrap_err();
        assert!(matches!(err, BtcError::InvalidAmount(_)));
    }

    #[test]
    fn payment_uses_only_needed_prefix() {
        let (_, change) = own(AddressFormat::Segwit);
        let utxos = [make_utxo(1, 30_000), make_utxo(2, 30_000), make_utxo(3, 30_000)];
        let plan = plan_payment(&utxos, &recipient(), 45_000, &change, &policy(1)).unwrap();
        assert_eq!(plan.inputs.len(), 2);
        assert_eq!(plan.total_input_sat, 60_000);
        // fee for 2 inputs, 2 outputs = 254
        assert_eq!(plan.output_values(), vec![45_000, 14_746]);
    }

    #[test]
    fn sweep_two_utxos() {
        let utxos = [make_utxo(1, 10_000), make_utxo(2, 5_000)];
        let plan = plan_sweep(&utxos, &recipient(), &policy(1)).unwrap();
        assert_eq!(plan.fee_sat, 223);
        assert_eq!(plan.output_values(), vec![14_777]);
        assert_eq!(plan.inputs.len(), 2);
    }

    #[test]
    fn sweep_of_nothing_fails() {
        let err = plan_sweep(&[], &recipient(), &policy(1)).unwrap_err();
        assert!(matches!(err, BtcError::NoUtxos));
    }

    #[test]
    fn sweep_dust_boundary() {
        // One input, one output at 1 sat/byte: fee 132.
        let err = plan_sweep(&[make_utxo(1, 678)], &recipient(), &policy(1)).unwrap_err();
        assert!(matches!(err, BtcError::DustAmount { amount_sat: 546 }));

        let plan = plan_sweep(&[make_utxo(1, 679)], &recipient(), &policy(1)).unwrap();
        assert_eq!(plan.output_values(), vec![547]);
    }

    #[test]
    fn sweep_below_fee_reports_negative_amount() {
        let err = plan_sweep(&[make_utxo(1, 100)], &recipient(), &policy(1)).unwrap_err();
        assert!(matches!(err, BtcError::DustAmount { amount_sat: -32 }));
    }

    #[test]
    fn build_unsigned_rejects_bad_txid() {
        let (_, owner) = own(AddressFormat::Segwit);
        let mut plan = plan_sweep(&[make_utxo(1, 10_000)], &recipient(), &policy(1)).unwrap();
        plan.inputs[0].txid = "zz".into();
        let err = build_unsigned(&plan, &owner.script_pubkey()).unwrap_err();
        assert!(matches!(err, BtcError::TransactionBuildError(_)));
    }

    #[test]
    fn segwit_signatures_verify() {
        let (key, owner) = own(AddressFormat::Segwit);
        let utxos = [make_utxo(1, 60_000), make_utxo(2, 70_000)];
        let plan = plan_payment(&utxos, &recipient(), 100_000, &owner, &policy(2)).unwrap();
        let unsigned = build_unsigned(&plan, &owner.script_pubkey()).unwrap();
        let signed = sign_transaction(&unsigned, &key, AddressFormat::Segwit).unwrap();

        let secp = Secp256k1::verification_only();
        let mut cache = SighashCache::new(&unsigned.tx);
        for (index, input) in signed.input.iter().enumerate() {
            assert!(input.script_sig.is_empty());
            assert_eq!(input.witness.len(), 2);

            let sig_with_type = input.witness.nth(0).unwrap();
            assert_eq!(*sig_with_type.last().unwrap(), EcdsaSighashType::All as u8);
            assert_eq!(input.witness.nth(1).unwrap(), key.public_key_bytes());

            let sighash = cache
                .p2wpkh_signature_hash(
                    index,
                    &owner.script_pubkey(),
                    unsigned.prevouts[index].value,
                    EcdsaSighashType::All,
                )
                .unwrap();
            let sig = Signature::from_der(&sig_with_type[..sig_with_type.len() - 1]).unwrap();
            secp.verify_ecdsa(&Message::from_digest(sighash.to_byte_array()), &sig, key.public_key())
                .unwrap();
        }
    }

    #[test]
    fn legacy_signatures_go_in_script_sig() {
        let (key, owner) = own(AddressFormat::Legacy);
        let plan = plan_sweep(&[make_utxo(7, 90_000)], &recipient(), &policy(1)).unwrap();
        let signed = build_and_sign(&plan, &key, &owner, AddressFormat::Legacy).unwrap();

        let input = &signed.tx.input[0];
        assert!(input.witness.is_empty());
        assert!(!input.script_sig.is_empty());

        // Without witnesses there is no segwit marker after the version.
        let raw = hex::decode(&signed.raw_hex).unwrap();
        assert_ne!(raw[4], 0x00);
        assert_eq!(signed.txid, signed.tx.compute_txid());
    }

    #[test]
    fn segwit_serialization_has_marker() {
        let (key, owner) = own(AddressFormat::Segwit);
        let plan = plan_sweep(&[make_utxo(7, 90_000)], &recipient(), &policy(1)).unwrap();
        let signed = build_and_sign(&plan, &key, &owner, AddressFormat::Segwit).unwrap();

        let raw = hex::decode(&signed.raw_hex).unwrap();
        assert_eq!(&raw[4..6], &[0x00, 0x01]);
        let decoded: Transaction = bitcoin::consensus::deserialize(&raw).unwrap();
        assert_eq!(decoded, signed.tx);
        assert_eq!(decoded.output[0].value.to_sat(), 90_000 - 132);
    }
}
