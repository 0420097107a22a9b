use serde::{Deserialize, Serialize};

/// A single unspent transaction output owned by the wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    /// Transaction ID as a hex string (big-endian / display order).
    pub txid: String,
    /// Output index within the transaction.
    pub vout: u32,
    /// Value in satoshis.
    pub amount_sat: u64,
}

/// The order in which candidate UTXOs are considered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionOrder {
    /// Exactly the order the server returned.
    #[default]
    ServerOrder,
    /// Descending by value; fewer inputs for the same target.
    LargestFirst,
}

/// Result of UTXO selection: the chosen UTXOs and their aggregate value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UtxoSelection {
    /// The selected UTXOs, in selection order.
    pub selected: Vec<Utxo>,
    /// Total value of the selected UTXOs in satoshis.
    pub total_sat: u64,
}

/// Select inputs in server order. See [`select_inputs_with`].
pub fn select_inputs(utxos: &[Utxo], target_sat: Option<u64>) -> UtxoSelection {
    select_inputs_with(utxos, target_sat, SelectionOrder::ServerOrder)
}

/// Walk `utxos` in `order`, accumulating until the running total reaches
/// `target_sat`. With `None` (sweep) every UTXO is selected.
///
/// Sufficiency is not checked here: if the whole set falls short the full set
/// is returned and the caller decides what to do.
pub fn select_inputs_with(
    utxos: &[Utxo],
    target_sat: Option<u64>,
    order: SelectionOrder,
) -> UtxoSelection {
    let mut candidates: Vec<&Utxo> = utxos.iter().collect();
    if order == SelectionOrder::LargestFirst {
        // Stable sort keeps server order among equal values.
        candidates.sort_by(|a, b| b.amount_sat.cmp(&a.amount_sat));
    }

    let mut selection = UtxoSelection::default();
    for utxo in candidates {
        if let Some(target) = target_sat {
            if selection.total_sat >= target {
                break;
            }
        }
        selection.total_sat = selection.total_sat.saturating_add(utxo.amount_sat);
        selection.selected.push(utxo.clone());
    }
    selection
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_utxo(txid: &str, vout: u32, amount_sat: u64) -> Utxo {
        Utxo {
            txid: txid.to_string(),
            vout,
            amount_sat,
        }
    }

    fn values(selection: &UtxoSelection) -> Vec<u64> {
        selection.selected.iter().map(|u| u.amount_sat).collect()
    }

    #[test]
    fn keeps_server_order() {
        let utxos = vec![
            make_utxo("small", 0, 1_000),
            make_utxo("large", 0, 100_000),
            make_utxo("medium", 0, 50_000),
        ];
        let selection = select_inputs(&utxos, Some(10_000));
        assert_eq!(values(&selection), vec![1_000, 100_000]);
        assert_eq!(selection.total_sat, 101_000);
    }

    #[test]
    fn stops_at_first_prefix_reaching_target() {
        let utxos = vec![
            make_utxo("a", 0, 30_000),
            make_utxo("b", 1, 30_000),
            make_utxo("c", 2, 30_000),
        ];
        assert_eq!(select_inputs(&utxos, Some(30_000)).selected.len(), 1);
        assert_eq!(select_inputs(&utxos, Some(30_001)).selected.len(), 2);
        assert_eq!(select_inputs(&utxos, Some(60_000)).selected.len(), 2);
        assert_eq!(select_inputs(&utxos, Some(60_001)).selected.len(), 3);
    }

    #[test]
    fn sweep_selects_everything() {
        let utxos = vec![make_utxo("a", 0, 10_000), make_utxo("b", 0, 5_000)];
        let selection = select_inputs(&utxos, None);
        assert_eq!(selection.selected, utxos);
        assert_eq!(selection.total_sat, 15_000);
    }

    #[test]
    fn short_set_returns_everything_without_error() {
        let utxos = vec![make_utxo("a", 0, 1_000), make_utxo("b", 0, 2_000)];
        let selection = select_inputs(&utxos, Some(500_000));
        assert_eq!(selection.selected.len(), 2);
        assert_eq!(selection.total_sat, 3_000);
    }

    #[test]
    fn empty_set_selects_nothing() {
        assert_eq!(select_inputs(&[], Some(1)), UtxoSelection::default());
        assert_eq!(select_inputs(&[], None), UtxoSelection::default());
    }

    #[test]
    fn zero_target_selects_nothing() {
        let utxos = vec![make_utxo("a", 0, 1_000)];
        assert!(select_inputs(&utxos, Some(0)).selected.is_empty());
    }

    #[test]
    fn selection_is_minimal_prefix_for_many_targets() {
        let amounts = [700u64, 1, 25_000, 3, 9_999, 400, 60_000];
        let utxos: Vec<Utxo> = amounts
            .iter()
            .enumerate()
            .map(|(i, &v)| make_utxo("t", i as u32, v))
            .collect();

        for target in [1u64, 700, 701, 25_701, 25_704, 35_703, 96_103, 200_000] {
            let selection = select_inputs(&utxos, Some(target));
            let n = selection.selected.len();
            assert_eq!(selection.selected[..], utxos[..n]);
            assert_eq!(selection.total_sat, amounts[..n].iter().sum::<u64>());
            if selection.total_sat >= target {
                let before: u64 = amounts[..n - 1].iter().sum();
                assert!(before < target, "prefix for {target} is not minimal");
            } else {
                assert_eq!(n, utxos.len());
            }
        }
    }

    #[test]
    fn largest_first_policy() {
        let utxos = vec![
            make_utxo("small", 0, 1_000),
            make_utxo("large", 0, 100_000),
            make_utxo("medium", 0, 50_000),
        ];
        let selection = select_inputs_with(&utxos, Some(10_000), SelectionOrder::LargestFirst);
        assert_eq!(selection.selected.len(), 1);
        assert_eq!(selection.selected[0].txid, "large");

        let sweep = select_inputs_with(&utxos, None, SelectionOrder::LargestFirst);
        assert_eq!(values(&sweep), vec![100_000, 50_000, 1_000]);
    }

    #[test]
    fn oversized_values_saturate_total() {
        let utxos = vec![make_utxo("a", 0, u64::MAX), make_utxo("b", 1, 1_000)];
        let sweep = select_inputs(&utxos, None);
        assert_eq!(sweep.selected.len(), 2);
        assert_eq!(sweep.total_sat, u64::MAX);
    }
}
