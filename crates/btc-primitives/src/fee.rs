/// Estimated size of one input, in bytes.
pub const INPUT_BYTES: u64 = 91;

/// Estimated size of one output, in bytes.
pub const OUTPUT_BYTES: u64 = 31;

/// Fixed overhead: version, locktime and input/output counts.
pub const TX_OVERHEAD_BYTES: u64 = 10;

/// Default fee rate in sat/byte.
pub const DEFAULT_FEE_RATE: u64 = 10;

/// Estimated transaction size for the given shape.
pub fn estimate_size(num_inputs: usize, num_outputs: usize) -> u64 {
    (num_inputs as u64)
        .saturating_mul(INPUT_BYTES)
        .saturating_add((num_outputs as u64).saturating_mul(OUTPUT_BYTES))
        .saturating_add(TX_OVERHEAD_BYTES)
}

/// Estimate the fee in satoshis: `(inputs*91 + outputs*31 + 10) * rate`.
///
/// The per-unit sizes approximate a P2WPKH footprint; the same constants are
/// used for both address formats.
pub fn estimate_fee(num_inputs: usize, num_outputs: usize, fee_rate_sat_per_byte: u64) -> u64 {
    estimate_size(num_inputs, num_outputs).saturating_mul(fee_rate_sat_per_byte)
}
