//! Transaction fee estimation
//!
//! Size model for a pay-to-pubkey-hash transaction: 149 bytes per input, 34
//! per output, 10 bytes overhead, charged per started kilobyte.

use rust_decimal::Decimal;

/// Bytes per transaction input
pub const INPUT_BYTES: u64 = 149;

/// Bytes per transaction output
pub const OUTPUT_BYTES: u64 = 34;

/// Fixed transaction overhead
pub const OVERHEAD_BYTES: u64 = 10;

const KILOBYTE: u64 = 1024;

/// Estimates the fee of the next disbursement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeEstimator {
    fee_per_kb: Decimal,
}

impl FeeEstimator {
    /// Create estimator charging `fee_per_kb` per started kilobyte
    pub fn new(fee_per_kb: Decimal) -> Self {
        Self { fee_per_kb }
    }

    /// Fee rate per kilobyte
    pub fn fee_per_kb(&self) -> Decimal {
        self.fee_per_kb
    }

    /// Estimated serialized size in bytes
    pub fn tx_size(inputs: usize, outputs: usize) -> u64 {
        (inputs as u64)
            .saturating_mul(INPUT_BYTES)
            .saturating_add((outputs as u64).saturating_mul(OUTPUT_BYTES))
            .saturating_add(OVERHEAD_BYTES)
    }

    /// Estimated fee for a transaction with the given shape
    pub fn estimate(&self, inputs: usize, outputs: usize) -> Decimal {
        let size = Self::tx_size(inputs, outputs);
        let kilobytes = (size + KILOBYTE - 1) / KILOBYTE;
        Decimal::from(kilobytes) * self.fee_per_kb
    }
}
