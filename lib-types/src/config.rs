//! Per-network chain constants.
//!
//! Only the testnet and devnet parameter sets exist; there is no production
//! ("standard") parameter set for this chain.

use serde::{Deserialize, Serialize};

use crate::primitives::{BlockHeight, Timestamp};

/// Decimal digits of token precision: 1 token = 10^9 units.
pub const TOKEN_PRECISION: u32 = 9;

/// Lock values below this threshold are block heights; values at or above
/// it are unix timestamps.
pub const LOCK_TIME_MIN_TIMESTAMP: u64 = 500_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkName {
    Testnet,
    Devnet,
}

impl NetworkName {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkName::Testnet => "testnet",
            NetworkName::Devnet => "devnet",
        }
    }
}

/// Custody-fee parameters, immutable at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustodyFeeConfig {
    /// How far a declared fee-computation time may lag the spending block's
    /// timestamp, in seconds.
    pub max_allowed_computation_time_advance: Timestamp,
    /// How many blocks back a wallet may fall when picking a reference
    /// block for fee computation.
    pub max_fallback_blocks_in_the_past: BlockHeight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConstants {
    pub network: NetworkName,
    /// Target seconds between blocks.
    pub block_frequency: Timestamp,
    /// Blocks before a miner payout becomes spendable.
    pub maturity_delay: BlockHeight,
    pub custody_fees: CustodyFeeConfig,
}

impl ChainConstants {
    pub fn testnet() -> Self {
        Self {
            network: NetworkName::Testnet,
            block_frequency: 120,
            maturity_delay: 720,
            custody_fees: CustodyFeeConfig {
                // 6 block times
                max_allowed_computation_time_advance: 720,
                max_fallback_blocks_in_the_past: 3,
            },
        }
    }

    pub fn devnet() -> Self {
        Self {
            network: NetworkName::Devnet,
            block_frequency: 12,
            maturity_delay: 10,
            custody_fees: CustodyFeeConfig {
                // 10 block times
                max_allowed_computation_time_advance: 120,
                max_fallback_blocks_in_the_past: 3,
            },
        }
    }
}
