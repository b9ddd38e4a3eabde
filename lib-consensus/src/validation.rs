//! Transaction validation plumbing shared by the engine and plugins.

use lib_types::CoinOutputId;
use thiserror::Error;

use crate::change::ConsensusTransaction;
use crate::storage::BucketRef;

/// Chain state a transaction is validated against: the block that would
/// contain it. The plugin bucket handed alongside is the pre-apply
/// snapshot.
#[derive(Debug, Clone, Copy)]
pub struct TransactionValidationContext {
    pub block_height: u64,
    pub block_time: u64,
}

/// A transaction rejected by validation. The transaction is dropped by the
/// consensus pipeline; nothing about this is fatal to the node.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("transaction contains a zero-valued coin output")]
    ZeroOutput,

    #[error("non-standard unlock condition: {0}")]
    NonStandardCondition(String),

    #[error("coin output {0} is consumed twice within the transaction")]
    DuplicateCoinInput(CoinOutputId),

    /// Plugin-specific rejection, pre-rendered with its exact diagnostic.
    #[error("{0}")]
    Rejected(String),

    #[error("storage failure during validation: {0}")]
    Storage(String),

    #[error("plugin store is corrupt: {0}")]
    CorruptStore(String),
}

/// A stateless validator contributed by the chain definition; needs no
/// plugin bucket.
pub type TransactionValidationFn =
    fn(&ConsensusTransaction, &TransactionValidationContext) -> Result<(), ValidationError>;

/// A plugin-contributed validator. Runs per transaction with read access to
/// the plugin's bucket at the pre-apply snapshot.
pub trait TransactionValidator: Send + Sync {
    fn validate(
        &self,
        tx: &ConsensusTransaction,
        ctx: &TransactionValidationContext,
        bucket: &BucketRef<'_>,
    ) -> Result<(), ValidationError>;
}

/// Rejects transactions consuming the same coin output twice.
pub fn validate_no_duplicate_coin_inputs(
    tx: &ConsensusTransaction,
    _ctx: &TransactionValidationContext,
) -> Result<(), ValidationError> {
    let inputs = &tx.transaction.coin_inputs;
    let mut seen = std::collections::HashSet::with_capacity(inputs.len());
    for ci in inputs {
        if !seen.insert(ci.parent_id) {
            return Err(ValidationError::DuplicateCoinInput(ci.parent_id));
        }
    }
    Ok(())
}
