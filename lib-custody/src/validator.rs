//! Transaction validation for custody fees.
//!
//! Any transaction consuming coin inputs must pay the exact custody fee
//! accrued by those inputs, into exactly one coin output locked under the
//! custody-fee condition. The validator recomputes the required fee from
//! the ledger at the transaction's block time and rejects on any mismatch,
//! reporting the expected value.

use std::collections::HashSet;

use thiserror::Error;

use lib_consensus::{
    BucketRef, ConsensusTransaction, PluginError, TransactionValidationContext,
    TransactionValidationFn, TransactionValidator, ValidationError,
    validation::validate_no_duplicate_coin_inputs,
};
use lib_types::{CoinOutputId, Currency, Timestamp};

use crate::calc::amount_custody_fee_pair_after_seconds;
use crate::condition::{CustodyFeeCondition, CONDITION_TYPE_CUSTODY_FEE};
use crate::plugin::read_record;

/// Why the custody-fee validator rejected a transaction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CustodyFeeViolation {
    #[error("tx does not contain the required coin output for the custody fee, while coin inputs are spent")]
    MissingFeeOutput,

    #[error("only one custody fee condition per tx is allowed")]
    MultipleFeeOutputs,

    #[error("registered custody fee computation time cannot be in the future")]
    ComputationTimeInFuture,

    #[error("custody fee is paid, computed based on a timestamp too far in the past: {excess}s too late")]
    ComputationTimeTooOld { excess: Timestamp },

    #[error("coin output {0} is already spent in custody fees DB")]
    InputAlreadySpent(CoinOutputId),

    #[error("coin output {0} holds custody fees and can never be spent")]
    SpendsCustodyFeeOutput(CoinOutputId),

    #[error("spent coin output {id} creation time is in the future, this is invalid: {creation_time} > {block_time}")]
    CreationTimeInFuture {
        id: CoinOutputId,
        creation_time: Timestamp,
        block_time: Timestamp,
    },

    #[error("unexpected custody fee of value {declared}, expected {expected}")]
    UnexpectedFeeValue { declared: Currency, expected: Currency },
}

impl From<CustodyFeeViolation> for ValidationError {
    fn from(violation: CustodyFeeViolation) -> Self {
        ValidationError::Rejected(violation.to_string())
    }
}

fn ledger_error(err: PluginError, id: &CoinOutputId) -> ValidationError {
    match err {
        PluginError::CorruptStore(msg) => ValidationError::CorruptStore(msg),
        PluginError::NotFound(_) => ValidationError::Rejected(format!(
            "failed to look up creation timing of coin input {id}"
        )),
        PluginError::Storage(msg) => ValidationError::Storage(msg),
        PluginError::Codec(err) => ValidationError::CorruptStore(err.to_string()),
        PluginError::InvalidInput(msg) => ValidationError::Rejected(msg),
    }
}

/// The plugin-contributed validator enforcing custody-fee payment.
pub struct CustodyFeeValidator {
    max_allowed_computation_time_advance: Timestamp,
}

impl CustodyFeeValidator {
    pub fn new(max_allowed_computation_time_advance: Timestamp) -> Self {
        assert!(
            max_allowed_computation_time_advance > 0,
            "max allowed computation time advance must be greater than zero"
        );
        Self { max_allowed_computation_time_advance }
    }

    pub fn validate_custody_fee_present(
        &self,
        tx: &ConsensusTransaction,
        ctx: &TransactionValidationContext,
        bucket: &BucketRef<'_>,
    ) -> Result<(), ValidationError> {
        let transaction = &tx.transaction;
        if transaction.coin_inputs.is_empty() {
            return Ok(());
        }

        // exactly one custody-fee output, carrying the declared batch
        let mut declared: Option<(Timestamp, Currency)> = None;
        for co in &transaction.coin_outputs {
            if co.condition.condition_type() != CONDITION_TYPE_CUSTODY_FEE {
                continue;
            }
            let condition = co
                .condition
                .downcast_ref::<CustodyFeeCondition>()
                .ok_or_else(|| {
                    ValidationError::Rejected(format!(
                        "unexpected unlock condition for condition type {CONDITION_TYPE_CUSTODY_FEE}"
                    ))
                })?;
            if declared.is_some() {
                return Err(CustodyFeeViolation::MultipleFeeOutputs.into());
            }
            declared = Some((condition.computation_time, co.value.clone()));
        }
        let (computation_time, declared_fee) =
            declared.ok_or(CustodyFeeViolation::MissingFeeOutput)?;

        if computation_time > ctx.block_time {
            return Err(CustodyFeeViolation::ComputationTimeInFuture.into());
        }
        let lag = ctx.block_time - computation_time;
        if lag > self.max_allowed_computation_time_advance {
            return Err(CustodyFeeViolation::ComputationTimeTooOld {
                excess: lag - self.max_allowed_computation_time_advance,
            }
            .into());
        }

        // recompute the required fee from the ledger at block time
        let mut required = Currency::zero();
        let mut seen: HashSet<CoinOutputId> = HashSet::with_capacity(transaction.coin_inputs.len());
        for ci in &transaction.coin_inputs {
            if !seen.insert(ci.parent_id) {
                return Err(ValidationError::DuplicateCoinInput(ci.parent_id));
            }
            let record =
                read_record(bucket, &ci.parent_id).map_err(|e| ledger_error(e, &ci.parent_id))?;
            if record.is_custody_fee {
                return Err(CustodyFeeViolation::SpendsCustodyFeeOutput(ci.parent_id).into());
            }
            if record.spent() {
                return Err(CustodyFeeViolation::InputAlreadySpent(ci.parent_id).into());
            }
            if record.creation_time > ctx.block_time {
                return Err(CustodyFeeViolation::CreationTimeInFuture {
                    id: ci.parent_id,
                    creation_time: record.creation_time,
                    block_time: ctx.block_time,
                }
                .into());
            }
            if record.creation_time == ctx.block_time {
                continue; // zero age, zero fee
            }
            let (_, fee) = amount_custody_fee_pair_after_seconds(
                &record.creation_value,
                ctx.block_time - record.creation_time,
            );
            required += &fee;
        }

        if declared_fee != required {
            return Err(CustodyFeeViolation::UnexpectedFeeValue {
                declared: declared_fee,
                expected: required,
            }
            .into());
        }
        Ok(())
    }
}

impl TransactionValidator for CustodyFeeValidator {
    fn validate(
        &self,
        tx: &ConsensusTransaction,
        ctx: &TransactionValidationContext,
        bucket: &BucketRef<'_>,
    ) -> Result<(), ValidationError> {
        self.validate_custody_fee_present(tx, ctx, bucket)
    }
}

/// Coin outputs must be standard, and only custody-fee outputs may carry a
/// zero value.
pub fn validate_coin_outputs_are_valid(
    tx: &ConsensusTransaction,
    _ctx: &TransactionValidationContext,
) -> Result<(), ValidationError> {
    for co in &tx.transaction.coin_outputs {
        if co.value.is_zero() && co.condition.condition_type() != CONDITION_TYPE_CUSTODY_FEE {
            return Err(ValidationError::ZeroOutput);
        }
        co.condition
            .is_standard()
            .map_err(|e| ValidationError::NonStandardCondition(e.to_string()))?;
    }
    Ok(())
}

fn standard_transaction_validators() -> Vec<TransactionValidationFn> {
    vec![validate_no_duplicate_coin_inputs, validate_coin_outputs_are_valid]
}

pub fn testnet_transaction_validators() -> Vec<TransactionValidationFn> {
    standard_transaction_validators()
}

pub fn devnet_transaction_validators() -> Vec<TransactionValidationFn> {
    standard_transaction_validators()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::CoinOutputRecord;
    use lib_consensus::PluginStorage;
    use lib_consensus::{create_sub_bucket, open_sub_bucket_mut};
    use lib_types::{
        CoinInput, CoinOutput, Transaction, UnlockConditionProxy, UnlockHash, UnlockHashCondition,
        UNLOCK_TYPE_PUBKEY,
    };
    use std::sync::Arc;

    const BUCKET_COIN_OUTPUTS: &str = "coinoutputs";

    fn gft(s: &str) -> Currency {
        Currency::from_token_str(s).unwrap()
    }

    fn storage_with_records(
        records: &[(CoinOutputId, CoinOutputRecord)],
    ) -> (tempfile::TempDir, Arc<PluginStorage>) {
        let dir = tempfile::tempdir().unwrap();
        let db = sled::open(dir.path()).unwrap();
        let storage = PluginStorage::open(&db, "custodyFeePlugin").unwrap();
        storage
            .update(|bucket| {
                create_sub_bucket(bucket, BUCKET_COIN_OUTPUTS)?;
                let outputs = open_sub_bucket_mut(bucket, BUCKET_COIN_OUTPUTS)?;
                for (id, record) in records {
                    outputs.put(id.as_bytes(), record.to_bytes())?;
                }
                Ok(())
            })
            .unwrap();
        (dir, storage)
    }

    fn user_output(value: Currency) -> CoinOutput {
        CoinOutput::new(
            value,
            UnlockConditionProxy::new(UnlockHashCondition::new(UnlockHash::new(
                UNLOCK_TYPE_PUBKEY,
                [1u8; 32],
            ))),
        )
    }

    fn fee_output(value: Currency, computation_time: Timestamp) -> CoinOutput {
        CoinOutput::new(
            value,
            UnlockConditionProxy::new(CustodyFeeCondition::new(computation_time)),
        )
    }

    fn spend_tx(parent: CoinOutputId, outputs: Vec<CoinOutput>, block_time: Timestamp) -> ConsensusTransaction {
        ConsensusTransaction {
            transaction: Transaction {
                version: 1,
                coin_inputs: vec![CoinInput { parent_id: parent, ..Default::default() }],
                coin_outputs: outputs,
                miner_fees: vec![],
                arbitrary_data: vec![],
            },
            block_height: 1,
            block_time,
            sequence_id: 0,
        }
    }

    fn validate_raw(
        storage: &PluginStorage,
        validator: &CustodyFeeValidator,
        tx: &ConsensusTransaction,
    ) -> Result<(), ValidationError> {
        let ctx = TransactionValidationContext {
            block_height: tx.block_height,
            block_time: tx.block_time,
        };
        let mut outcome = Ok(());
        storage
            .view(|bucket| {
                outcome = validator.validate(tx, &ctx, bucket);
                Ok(())
            })
            .unwrap();
        outcome
    }

    fn genesis_id() -> CoinOutputId {
        CoinOutputId::new([7u8; 32])
    }

    fn genesis_record() -> (CoinOutputId, CoinOutputRecord) {
        (genesis_id(), CoinOutputRecord::new_unspent(0, gft("10"), false))
    }

    #[test]
    fn transactions_without_coin_inputs_pass() {
        let (_dir, storage) = storage_with_records(&[]);
        let validator = CustodyFeeValidator::new(120);
        let tx = ConsensusTransaction {
            transaction: Transaction {
                coin_outputs: vec![user_output(gft("1"))],
                ..Default::default()
            },
            block_height: 1,
            block_time: 100,
            sequence_id: 0,
        };
        assert!(validate_raw(&storage, &validator, &tx).is_ok());
    }

    #[test]
    fn exact_fee_accepted() {
        let (_dir, storage) = storage_with_records(&[genesis_record()]);
        let validator = CustodyFeeValidator::new(120);
        // 10 tokens aged 100s: fee is 289 units
        let tx = spend_tx(
            genesis_id(),
            vec![
                user_output(gft("9.999999711")),
                fee_output(gft("0.000000289"), 100),
            ],
            100,
        );
        assert!(validate_raw(&storage, &validator, &tx).is_ok());
    }

    #[test]
    fn missing_fee_output_rejected() {
        let (_dir, storage) = storage_with_records(&[genesis_record()]);
        let validator = CustodyFeeValidator::new(120);
        let tx = spend_tx(genesis_id(), vec![user_output(gft("10"))], 100);
        assert_eq!(
            validate_raw(&storage, &validator, &tx),
            Err(CustodyFeeViolation::MissingFeeOutput.into())
        );
    }

    #[test]
    fn multiple_fee_outputs_rejected() {
        let (_dir, storage) = storage_with_records(&[genesis_record()]);
        let validator = CustodyFeeValidator::new(120);
        let tx = spend_tx(
            genesis_id(),
            vec![
                fee_output(gft("0.000000100"), 100),
                fee_output(gft("0.000000189"), 100),
            ],
            100,
        );
        assert_eq!(
            validate_raw(&storage, &validator, &tx),
            Err(CustodyFeeViolation::MultipleFeeOutputs.into())
        );
    }

    #[test]
    fn computation_time_in_future_rejected() {
        let (_dir, storage) = storage_with_records(&[genesis_record()]);
        let validator = CustodyFeeValidator::new(120);
        let tx = spend_tx(genesis_id(), vec![fee_output(gft("0.000000289"), 101)], 100);
        assert_eq!(
            validate_raw(&storage, &validator, &tx),
            Err(CustodyFeeViolation::ComputationTimeInFuture.into())
        );
    }

    #[test]
    fn stale_computation_time_rejected() {
        let (_dir, storage) = storage_with_records(&[genesis_record()]);
        let validator = CustodyFeeValidator::new(120);
        // block 300, computed at 100: 200s lag, 80s over the window
        let tx = spend_tx(genesis_id(), vec![fee_output(gft("0.000000864"), 100)], 300);
        assert_eq!(
            validate_raw(&storage, &validator, &tx),
            Err(CustodyFeeViolation::ComputationTimeTooOld { excess: 80 }.into())
        );
    }

    #[test]
    fn spent_input_rejected() {
        let mut record = CoinOutputRecord::new_unspent(0, gft("10"), false);
        record.fee_computation_time = 50;
        let (_dir, storage) = storage_with_records(&[(genesis_id(), record)]);
        let validator = CustodyFeeValidator::new(120);
        let tx = spend_tx(genesis_id(), vec![fee_output(gft("0.000000289"), 100)], 100);
        assert_eq!(
            validate_raw(&storage, &validator, &tx),
            Err(CustodyFeeViolation::InputAlreadySpent(genesis_id()).into())
        );
    }

    #[test]
    fn spending_a_custody_fee_output_rejected() {
        let record = CoinOutputRecord::new_unspent(0, gft("10"), true);
        let (_dir, storage) = storage_with_records(&[(genesis_id(), record)]);
        let validator = CustodyFeeValidator::new(120);
        let tx = spend_tx(genesis_id(), vec![fee_output(gft("0.000000289"), 100)], 100);
        assert_eq!(
            validate_raw(&storage, &validator, &tx),
            Err(CustodyFeeViolation::SpendsCustodyFeeOutput(genesis_id()).into())
        );
    }

    #[test]
    fn wrong_fee_value_reports_expected() {
        let (_dir, storage) = storage_with_records(&[genesis_record()]);
        let validator = CustodyFeeValidator::new(120);
        let tx = spend_tx(genesis_id(), vec![fee_output(gft("0.000000288"), 100)], 100);
        assert_eq!(
            validate_raw(&storage, &validator, &tx),
            Err(CustodyFeeViolation::UnexpectedFeeValue {
                declared: gft("0.000000288"),
                expected: gft("0.000000289"),
            }
            .into())
        );
    }

    #[test]
    fn unknown_input_rejected() {
        let (_dir, storage) = storage_with_records(&[]);
        let validator = CustodyFeeValidator::new(120);
        let tx = spend_tx(genesis_id(), vec![fee_output(gft("0.000000289"), 100)], 100);
        assert!(matches!(
            validate_raw(&storage, &validator, &tx),
            Err(ValidationError::Rejected(_))
        ));
    }

    #[test]
    fn zero_age_inputs_need_zero_fee() {
        let (id, record) = genesis_record();
        let record = CoinOutputRecord { creation_time: 100, ..record };
        let (_dir, storage) = storage_with_records(&[(id, record)]);
        let validator = CustodyFeeValidator::new(120);
        // spent in the same second it was created: a zero-valued fee
        // output is required and accepted
        let tx = spend_tx(
            genesis_id(),
            vec![user_output(gft("10")), fee_output(Currency::zero(), 100)],
            100,
        );
        assert!(validate_raw(&storage, &validator, &tx).is_ok());
    }

    #[test]
    fn fee_sums_over_all_inputs() {
        let id_a = CoinOutputId::new([1u8; 32]);
        let id_b = CoinOutputId::new([2u8; 32]);
        let (_dir, storage) = storage_with_records(&[
            (id_a, CoinOutputRecord::new_unspent(0, gft("10"), false)),
            (id_b, CoinOutputRecord::new_unspent(0, gft("1000"), false)),
        ]);
        let validator = CustodyFeeValidator::new(120);
        // fees at 100s: 289 units + 28935 units
        let tx = ConsensusTransaction {
            transaction: Transaction {
                version: 1,
                coin_inputs: vec![
                    CoinInput { parent_id: id_a, ..Default::default() },
                    CoinInput { parent_id: id_b, ..Default::default() },
                ],
                coin_outputs: vec![
                    user_output(gft("1009.999970776")),
                    fee_output(gft("0.000029224"), 100),
                ],
                miner_fees: vec![],
                arbitrary_data: vec![],
            },
            block_height: 1,
            block_time: 100,
            sequence_id: 0,
        };
        assert!(validate_raw(&storage, &validator, &tx).is_ok());
    }

    #[test]
    fn zero_valued_outputs_only_allowed_for_custody_fees() {
        let ctx = TransactionValidationContext { block_height: 1, block_time: 100 };
        let fee_tx = ConsensusTransaction {
            transaction: Transaction {
                coin_outputs: vec![fee_output(Currency::zero(), 100)],
                ..Default::default()
            },
            block_height: 1,
            block_time: 100,
            sequence_id: 0,
        };
        assert!(validate_coin_outputs_are_valid(&fee_tx, &ctx).is_ok());

        let zero_tx = ConsensusTransaction {
            transaction: Transaction {
                coin_outputs: vec![user_output(Currency::zero())],
                ..Default::default()
            },
            block_height: 1,
            block_time: 100,
            sequence_id: 0,
        };
        assert_eq!(
            validate_coin_outputs_are_valid(&zero_tx, &ctx),
            Err(ValidationError::ZeroOutput)
        );
    }

    #[test]
    fn network_validator_sets_match() {
        assert_eq!(testnet_transaction_validators().len(), devnet_transaction_validators().len());
    }
}
