//! The custody-fee consensus plugin.
//!
//! Owns the `coinoutputs` bucket: one [`CoinOutputRecord`] per coin output
//! the chain has ever created, whether by miner payout or transaction
//! output. Apply hooks insert records and mark consumed outputs spent;
//! revert hooks are their exact inverse, so applying and reverting a block
//! leaves the bucket byte-identical.
//!
//! Within a transaction, outputs are inserted before inputs are marked
//! spent, so even a self-referencing transaction observes consistent
//! state. Reverts run in the opposite order.

use std::sync::{Arc, OnceLock};

use tracing::{debug, info};

use lib_consensus::{
    create_sub_bucket, open_sub_bucket, open_sub_bucket_mut, BucketMut, BucketRead, BucketRef,
    ConsensusBlock, ConsensusBlockHeader, ConsensusPlugin, ConsensusTransaction, PluginError,
    PluginMetadata, PluginView, TransactionValidator,
};
use lib_types::{
    CoinOutputId, ConditionRegistry, Currency, CustodyFeeConfig, Timestamp,
};

use crate::calc::amount_custody_fee_pair_after_seconds;
use crate::condition::{register_condition, CONDITION_TYPE_CUSTODY_FEE};
use crate::record::{CoinOutputInfo, CoinOutputInfoPreComputation, CoinOutputRecord};
use crate::validator::CustodyFeeValidator;

pub const PLUGIN_DB_HEADER: &str = "custodyFeePlugin";
pub const PLUGIN_DB_VERSION: &str = "1.0.0.0";

/// The plugin's single sub-bucket: coin output id → record.
const BUCKET_COIN_OUTPUTS: &str = "coinoutputs";

pub(crate) fn read_record(
    bucket: &dyn BucketRead,
    id: &CoinOutputId,
) -> Result<CoinOutputRecord, PluginError> {
    let outputs = open_sub_bucket(bucket, BUCKET_COIN_OUTPUTS)?;
    let raw = outputs
        .get(id.as_bytes())?
        .ok_or_else(|| PluginError::NotFound(format!("no record for coin output {id}")))?;
    Ok(CoinOutputRecord::from_bytes(&raw)?)
}

/// Projects a record onto a concrete chain time.
///
/// Spent records compute over their stored fee-computation time; unspent
/// records over the requested chain time, which must not precede creation.
pub(crate) fn compute_info(
    record: &CoinOutputRecord,
    chain_time: Timestamp,
) -> Result<CoinOutputInfo, PluginError> {
    if record.is_custody_fee {
        // permanently retired value: nothing spendable, no further fees
        return Ok(CoinOutputInfo {
            creation_time: record.creation_time,
            creation_value: record.creation_value.clone(),
            is_custody_fee: true,
            spent: false,
            fee_computation_time: record.fee_computation_time,
            custody_fee: Currency::zero(),
            spendable_value: Currency::zero(),
        });
    }
    let spent = record.spent();
    let fee_computation_time = if spent {
        record.fee_computation_time
    } else {
        if chain_time < record.creation_time {
            return Err(PluginError::InvalidInput(format!(
                "chain time {chain_time} precedes the coin output's creation time {}",
                record.creation_time
            )));
        }
        chain_time
    };
    let age = fee_computation_time
        .checked_sub(record.creation_time)
        .ok_or_else(|| {
            PluginError::CorruptStore(format!(
                "record spent at {} before its creation at {}",
                record.fee_computation_time, record.creation_time
            ))
        })?;
    let (spendable_value, custody_fee) = if age == 0 {
        (record.creation_value.clone(), Currency::zero())
    } else {
        amount_custody_fee_pair_after_seconds(&record.creation_value, age)
    };
    Ok(CoinOutputInfo {
        creation_time: record.creation_time,
        creation_value: record.creation_value.clone(),
        is_custody_fee: false,
        spent,
        fee_computation_time,
        custody_fee,
        spendable_value,
    })
}

/// Consistent multi-lookup read view over the ledger.
pub struct CustodyFeeView<'a> {
    bucket: &'a BucketRef<'a>,
}

impl CustodyFeeView<'_> {
    pub fn pre_computation(
        &self,
        id: &CoinOutputId,
    ) -> Result<CoinOutputInfoPreComputation, PluginError> {
        Ok(read_record(self.bucket, id)?.into())
    }

    pub fn info(
        &self,
        id: &CoinOutputId,
        chain_time: Timestamp,
    ) -> Result<CoinOutputInfo, PluginError> {
        compute_info(&read_record(self.bucket, id)?, chain_time)
    }

    pub fn creation_time(&self, id: &CoinOutputId) -> Result<Timestamp, PluginError> {
        Ok(read_record(self.bucket, id)?.creation_time)
    }
}

pub struct CustodyFeesPlugin {
    config: CustodyFeeConfig,
    validator: Arc<CustodyFeeValidator>,
    view: OnceLock<Arc<dyn PluginView>>,
}

impl CustodyFeesPlugin {
    /// Creates the plugin and registers the custody-fee condition type with
    /// the protocol-layer registry.
    pub fn new(registry: &mut ConditionRegistry, config: CustodyFeeConfig) -> Self {
        assert!(
            config.max_allowed_computation_time_advance > 0,
            "max allowed computation time advance must be greater than zero"
        );
        register_condition(registry);
        Self {
            validator: Arc::new(CustodyFeeValidator::new(
                config.max_allowed_computation_time_advance,
            )),
            config,
            view: OnceLock::new(),
        }
    }

    pub fn config(&self) -> &CustodyFeeConfig {
        &self.config
    }

    fn require_view(&self) -> Result<&Arc<dyn PluginView>, PluginError> {
        self.view
            .get()
            .ok_or_else(|| PluginError::Storage("custody fee plugin is not registered".into()))
    }

    /// Runs `f` inside one read snapshot, so many ids can be queried
    /// consistently.
    pub fn view<T>(
        &self,
        f: impl FnOnce(&CustodyFeeView<'_>) -> Result<T, PluginError>,
    ) -> Result<T, PluginError> {
        let storage = self.require_view()?;
        let mut body = Some(f);
        let mut out: Option<Result<T, PluginError>> = None;
        storage.view_raw(&mut |bucket| {
            let f = body.take().expect("view body runs once per snapshot");
            out = Some(f(&CustodyFeeView { bucket }));
            Ok(())
        })?;
        out.expect("view body ran")
    }

    /// The stored record for `id`, without fee arithmetic.
    pub fn get_coin_output_info_pre_computation(
        &self,
        id: &CoinOutputId,
    ) -> Result<CoinOutputInfoPreComputation, PluginError> {
        self.view(|view| view.pre_computation(id))
    }

    /// The record for `id` with its custody fee computed at `chain_time`.
    pub fn get_coin_output_info(
        &self,
        id: &CoinOutputId,
        chain_time: Timestamp,
    ) -> Result<CoinOutputInfo, PluginError> {
        self.view(|view| view.info(id, chain_time))
    }

    /// Creation timestamp of `id`, the cheap wallet-facing lookup.
    pub fn get_coin_output_creation_time(
        &self,
        id: &CoinOutputId,
    ) -> Result<Timestamp, PluginError> {
        self.view(|view| view.creation_time(id))
    }

    fn apply_transaction_inner(
        &self,
        tx: &ConsensusTransaction,
        bucket: &BucketMut<'_>,
    ) -> Result<(), PluginError> {
        // the bucket check comes first: a missing bucket is corrupt-store
        // no matter what the transaction carries
        let outputs = open_sub_bucket_mut(bucket, BUCKET_COIN_OUTPUTS)?;
        let transaction = &tx.transaction;
        // outputs first: a consumed output created by this very transaction
        // must already be observable below
        for (index, co) in transaction.coin_outputs.iter().enumerate() {
            let id = transaction.coin_output_id(index as u64);
            let record = CoinOutputRecord::new_unspent(
                tx.block_time,
                co.value.clone(),
                co.condition.condition_type() == CONDITION_TYPE_CUSTODY_FEE,
            );
            outputs.put(id.as_bytes(), record.to_bytes())?;
        }
        for ci in &transaction.coin_inputs {
            let raw = outputs.get(ci.parent_id.as_bytes())?.ok_or_else(|| {
                PluginError::NotFound(format!(
                    "spent coin output {} has no record",
                    ci.parent_id
                ))
            })?;
            let mut record = CoinOutputRecord::from_bytes(&raw)?;
            record.fee_computation_time = tx.block_time;
            outputs.put(ci.parent_id.as_bytes(), record.to_bytes())?;
        }
        Ok(())
    }

    fn revert_transaction_inner(
        &self,
        tx: &ConsensusTransaction,
        bucket: &BucketMut<'_>,
    ) -> Result<(), PluginError> {
        let outputs = open_sub_bucket_mut(bucket, BUCKET_COIN_OUTPUTS)?;
        let transaction = &tx.transaction;
        // exact inverse of apply: clear the spent marks, then drop the
        // records this transaction created
        for ci in &transaction.coin_inputs {
            let raw = outputs.get(ci.parent_id.as_bytes())?.ok_or_else(|| {
                PluginError::NotFound(format!(
                    "reverted coin input {} has no record",
                    ci.parent_id
                ))
            })?;
            let mut record = CoinOutputRecord::from_bytes(&raw)?;
            record.fee_computation_time = 0;
            outputs.put(ci.parent_id.as_bytes(), record.to_bytes())?;
        }
        for index in 0..transaction.coin_outputs.len() {
            let id = transaction.coin_output_id(index as u64);
            outputs.delete(id.as_bytes())?;
        }
        Ok(())
    }
}

impl ConsensusPlugin for CustodyFeesPlugin {
    fn init(
        &mut self,
        metadata: Option<PluginMetadata>,
        bucket: &BucketMut<'_>,
        view: Arc<dyn PluginView>,
    ) -> Result<PluginMetadata, PluginError> {
        match metadata {
            None => {
                create_sub_bucket(bucket, BUCKET_COIN_OUTPUTS)?;
                debug!("created custody fee coin outputs bucket");
            }
            Some(metadata) => {
                if metadata.header != PLUGIN_DB_HEADER {
                    return Err(PluginError::CorruptStore(format!(
                        "unexpected plugin header {:?}",
                        metadata.header
                    )));
                }
                if metadata.version != PLUGIN_DB_VERSION {
                    return Err(PluginError::CorruptStore(format!(
                        "there is only one version of this plugin, got {:?}",
                        metadata.version
                    )));
                }
            }
        }
        let _ = self.view.set(view);
        Ok(PluginMetadata::new(PLUGIN_DB_HEADER, PLUGIN_DB_VERSION))
    }

    fn apply_block(
        &self,
        block: &ConsensusBlock,
        bucket: &BucketMut<'_>,
    ) -> Result<(), PluginError> {
        self.apply_block_header(&block.consensus_header(), bucket)?;
        for sequence_id in 0..block.block.transactions.len() {
            self.apply_transaction_inner(&block.consensus_transaction(sequence_id as u16), bucket)?;
        }
        Ok(())
    }

    fn apply_block_header(
        &self,
        header: &ConsensusBlockHeader,
        bucket: &BucketMut<'_>,
    ) -> Result<(), PluginError> {
        let outputs = open_sub_bucket_mut(bucket, BUCKET_COIN_OUTPUTS)?;
        for (index, payout) in header.header.miner_payouts.iter().enumerate() {
            let id = header.miner_payout_id(index as u64);
            let record =
                CoinOutputRecord::new_unspent(header.timestamp(), payout.value.clone(), false);
            outputs.put(id.as_bytes(), record.to_bytes())?;
        }
        Ok(())
    }

    fn apply_transaction(
        &self,
        tx: &ConsensusTransaction,
        bucket: &BucketMut<'_>,
    ) -> Result<(), PluginError> {
        self.apply_transaction_inner(tx, bucket)
    }

    fn revert_block(
        &self,
        block: &ConsensusBlock,
        bucket: &BucketMut<'_>,
    ) -> Result<(), PluginError> {
        for sequence_id in (0..block.block.transactions.len()).rev() {
            self.revert_transaction_inner(
                &block.consensus_transaction(sequence_id as u16),
                bucket,
            )?;
        }
        self.revert_block_header(&block.consensus_header(), bucket)
    }

    fn revert_block_header(
        &self,
        header: &ConsensusBlockHeader,
        bucket: &BucketMut<'_>,
    ) -> Result<(), PluginError> {
        let outputs = open_sub_bucket_mut(bucket, BUCKET_COIN_OUTPUTS)?;
        for index in 0..header.header.miner_payouts.len() {
            outputs.delete(header.miner_payout_id(index as u64).as_bytes())?;
        }
        Ok(())
    }

    fn revert_transaction(
        &self,
        tx: &ConsensusTransaction,
        bucket: &BucketMut<'_>,
    ) -> Result<(), PluginError> {
        self.revert_transaction_inner(tx, bucket)
    }

    fn transaction_validators(&self) -> Vec<Arc<dyn TransactionValidator>> {
        vec![self.validator.clone()]
    }

    fn close(&mut self) {
        info!("custody fee plugin closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_types::Currency;

    fn record(creation_time: Timestamp, value: u64, fee_time: Timestamp) -> CoinOutputRecord {
        CoinOutputRecord {
            creation_time,
            creation_value: Currency::from_tokens(value),
            fee_computation_time: fee_time,
            is_custody_fee: false,
        }
    }

    #[test]
    fn info_for_unspent_record_uses_requested_time() {
        let info = compute_info(&record(0, 100, 0), 86_400).unwrap();
        assert!(!info.spent);
        assert_eq!(info.fee_computation_time, 86_400);
        assert_eq!(info.spendable_value, Currency::from_token_str("99.9975").unwrap());
        assert_eq!(info.custody_fee, Currency::from_token_str("0.0025").unwrap());
    }

    #[test]
    fn info_for_spent_record_ignores_requested_time() {
        let info = compute_info(&record(0, 100, 86_400), 999_999_999).unwrap();
        assert!(info.spent);
        assert_eq!(info.fee_computation_time, 86_400);
        assert_eq!(info.spendable_value, Currency::from_token_str("99.9975").unwrap());
    }

    #[test]
    fn info_with_zero_age_is_free() {
        let info = compute_info(&record(500, 100, 0), 500).unwrap();
        assert_eq!(info.spendable_value, Currency::from_tokens(100));
        assert!(info.custody_fee.is_zero());
    }

    #[test]
    fn info_rejects_time_before_creation() {
        let err = compute_info(&record(500, 100, 0), 499).unwrap_err();
        assert!(matches!(err, PluginError::InvalidInput(_)));
    }

    #[test]
    fn info_for_custody_fee_record_is_all_zero() {
        let record = CoinOutputRecord {
            creation_time: 10,
            creation_value: Currency::from_tokens(2_500),
            fee_computation_time: 0,
            is_custody_fee: true,
        };
        let info = compute_info(&record, 999_999).unwrap();
        assert!(info.is_custody_fee);
        assert!(!info.spent);
        assert!(info.spendable_value.is_zero());
        assert!(info.custody_fee.is_zero());
    }

    #[test]
    fn corrupt_spent_record_detected() {
        // fee computed before creation cannot come from any valid chain
        let err = compute_info(&record(1_000, 100, 999), 2_000).unwrap_err();
        assert!(matches!(err, PluginError::CorruptStore(_)));
    }
}
