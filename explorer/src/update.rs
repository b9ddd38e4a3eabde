//! The consensus-change walk.
//!
//! Reverted blocks are unwound first, then applied blocks are folded in,
//! and finally the three liquid totals are recomputed from scratch over
//! every unspent output. The full walk is O(|unspent|) per change, which is
//! acceptable operator-side. Unexpected state is logged and skipped rather
//! than aborting: this aggregate is advisory, never authoritative.

use tracing::{debug, warn};

use lib_consensus::ConsensusChange;
use lib_types::{CoinOutputId, Currency, Timestamp, LOCK_TIME_MIN_TIMESTAMP};

use crate::database::{
    delete_unspent, for_each_unspent, get_block_count, get_chain_facts, mark_spent, mark_unspent,
    output_lock_value, set_block_count, set_chain_facts, set_recent_change, set_unspent,
};
use crate::errors::ExplorerError;
use crate::Explorer;

fn subtract_or_zero(total: &mut Currency, amount: &Currency, what: &str) {
    match total.checked_sub(amount) {
        Some(remaining) => *total = remaining,
        None => {
            warn!(%amount, %total, "{what} underflowed while reverting, clamping to zero");
            *total = Currency::zero();
        }
    }
}

impl Explorer {
    /// Folds one consensus change into the explorer state. Reverts are
    /// processed before applies, mirroring the plugin.
    pub fn process_consensus_change(&self, cc: &ConsensusChange) -> Result<(), ExplorerError> {
        let tip = cc.applied_blocks.last().ok_or(ExplorerError::NoAppliedBlocks)?;
        let chain_height = tip.height;
        let chain_time = tip.timestamp();

        let mut block_count = get_block_count(&self.internal)?;
        block_count = block_count
            .saturating_sub(cc.reverted_blocks.len() as u64)
            .saturating_add(cc.applied_blocks.len() as u64);

        let mut facts = get_chain_facts(&self.metrics)?;

        // unwind reverted blocks; remember which spends disappeared, with
        // the timestamp the fee was computed at back then
        let mut reverted_spends: Vec<(CoinOutputId, Timestamp)> = Vec::new();
        for block in &cc.reverted_blocks {
            // transactions unwind newest-first so a chained spend within
            // the block is undone before the output it consumed disappears
            for tx in block.block.transactions.iter().rev() {
                for ci in &tx.coin_inputs {
                    mark_unspent(&self.unspent, &self.spent, &ci.parent_id)?;
                    reverted_spends.push((ci.parent_id, block.timestamp()));
                }
                for index in 0..tx.coin_outputs.len() {
                    delete_unspent(&self.unspent, &tx.coin_output_id(index as u64))?;
                }
            }
            for index in 0..block.block.header.miner_payouts.len() {
                delete_unspent(&self.unspent, &block.miner_payout_id(index as u64))?;
            }
        }

        // fold in applied blocks
        let mut applied_spends: Vec<(CoinOutputId, Timestamp)> = Vec::new();
        for block in &cc.applied_blocks {
            for index in 0..block.block.header.miner_payouts.len() {
                set_unspent(
                    &self.unspent,
                    &block.miner_payout_id(index as u64),
                    block.height + self.constants.maturity_delay,
                )?;
            }
            for tx in &block.block.transactions {
                for ci in &tx.coin_inputs {
                    mark_spent(&self.unspent, &self.spent, &ci.parent_id)?;
                    applied_spends.push((ci.parent_id, block.timestamp()));
                }
                for (index, co) in tx.coin_outputs.iter().enumerate() {
                    set_unspent(
                        &self.unspent,
                        &tx.coin_output_id(index as u64),
                        output_lock_value(co),
                    )?;
                }
            }
        }

        // a reverted spend's record is no longer addressable as spent; its
        // valuation at the reverted block's time is what apply added
        for (id, time) in &reverted_spends {
            match self.plugin.get_coin_output_info(id, *time) {
                Ok(info) => {
                    subtract_or_zero(&mut facts.spent_tokens, &info.spendable_value, "spent tokens");
                    subtract_or_zero(
                        &mut facts.paid_custody_fees,
                        &info.custody_fee,
                        "paid custody fees",
                    );
                }
                Err(err) => warn!(%id, %err, "cannot value reverted spend, skipping"),
            }
        }
        for (id, time) in &applied_spends {
            match self.plugin.get_coin_output_info(id, *time) {
                Ok(info) => {
                    facts.spent_tokens += &info.spendable_value;
                    facts.paid_custody_fees += &info.custody_fee;
                }
                Err(err) => warn!(%id, %err, "cannot value applied spend, skipping"),
            }
        }

        // recompute the liquid totals from every unspent output
        facts.spendable_tokens = Currency::zero();
        facts.spendable_locked_tokens = Currency::zero();
        facts.total_custody_fee_debt = Currency::zero();
        for_each_unspent(&self.unspent, |id, lock_value| {
            let unlocked = lock_value == 0
                || if lock_value < LOCK_TIME_MIN_TIMESTAMP {
                    chain_height >= lock_value
                } else {
                    chain_time >= lock_value
                };
            match self.plugin.get_coin_output_info(&id, chain_time) {
                Ok(info) => {
                    facts.total_custody_fee_debt += &info.custody_fee;
                    if unlocked {
                        facts.spendable_tokens += &info.spendable_value;
                    } else {
                        facts.spendable_locked_tokens += &info.spendable_value;
                    }
                }
                Err(err) => warn!(%id, %err, "cannot value unspent coin output, skipping"),
            }
            Ok(())
        })?;

        facts.height = chain_height;
        facts.time = chain_time;

        set_chain_facts(&self.metrics, &facts)?;
        set_block_count(&self.internal, block_count)?;
        set_recent_change(&self.internal, &cc.id)?;
        self.db
            .flush()
            .map_err(|e| ExplorerError::Storage(e.to_string()))?;
        debug!(
            height = facts.height,
            time = facts.time,
            reverted = cc.reverted_blocks.len(),
            applied = cc.applied_blocks.len(),
            "processed consensus change"
        );
        Ok(())
    }
}
