//! The explorer's persistent layout.
//!
//! Tree names and key layouts are protocol for this database; changing them
//! orphans existing explorer state.
//!
//! - `Internal`: bookkeeping (`Metadata`, `BlockHeight`, `RecentChange`)
//! - `Metrics`: `ChainFacts` → the serialized aggregate
//! - `UnspentCoinOutputs`: coin output id → lock value (8 bytes LE)
//! - `SpentCoinOutputs`: same shape, entries moved here once consumed

use sled::Tree;
use tracing::warn;

use lib_consensus::ConsensusChangeId;
use lib_types::{
    CodecError, CoinOutput, CoinOutputId, Decoder, Encoder, TimeLockCondition,
    CONDITION_TYPE_TIME_LOCK,
};

use crate::errors::ExplorerError;
use crate::facts::ChainFacts;

pub(crate) const TREE_INTERNAL: &str = "Internal";
pub(crate) const TREE_METRICS: &str = "Metrics";
pub(crate) const TREE_UNSPENT_COIN_OUTPUTS: &str = "UnspentCoinOutputs";
pub(crate) const TREE_SPENT_COIN_OUTPUTS: &str = "SpentCoinOutputs";

pub(crate) const KEY_METADATA: &[u8] = b"Metadata";
pub(crate) const KEY_BLOCK_COUNT: &[u8] = b"BlockHeight";
pub(crate) const KEY_RECENT_CHANGE: &[u8] = b"RecentChange";
pub(crate) const KEY_CHAIN_FACTS: &[u8] = b"ChainFacts";

fn io(err: sled::Error) -> ExplorerError {
    ExplorerError::Storage(err.to_string())
}

fn encode_u64(value: u64) -> Vec<u8> {
    let mut enc = Encoder::new();
    enc.put_u64(value);
    enc.finish()
}

fn decode_u64(bytes: &[u8]) -> Result<u64, CodecError> {
    let mut dec = Decoder::new(bytes);
    let value = dec.take_u64()?;
    dec.finish()?;
    Ok(value)
}

/// The lock value of a fresh transaction output: the time-lock's value if
/// it carries one, `0` otherwise.
pub(crate) fn output_lock_value(output: &CoinOutput) -> u64 {
    if output.condition.condition_type() != CONDITION_TYPE_TIME_LOCK {
        return 0;
    }
    match output.condition.downcast_ref::<TimeLockCondition>() {
        Some(lock) => lock.lock_time,
        None => 0,
    }
}

pub(crate) fn get_block_count(internal: &Tree) -> Result<u64, ExplorerError> {
    match internal.get(KEY_BLOCK_COUNT).map_err(io)? {
        Some(raw) => Ok(decode_u64(&raw)?),
        None => Ok(0),
    }
}

pub(crate) fn set_block_count(internal: &Tree, count: u64) -> Result<(), ExplorerError> {
    internal.insert(KEY_BLOCK_COUNT, encode_u64(count)).map(drop).map_err(io)
}

pub(crate) fn get_recent_change(internal: &Tree) -> Result<ConsensusChangeId, ExplorerError> {
    match internal.get(KEY_RECENT_CHANGE).map_err(io)? {
        Some(raw) => {
            let mut dec = Decoder::new(&raw);
            let bytes = dec.take_bytes_32()?;
            dec.finish()?;
            Ok(ConsensusChangeId::new(bytes))
        }
        None => Ok(ConsensusChangeId::default()),
    }
}

pub(crate) fn set_recent_change(
    internal: &Tree,
    id: &ConsensusChangeId,
) -> Result<(), ExplorerError> {
    let mut enc = Encoder::new();
    enc.put_bytes_32(id.as_bytes());
    internal.insert(KEY_RECENT_CHANGE, enc.finish()).map(drop).map_err(io)
}

pub(crate) fn get_chain_facts(metrics: &Tree) -> Result<ChainFacts, ExplorerError> {
    match metrics.get(KEY_CHAIN_FACTS).map_err(io)? {
        Some(raw) => Ok(ChainFacts::from_bytes(&raw)?),
        None => Ok(ChainFacts::default()),
    }
}

pub(crate) fn set_chain_facts(metrics: &Tree, facts: &ChainFacts) -> Result<(), ExplorerError> {
    metrics.insert(KEY_CHAIN_FACTS, facts.to_bytes()).map(drop).map_err(io)
}

pub(crate) fn set_unspent(
    unspent: &Tree,
    id: &CoinOutputId,
    lock_value: u64,
) -> Result<(), ExplorerError> {
    unspent.insert(id.as_bytes(), encode_u64(lock_value)).map(drop).map_err(io)
}

pub(crate) fn delete_unspent(unspent: &Tree, id: &CoinOutputId) -> Result<(), ExplorerError> {
    if unspent.remove(id.as_bytes()).map_err(io)?.is_none() {
        warn!(%id, "deleting unknown unspent coin output");
    }
    Ok(())
}

/// Moves an entry `unspent → spent`. A missing source entry is logged and
/// replaced by a zero lock value; this store is advisory, not
/// authoritative.
pub(crate) fn mark_spent(
    unspent: &Tree,
    spent: &Tree,
    id: &CoinOutputId,
) -> Result<(), ExplorerError> {
    let lock_value = match unspent.remove(id.as_bytes()).map_err(io)? {
        Some(raw) => raw.to_vec(),
        None => {
            warn!(%id, "marking unknown coin output spent");
            encode_u64(0)
        }
    };
    spent.insert(id.as_bytes(), lock_value).map(drop).map_err(io)
}

/// Moves an entry back `spent → unspent` while unwinding a reverted block.
pub(crate) fn mark_unspent(
    unspent: &Tree,
    spent: &Tree,
    id: &CoinOutputId,
) -> Result<(), ExplorerError> {
    let lock_value = match spent.remove(id.as_bytes()).map_err(io)? {
        Some(raw) => raw.to_vec(),
        None => {
            warn!(%id, "reverting spend of unknown coin output");
            encode_u64(0)
        }
    };
    unspent.insert(id.as_bytes(), lock_value).map(drop).map_err(io)
}

/// Walks every unspent entry as `(id, lock_value)` pairs.
pub(crate) fn for_each_unspent(
    unspent: &Tree,
    mut f: impl FnMut(CoinOutputId, u64) -> Result<(), ExplorerError>,
) -> Result<(), ExplorerError> {
    for item in unspent.iter() {
        let (key, value) = item.map_err(io)?;
        let bytes: [u8; 32] = key
            .as_ref()
            .try_into()
            .map_err(|_| ExplorerError::CorruptStore("malformed unspent key".into()))?;
        f(CoinOutputId::new(bytes), decode_u64(&value)?)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_types::{
        Currency, UnlockConditionProxy, UnlockHash, UnlockHashCondition, UNLOCK_TYPE_PUBKEY,
    };

    #[test]
    fn lock_value_from_conditions() {
        let plain = CoinOutput::new(
            Currency::from_tokens(1),
            UnlockConditionProxy::new(UnlockHashCondition::new(UnlockHash::new(
                UNLOCK_TYPE_PUBKEY,
                [1u8; 32],
            ))),
        );
        assert_eq!(output_lock_value(&plain), 0);

        let locked = CoinOutput::new(
            Currency::from_tokens(1),
            UnlockConditionProxy::new(TimeLockCondition::new(
                600_000_000,
                UnlockConditionProxy::new(UnlockHashCondition::new(UnlockHash::new(
                    UNLOCK_TYPE_PUBKEY,
                    [1u8; 32],
                ))),
            )),
        );
        assert_eq!(output_lock_value(&locked), 600_000_000);
    }

    #[test]
    fn spent_moves_preserve_lock_values() {
        let dir = tempfile::tempdir().unwrap();
        let db = sled::open(dir.path()).unwrap();
        let unspent = db.open_tree(TREE_UNSPENT_COIN_OUTPUTS).unwrap();
        let spent = db.open_tree(TREE_SPENT_COIN_OUTPUTS).unwrap();

        let id = CoinOutputId::new([9u8; 32]);
        set_unspent(&unspent, &id, 42).unwrap();
        mark_spent(&unspent, &spent, &id).unwrap();
        assert!(unspent.get(id.as_bytes()).unwrap().is_none());

        mark_unspent(&unspent, &spent, &id).unwrap();
        assert!(spent.get(id.as_bytes()).unwrap().is_none());

        let mut seen = Vec::new();
        for_each_unspent(&unspent, |id, lock| {
            seen.push((id, lock));
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, vec![(id, 42)]);
    }
}
