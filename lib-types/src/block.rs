//! Blocks as the custody-fee subsystem sees them: a header with timestamp
//! and miner payouts, plus ordered transactions.

use crate::codec::Encoder;
use crate::currency::Currency;
use crate::primitives::{BlockId, CoinOutputId, Timestamp, UnlockHash};
use crate::transaction::Transaction;

const SPECIFIER_BLOCK: &[u8] = b"goldchain/block";
const SPECIFIER_MINER_PAYOUT: &[u8] = b"goldchain/miner payout";

/// A block-reward or fee payout carried in the block header. Payouts become
/// spendable coin outputs once the maturity delay has passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinerPayout {
    pub value: Currency,
    pub unlock_hash: UnlockHash,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlockHeader {
    pub parent_id: BlockId,
    pub timestamp: Timestamp,
    pub miner_payouts: Vec<MinerPayout>,
}

impl BlockHeader {
    fn encode(&self, enc: &mut Encoder) {
        self.parent_id.encode(enc);
        enc.put_u64(self.timestamp);
        enc.put_u64(self.miner_payouts.len() as u64);
        for payout in &self.miner_payouts {
            payout.value.encode(enc);
            payout.unlock_hash.encode(enc);
        }
    }

    /// Consensus hash of the canonical header encoding.
    pub fn id(&self) -> BlockId {
        let mut enc = Encoder::new();
        self.encode(&mut enc);
        let mut hasher = blake3::Hasher::new();
        hasher.update(SPECIFIER_BLOCK);
        hasher.update(&enc.finish());
        BlockId::new(hasher.finalize().into())
    }

    /// Coin-output id of the miner payout at `index`.
    pub fn miner_payout_id(&self, index: u64) -> CoinOutputId {
        let mut hasher = blake3::Hasher::new();
        hasher.update(SPECIFIER_MINER_PAYOUT);
        hasher.update(self.id().as_bytes());
        hasher.update(&index.to_le_bytes());
        CoinOutputId::new(hasher.finalize().into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn id(&self) -> BlockId {
        self.header.id()
    }

    pub fn miner_payout_id(&self, index: u64) -> CoinOutputId {
        self.header.miner_payout_id(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::UNLOCK_TYPE_PUBKEY;

    #[test]
    fn header_id_depends_on_contents() {
        let mut header = BlockHeader {
            parent_id: BlockId::zero(),
            timestamp: 1000,
            miner_payouts: vec![MinerPayout {
                value: Currency::from_units(10),
                unlock_hash: UnlockHash::new(UNLOCK_TYPE_PUBKEY, [1u8; 32]),
            }],
        };
        let id = header.id();
        assert_eq!(id, header.id());

        header.timestamp = 1001;
        assert_ne!(id, header.id());
    }

    #[test]
    fn miner_payout_ids_distinct_per_index() {
        let header = BlockHeader { parent_id: BlockId::zero(), timestamp: 5, miner_payouts: vec![] };
        assert_ne!(header.miner_payout_id(0), header.miner_payout_id(1));
    }
}
