//! The consensus change stream as plugins and subscribers observe it.

use std::fmt;

use lib_types::{Block, BlockHeader, BlockHeight, CoinOutputId, Timestamp, Transaction};

/// Identifier of one consensus change, used by subscribers to resume.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ConsensusChangeId(pub [u8; 32]);

impl ConsensusChangeId {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for ConsensusChangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConsensusChangeId({})", hex::encode(&self.0[..8]))
    }
}

/// A block header as delivered to plugin header hooks: the header plus the
/// height consensus assigned to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsensusBlockHeader {
    pub header: BlockHeader,
    pub height: BlockHeight,
}

impl ConsensusBlockHeader {
    pub fn timestamp(&self) -> Timestamp {
        self.header.timestamp
    }

    pub fn miner_payout_id(&self, index: u64) -> CoinOutputId {
        self.header.miner_payout_id(index)
    }
}

/// A block as delivered to plugin block hooks.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConsensusBlock {
    pub block: Block,
    pub height: BlockHeight,
}

impl ConsensusBlock {
    pub fn timestamp(&self) -> Timestamp {
        self.block.header.timestamp
    }

    pub fn miner_payout_id(&self, index: u64) -> CoinOutputId {
        self.block.miner_payout_id(index)
    }

    pub fn consensus_header(&self) -> ConsensusBlockHeader {
        ConsensusBlockHeader { header: self.block.header.clone(), height: self.height }
    }

    /// Wraps the transaction at `sequence_id` with its block context.
    pub fn consensus_transaction(&self, sequence_id: u16) -> ConsensusTransaction {
        ConsensusTransaction {
            transaction: self.block.transactions[sequence_id as usize].clone(),
            block_height: self.height,
            block_time: self.block.header.timestamp,
            sequence_id,
        }
    }
}

/// A transaction with the block context hooks and validators need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsensusTransaction {
    pub transaction: Transaction,
    pub block_height: BlockHeight,
    pub block_time: Timestamp,
    pub sequence_id: u16,
}

/// One batch of chain movement. Reverted blocks are listed newest-first as
/// the engine unwinds them; applied blocks oldest-first. Subscribers must
/// process reverts before applies.
#[derive(Debug, Clone, Default)]
pub struct ConsensusChange {
    pub id: ConsensusChangeId,
    pub reverted_blocks: Vec<ConsensusBlock>,
    pub applied_blocks: Vec<ConsensusBlock>,
}
