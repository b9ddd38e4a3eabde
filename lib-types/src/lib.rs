//! Canonical protocol types for the goldchain custody-fee subsystem.
//!
//! Rule: no String identifiers in consensus state. Ever.
//!
//! Everything that crosses the consensus boundary — ids, amounts, unlock
//! conditions, the binary wire layout — is defined here and nowhere else.
//! Other crates import these definitions; they never re-declare them.

pub mod block;
pub mod codec;
pub mod conditions;
pub mod config;
pub mod currency;
pub mod primitives;
pub mod transaction;

pub use block::{Block, BlockHeader, MinerPayout};
pub use codec::{CodecError, Decoder, Encoder};
pub use conditions::{
    ConditionError, ConditionRegistry, ConditionType, FulfillContext, NilCondition,
    TimeLockCondition, UnlockCondition, UnlockConditionProxy, UnlockFulfillment,
    UnlockHashCondition, CONDITION_TYPE_NIL, CONDITION_TYPE_TIME_LOCK,
    CONDITION_TYPE_UNLOCK_HASH,
};
pub use config::{
    ChainConstants, CustodyFeeConfig, NetworkName, LOCK_TIME_MIN_TIMESTAMP, TOKEN_PRECISION,
};
pub use currency::Currency;
pub use primitives::{
    BlockHeight, BlockId, CoinOutputId, Timestamp, TransactionId, UnlockHash, UnlockType,
    UNLOCK_TYPE_NIL, UNLOCK_TYPE_PUBKEY,
};
pub use transaction::{CoinInput, CoinOutput, Transaction};
