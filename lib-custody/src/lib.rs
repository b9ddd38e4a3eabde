//! The custody-fee core.
//!
//! Every coin output on this chain depreciates continuously from the moment
//! it is created; the depreciated portion is the custody fee, paid out to an
//! unspendable sink condition when the output is finally consumed. This
//! crate carries the three consensus-critical pieces: the deterministic
//! depreciation schedule, the ledger plugin tracking per-output age and
//! value, and the transaction validator enforcing exact fee payment.

pub mod calc;
pub mod condition;
pub mod plugin;
pub mod record;
pub mod validator;

pub use calc::{
    amount_custody_fee_pair_after_seconds, spendable_amount_after_seconds,
    MAX_CUSTODY_FEE_COMPUTE_DURATION,
};
pub use condition::{
    custody_fee_unlock_hash, register_condition, CustodyFeeCondition, CONDITION_TYPE_CUSTODY_FEE,
    UNLOCK_TYPE_CUSTODY_FEE,
};
pub use plugin::{CustodyFeesPlugin, CustodyFeeView, PLUGIN_DB_HEADER, PLUGIN_DB_VERSION};
pub use record::{CoinOutputInfo, CoinOutputInfoPreComputation, CoinOutputRecord};
pub use validator::{
    devnet_transaction_validators, testnet_transaction_validators, validate_coin_outputs_are_valid,
    CustodyFeeValidator, CustodyFeeViolation,
};
