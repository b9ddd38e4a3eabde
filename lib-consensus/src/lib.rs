//! The consensus boundary contract.
//!
//! The consensus engine itself lives outside this workspace; what lives
//! here is everything a consensus plugin needs to agree on with it: the
//! change-stream types, the plugin hook set, the persistent plugin storage
//! with its versioned header, and the transaction-validation context.

pub mod change;
pub mod errors;
pub mod plugin;
pub mod storage;
pub mod validation;
pub mod view;

pub use change::{ConsensusBlock, ConsensusBlockHeader, ConsensusChange, ConsensusChangeId, ConsensusTransaction};
pub use errors::PluginError;
pub use plugin::{ConsensusPlugin, PluginMetadata};
pub use storage::{
    create_sub_bucket, open_sub_bucket, open_sub_bucket_mut, BucketMut, BucketRead, BucketRef,
    BucketWrite, PluginStorage, PluginView, SubBucket, SubBucketMut,
};
pub use validation::{
    TransactionValidationContext, TransactionValidationFn, TransactionValidator, ValidationError,
};
pub use view::ChainView;
