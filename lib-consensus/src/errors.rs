//! Plugin-facing error kinds.
//!
//! `CorruptStore` is fatal: a node observing it must abort rather than risk
//! consensus divergence. `NotFound` is a plain lookup miss and non-fatal.
//! `Storage` aborts the surrounding write transaction, which the consensus
//! engine re-raises.

use lib_types::CodecError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PluginError {
    #[error("plugin store is corrupt: {0}")]
    CorruptStore(String),

    #[error("storage failure: {0}")]
    Storage(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid request: {0}")]
    InvalidInput(String),

    #[error("canonical decoding failed: {0}")]
    Codec(#[from] CodecError),
}

impl PluginError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, PluginError::CorruptStore(_))
    }
}
