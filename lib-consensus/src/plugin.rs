//! The consensus-plugin hook set.
//!
//! Plugins are a capability set the engine dispatches through, not a class
//! hierarchy. Every hook with an `apply` has an exact inverse `revert`, and
//! all hooks of one consensus change run inside a single write transaction
//! on the plugin's bucket.

use std::sync::Arc;

use lib_types::{CodecError, Decoder, Encoder};

use crate::change::{ConsensusBlock, ConsensusBlockHeader, ConsensusTransaction};
use crate::errors::PluginError;
use crate::storage::{BucketMut, PluginView};
use crate::validation::TransactionValidator;

/// Versioned identity of a plugin's persistent state. Stored alongside the
/// bucket; any mismatch at registration is fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginMetadata {
    pub header: String,
    pub version: String,
}

impl PluginMetadata {
    pub fn new(header: impl Into<String>, version: impl Into<String>) -> Self {
        Self { header: header.into(), version: version.into() }
    }

    pub fn encode(&self, enc: &mut Encoder) {
        enc.put_slice(self.header.as_bytes());
        enc.put_slice(self.version.as_bytes());
    }

    pub fn decode(dec: &mut Decoder<'_>) -> Result<Self, CodecError> {
        let header = String::from_utf8(dec.take_slice()?.to_vec())
            .map_err(|_| CodecError::InvalidLength)?;
        let version = String::from_utf8(dec.take_slice()?.to_vec())
            .map_err(|_| CodecError::InvalidLength)?;
        Ok(Self { header, version })
    }
}

pub trait ConsensusPlugin: Send + Sync {
    /// Called once at registration, outside the apply/revert stream.
    ///
    /// `metadata` is the stored header from a previous run (`None` on first
    /// start); the implementation must create its buckets on first start,
    /// reject foreign or wrong-version metadata with
    /// [`PluginError::CorruptStore`], and return the metadata to persist.
    /// `view` is the read capability the plugin keeps for its query API; it
    /// also doubles as the cancellation anchor — dropping every clone after
    /// [`ConsensusPlugin::close`] releases the store.
    fn init(
        &mut self,
        metadata: Option<PluginMetadata>,
        bucket: &BucketMut<'_>,
        view: Arc<dyn PluginView>,
    ) -> Result<PluginMetadata, PluginError>;

    fn apply_block(&self, block: &ConsensusBlock, bucket: &BucketMut<'_>)
        -> Result<(), PluginError>;

    fn apply_block_header(
        &self,
        header: &ConsensusBlockHeader,
        bucket: &BucketMut<'_>,
    ) -> Result<(), PluginError>;

    fn apply_transaction(
        &self,
        tx: &ConsensusTransaction,
        bucket: &BucketMut<'_>,
    ) -> Result<(), PluginError>;

    fn revert_block(&self, block: &ConsensusBlock, bucket: &BucketMut<'_>)
        -> Result<(), PluginError>;

    fn revert_block_header(
        &self,
        header: &ConsensusBlockHeader,
        bucket: &BucketMut<'_>,
    ) -> Result<(), PluginError>;

    fn revert_transaction(
        &self,
        tx: &ConsensusTransaction,
        bucket: &BucketMut<'_>,
    ) -> Result<(), PluginError>;

    /// The transaction validators this plugin contributes to the consensus
    /// validation pipeline.
    fn transaction_validators(&self) -> Vec<Arc<dyn TransactionValidator>>;

    /// Unregisters the plugin; the engine stops delivering hooks afterwards.
    fn close(&mut self);
}
