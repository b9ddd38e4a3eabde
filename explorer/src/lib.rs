//! Custody-fee explorer: keeps chain-wide metrics about custody fees.
//!
//! The explorer subscribes to the same consensus change stream as the
//! plugin, but into its own database; losing or corrupting it never
//! endangers consensus. It tracks which coin outputs are unspent and their
//! lock values, and maintains the [`ChainFacts`] aggregate by consulting
//! the plugin's per-output valuations.

mod database;
mod errors;
mod facts;
mod update;

use std::path::Path;
use std::sync::Arc;

use sled::Tree;
use tracing::info;

use lib_consensus::{ConsensusChangeId, PluginMetadata};
use lib_custody::CustodyFeesPlugin;
use lib_types::ChainConstants;

pub use errors::ExplorerError;
pub use facts::ChainFacts;

use database::{
    get_block_count, get_chain_facts, get_recent_change, KEY_METADATA, TREE_INTERNAL,
    TREE_METRICS, TREE_SPENT_COIN_OUTPUTS, TREE_UNSPENT_COIN_OUTPUTS,
};

const EXPLORER_DB_HEADER: &str = "Custody Fee Explorer";
const EXPLORER_DB_VERSION: &str = "1.0.0";

pub struct Explorer {
    pub(crate) db: sled::Db,
    pub(crate) internal: Tree,
    pub(crate) metrics: Tree,
    pub(crate) unspent: Tree,
    pub(crate) spent: Tree,
    pub(crate) plugin: Arc<CustodyFeesPlugin>,
    pub(crate) constants: ChainConstants,
}

impl Explorer {
    /// Opens (or creates) the explorer database at `path`. A database
    /// written by anything else, or by another version, is rejected as
    /// corrupt.
    pub fn open(
        path: impl AsRef<Path>,
        plugin: Arc<CustodyFeesPlugin>,
        constants: ChainConstants,
    ) -> Result<Self, ExplorerError> {
        let db = sled::open(path).map_err(|e| ExplorerError::Storage(e.to_string()))?;
        let internal = open_tree(&db, TREE_INTERNAL)?;
        let metrics = open_tree(&db, TREE_METRICS)?;
        let unspent = open_tree(&db, TREE_UNSPENT_COIN_OUTPUTS)?;
        let spent = open_tree(&db, TREE_SPENT_COIN_OUTPUTS)?;

        check_metadata(&internal)?;

        info!(network = constants.network.as_str(), "custody fee explorer opened");
        Ok(Self { db, internal, metrics, unspent, spent, plugin, constants })
    }

    /// The last aggregated chain facts; zeroed until the first change is
    /// processed.
    pub fn latest_chain_facts(&self) -> Result<ChainFacts, ExplorerError> {
        get_chain_facts(&self.metrics)
    }

    /// Where to resume the consensus subscription after a restart.
    pub fn recent_change_id(&self) -> Result<ConsensusChangeId, ExplorerError> {
        get_recent_change(&self.internal)
    }

    /// Number of blocks currently folded into the explorer state.
    pub fn block_count(&self) -> Result<u64, ExplorerError> {
        get_block_count(&self.internal)
    }
}

fn open_tree(db: &sled::Db, name: &str) -> Result<Tree, ExplorerError> {
    db.open_tree(name).map_err(|e| ExplorerError::Storage(e.to_string()))
}

fn check_metadata(internal: &Tree) -> Result<(), ExplorerError> {
    match internal
        .get(KEY_METADATA)
        .map_err(|e| ExplorerError::Storage(e.to_string()))?
    {
        Some(raw) => {
            let mut dec = lib_types::Decoder::new(&raw);
            let metadata = PluginMetadata::decode(&mut dec)?;
            dec.finish()?;
            if metadata.header != EXPLORER_DB_HEADER || metadata.version != EXPLORER_DB_VERSION {
                return Err(ExplorerError::CorruptStore(format!(
                    "unexpected explorer database metadata: {:?} {:?}",
                    metadata.header, metadata.version
                )));
            }
            Ok(())
        }
        None => {
            let metadata = PluginMetadata::new(EXPLORER_DB_HEADER, EXPLORER_DB_VERSION);
            let mut enc = lib_types::Encoder::new();
            metadata.encode(&mut enc);
            internal
                .insert(KEY_METADATA, enc.finish())
                .map(drop)
                .map_err(|e| ExplorerError::Storage(e.to_string()))
        }
    }
}
