use lib_types::CodecError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExplorerError {
    #[error("explorer store is corrupt: {0}")]
    CorruptStore(String),

    #[error("storage failure: {0}")]
    Storage(String),

    #[error("consensus change carries no applied blocks")]
    NoAppliedBlocks,

    #[error("canonical decoding failed: {0}")]
    Codec(#[from] CodecError),
}
