//! Read-only chain state, the HTTP layer's window into consensus.

use lib_types::{BlockHeight, Timestamp};

/// What the read API needs from the consensus engine: the tip height and
/// block timestamps by height. Implemented by the engine; mocked in tests.
pub trait ChainView: Send + Sync {
    fn height(&self) -> BlockHeight;

    /// Timestamp of the block at `height`, `None` past the tip.
    fn block_time_at(&self, height: BlockHeight) -> Option<Timestamp>;

    /// Timestamp of the current tip.
    fn tip_time(&self) -> Option<Timestamp> {
        self.block_time_at(self.height())
    }
}
