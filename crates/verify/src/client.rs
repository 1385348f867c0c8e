use alloy_primitives::{Address, Bytes};

/// Failure classes for a single chain query.
///
/// `MissingState` is raised when the node has pruned the historical state
/// needed to answer a point-in-time query; callers decide whether that is
/// tolerable. Everything else is `Backend`.
#[derive(Debug, thiserror::Error)]
pub enum ChainClientError {
    #[error("historical state for block {block} is unavailable on this node")]
    MissingState { block: u64 },
    #[error("chain query failed: {0}")]
    Backend(String),
}

/// Point-query capability against a chain node.
///
/// Each call is a single blocking request-response; retry and backoff for
/// transient failures belong to the caller, not to this crate.
pub trait ChainClient {
    /// The latest block number known to the node.
    fn latest_block_number(&self) -> Result<u64, ChainClientError>;

    /// The code stored at `address` as of `block`. Empty bytes mean nothing
    /// is deployed there at that block.
    fn code_at(&self, address: Address, block: u64) -> Result<Bytes, ChainClientError>;
}
