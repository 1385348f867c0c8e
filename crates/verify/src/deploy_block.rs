//! Deploy-block forensics.
//!
//! Finds the first block at which an address holds code, by bisecting over
//! chain history with `code_at` point queries. Nodes prune old state, so a
//! "missing state" answer for a probed block is tolerated and treated as
//! pre-deployment evidence; every other failure aborts the search.

use crate::{ChainClient, ChainClientError};
use alloy_primitives::Address;

/// Failures of the deploy-block search. `Inconsistent` means the search's
/// own post-condition did not hold and indicates a defect here or a node
/// answering inconsistently, not bad input.
#[derive(Debug, thiserror::Error)]
pub enum DeployBlockError {
    #[error("no code at {address} at the latest block, the deploy block is undefined")]
    NoCodeAtLatest { address: Address },
    #[error("chain query for block {block} failed during bisection (left={left}, right={right})")]
    Probe {
        block: u64,
        left: u64,
        right: u64,
        #[source]
        source: ChainClientError,
    },
    #[error("bisection converged on block {block} but code presence does not change there")]
    Inconsistent { block: u64 },
    #[error(transparent)]
    Client(#[from] ChainClientError),
}

/// Locates the earliest block at which `address` holds non-empty code.
///
/// Maintains `left` (known or assumed empty, starting at genesis) and
/// `right` (known non-empty, starting at the latest block) and probes
/// midpoints until the two are adjacent, issuing O(log n) queries. The
/// result is checked to actually satisfy its defining property: code is
/// present at the returned block and absent at the one before.
pub fn find_deploy_block<C: ChainClient>(
    client: &C,
    address: Address,
) -> Result<u64, DeployBlockError> {
    let latest = client.latest_block_number()?;
    if client.code_at(address, latest)?.is_empty() {
        return Err(DeployBlockError::NoCodeAtLatest { address });
    }

    let mut left = 0u64;
    let mut right = latest;

    while left + 1 < right {
        let middle = left + (right - left) / 2;
        match client.code_at(address, middle) {
            Ok(code) if code.is_empty() => left = middle,
            Ok(_) => right = middle,
            Err(ChainClientError::MissingState { .. }) => {
                // Pruned history: the node can no longer answer for this
                // block, which for this search is evidence the deployment
                // happened no later than here.
                trace!(block = middle, "state pruned at probe, treating as pre-deployment");
                left = middle;
            }
            Err(source) => {
                return Err(DeployBlockError::Probe { block: middle, left, right, source });
            }
        }
    }

    // The answer must actually be the first block with code.
    if client.code_at(address, right)?.is_empty() {
        return Err(DeployBlockError::Inconsistent { block: right });
    }
    if right > 0 {
        match client.code_at(address, right - 1) {
            Ok(code) if !code.is_empty() => {
                return Err(DeployBlockError::Inconsistent { block: right });
            }
            // Pruned history below the answer still counts as empty.
            Ok(_) | Err(ChainClientError::MissingState { .. }) => {}
            Err(err) => return Err(err.into()),
        }
    }

    debug!(%address, block = right, "located deploy block");
    Ok(right)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, Bytes};
    use std::{cell::RefCell, ops::RangeInclusive};

    const TARGET: Address = address!("0x5a443704dd4b594b382c22a083e2bd3090a6fef3");

    /// Chain with code appearing at `deploy_block`, optionally with a range
    /// of blocks whose historical state has been pruned.
    struct MockChain {
        latest: u64,
        deploy_block: u64,
        pruned: Option<RangeInclusive<u64>>,
        probes: RefCell<Vec<u64>>,
    }

    impl MockChain {
        fn new(latest: u64, deploy_block: u64) -> Self {
            Self { latest, deploy_block, pruned: None, probes: RefCell::new(Vec::new()) }
        }

        fn with_pruned(mut self, pruned: RangeInclusive<u64>) -> Self {
            self.pruned = Some(pruned);
            self
        }
    }

    impl ChainClient for MockChain {
        fn latest_block_number(&self) -> Result<u64, ChainClientError> {
            Ok(self.latest)
        }

        fn code_at(&self, _address: Address, block: u64) -> Result<Bytes, ChainClientError> {
            self.probes.borrow_mut().push(block);
            if self.pruned.as_ref().is_some_and(|range| range.contains(&block)) {
                return Err(ChainClientError::MissingState { block });
            }
            if block >= self.deploy_block {
                Ok(Bytes::from_static(&[0x60, 0x60, 0x60, 0x40]))
            } else {
                Ok(Bytes::new())
            }
        }
    }

    #[test]
    fn finds_deploy_block() {
        let chain = MockChain::new(1000, 100);
        assert_eq!(find_deploy_block(&chain, TARGET).unwrap(), 100);
        // O(log n) plus the precondition fetch and the two confirmations.
        assert!(chain.probes.borrow().len() <= 14);
    }

    #[test]
    fn converges_despite_pruned_history() {
        let chain = MockChain::new(1000, 100).with_pruned(40..=60);
        assert_eq!(find_deploy_block(&chain, TARGET).unwrap(), 100);
    }

    #[test]
    fn pruned_blocks_adjacent_to_the_answer() {
        // Probes right below the deploy block keep failing with missing
        // state, including the post-search confirmation at block 99.
        let chain = MockChain::new(1000, 100).with_pruned(90..=99);
        assert_eq!(find_deploy_block(&chain, TARGET).unwrap(), 100);
        assert!(chain.probes.borrow().iter().any(|b| (90..=99).contains(b)));
    }

    #[test]
    fn finds_earliest_possible_block() {
        let chain = MockChain::new(1000, 1);
        assert_eq!(find_deploy_block(&chain, TARGET).unwrap(), 1);
    }

    #[test]
    fn genesis_code_fails_the_post_condition() {
        // Genesis is the assumed-empty lower bound; an address that already
        // has code at block 0 cannot satisfy the result invariant.
        let chain = MockChain::new(1000, 0);
        assert!(matches!(
            find_deploy_block(&chain, TARGET).unwrap_err(),
            DeployBlockError::Inconsistent { block: 1 }
        ));
    }

    #[test]
    fn empty_address_fails_fast() {
        let chain = MockChain::new(1000, 2000);
        assert!(matches!(
            find_deploy_block(&chain, TARGET).unwrap_err(),
            DeployBlockError::NoCodeAtLatest { .. }
        ));
        // Only the precondition probe ran.
        assert_eq!(chain.probes.borrow().as_slice(), &[1000]);
    }

    #[test]
    fn non_pruning_errors_abort_with_bounds() {
        struct FailingChain;

        impl ChainClient for FailingChain {
            fn latest_block_number(&self) -> Result<u64, ChainClientError> {
                Ok(1000)
            }

            fn code_at(&self, _address: Address, block: u64) -> Result<Bytes, ChainClientError> {
                if block == 1000 {
                    Ok(Bytes::from_static(&[0x60]))
                } else {
                    Err(ChainClientError::Backend("connection reset".into()))
                }
            }
        }

        let err = find_deploy_block(&FailingChain, TARGET).unwrap_err();
        let DeployBlockError::Probe { block, left, right, .. } = err else {
            panic!("expected probe failure, got {err}");
        };
        assert_eq!((block, left, right), (500, 0, 1000));
    }
}
