//! # aspen-linking
//!
//! Discovers each contract's library dependencies from its bytecode and
//! computes a global deployment order in which every library precedes the
//! contracts that reference it.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

#[macro_use]
extern crate tracing;

use aspen_artifacts::ContractKey;

mod extract;
pub use extract::{extract_link_references, LinkReference, PLACEHOLDER_BYTE_LEN};

mod graph;
pub use graph::{populate_ordered_dependencies, DependencyGraph};

/// Errors that can occur while planning deployments.
#[derive(Debug, thiserror::Error)]
pub enum LinkerError {
    /// The dependency graph contains a cycle, so no valid deployment order
    /// exists. Carries every contract still unordered when planning stalled.
    #[error("unresolvable dependency cycle between contracts: {}", display_keys(keys))]
    CyclicDependencies { keys: Vec<ContractKey> },
}

fn display_keys(keys: &[ContractKey]) -> String {
    keys.iter().map(ContractKey::identifier).collect::<Vec<_>>().join(", ")
}
