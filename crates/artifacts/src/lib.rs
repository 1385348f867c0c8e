//! # aspen-artifacts
//!
//! Compiled contract records, keyed by `(source path, contract name)`, and
//! the registry that addresses them.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod key;
pub use key::{ContractKey, InvalidSymbolError, KEY_SEPARATOR};

mod record;
pub use record::{ContractRecord, LinkReferences, Offsets};

mod registry;
pub use registry::{ContractRegistry, RegistryError};
