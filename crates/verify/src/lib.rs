//! # aspen-verify
//!
//! Confirms deployment results: compares compiled bytecode against what
//! actually lives on chain, masking the compiler's non-deterministic
//! metadata hash, and locates the block at which a contract first appeared.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

#[macro_use]
extern crate tracing;

mod client;
pub use client::{ChainClient, ChainClientError};

mod bytecode;
pub use bytecode::{compare_bytecode, verify_contract_bytecode, verify_deployed, VerifyError};

mod deploy_block;
pub use deploy_block::{find_deploy_block, DeployBlockError};
