//! Bytecode normalization and verification.
//!
//! solc embeds a swarm hash of the build metadata near the end of deployed
//! bytecode. The hash differs across otherwise-identical builds, so both
//! sides are masked with a same-length placeholder before comparison.

use crate::{ChainClient, ChainClientError};
use alloy_primitives::{hex, Address};
use regex::Regex;
use std::sync::LazyLock;

/// Fixed bytes that precede the embedded metadata hash.
pub const METADATA_HASH_PREFIX: &str = "a165627a7a72305820";
/// Fixed bytes that terminate the embedded metadata hash.
pub const METADATA_HASH_SUFFIX: &str = "0029";

/// The metadata-hash wrapper at the end of runtime bytecode: fixed prefix,
/// 64 hex digits of swarm hash, fixed suffix.
static METADATA_HASH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("{METADATA_HASH_PREFIX}[0-9a-fA-F]{{64}}{METADATA_HASH_SUFFIX}$")).unwrap()
});

/// Same-length stand-in for the matched wrapper, so masking never changes
/// the overall length of the code.
static METADATA_HASH_MASK: LazyLock<String> = LazyLock::new(|| {
    format!("{METADATA_HASH_PREFIX}<{:-^62}>{METADATA_HASH_SUFFIX}", "metadata-hash")
});

/// Verification failures, separated so callers can react differently to
/// "nothing deployed" and "wrong thing deployed". `Normalization` is a
/// defect in this crate itself, never a consequence of bad input.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("contract instances bound to an address cannot have empty expected bytecode")]
    EmptyExpected,
    #[error("no bytecode found at the given address")]
    NoCode,
    #[error(
        "bytecode on chain does not match the compiled bytecode:\n\
         - chain:    {actual}\n\
         - compiled: {expected}"
    )]
    Mismatch { expected: String, actual: String },
    #[error(
        "invariant violated: masking the metadata hash changed bytecode length:\n\
         - original:   {original}\n\
         - normalized: {normalized}"
    )]
    Normalization { original: String, normalized: String },
    #[error(transparent)]
    Client(#[from] ChainClientError),
}

/// Strips the `0x` prefix and masks the embedded metadata hash, if any.
fn normalize_bytecode(code: &str) -> Result<String, VerifyError> {
    let unprefixed = code.strip_prefix("0x").unwrap_or(code);
    let normalized = METADATA_HASH_RE.replace(unprefixed, METADATA_HASH_MASK.as_str());

    if normalized.len() != unprefixed.len() {
        return Err(VerifyError::Normalization {
            original: unprefixed.to_string(),
            normalized: normalized.into_owned(),
        });
    }

    Ok(normalized.into_owned())
}

/// Compares two hex bytecode strings, ignoring their embedded metadata
/// hashes. Differences anywhere else count.
pub fn compare_bytecode(left: &str, right: &str) -> Result<bool, VerifyError> {
    Ok(normalize_bytecode(left)? == normalize_bytecode(right)?)
}

/// Decides whether the code observed on chain is the compiled artifact.
///
/// Fails with [`VerifyError::EmptyExpected`] when the caller supplied no
/// expected bytecode, [`VerifyError::NoCode`] when nothing is deployed at
/// the address, and [`VerifyError::Mismatch`] (carrying both raw values)
/// when real code is there but differs.
pub fn verify_contract_bytecode(
    expected_bytecode: &str,
    chain_code: &str,
) -> Result<(), VerifyError> {
    if is_empty_code(expected_bytecode) {
        return Err(VerifyError::EmptyExpected);
    }
    if is_empty_code(chain_code) {
        return Err(VerifyError::NoCode);
    }
    if !compare_bytecode(expected_bytecode, chain_code)? {
        return Err(VerifyError::Mismatch {
            expected: expected_bytecode.to_string(),
            actual: chain_code.to_string(),
        });
    }
    Ok(())
}

/// Fetches the code currently at `address` and verifies it against the
/// compiled runtime bytecode.
pub fn verify_deployed<C: ChainClient>(
    client: &C,
    address: Address,
    expected_bytecode: &str,
) -> Result<(), VerifyError> {
    let latest = client.latest_block_number()?;
    let chain_code = client.code_at(address, latest)?;
    debug!(%address, block = latest, code_len = chain_code.len(), "fetched on-chain code");
    verify_contract_bytecode(expected_bytecode, &hex::encode_prefixed(&chain_code))
}

fn is_empty_code(code: &str) -> bool {
    matches!(code, "" | "0x")
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, Bytes};
    use similar_asserts::assert_eq;

    const RUNTIME: &str = "0x60606040525b600080fd";

    fn with_metadata_hash(code: &str, hash_digit: char) -> String {
        let hash: String = std::iter::repeat(hash_digit).take(64).collect();
        format!("{code}{METADATA_HASH_PREFIX}{hash}{METADATA_HASH_SUFFIX}")
    }

    #[test]
    fn mask_preserves_length() {
        assert_eq!(
            METADATA_HASH_MASK.len(),
            METADATA_HASH_PREFIX.len() + 64 + METADATA_HASH_SUFFIX.len()
        );
    }

    #[test]
    fn differing_metadata_hashes_compare_equal() {
        let left = with_metadata_hash(RUNTIME, 'a');
        let right = with_metadata_hash(RUNTIME, 'b');
        assert!(compare_bytecode(&left, &right).unwrap());

        // Prefixed and unprefixed spellings agree too.
        assert!(compare_bytecode(&left, right.strip_prefix("0x").unwrap()).unwrap());
    }

    #[test]
    fn differences_outside_the_hash_still_count() {
        let left = with_metadata_hash("0x60606040525b600080fd", 'a');
        let right = with_metadata_hash("0x60606040525b600080fe", 'a');
        assert!(!compare_bytecode(&left, &right).unwrap());
    }

    #[test]
    fn hash_wrapper_mid_code_is_not_masked() {
        // The wrapper pattern only counts at the very end of the code.
        let left = format!("{}60", with_metadata_hash(RUNTIME, 'a'));
        let right = format!("{}60", with_metadata_hash(RUNTIME, 'b'));
        assert!(!compare_bytecode(&left, &right).unwrap());
    }

    #[test]
    fn verify_accepts_rebuilt_bytecode() {
        let compiled = with_metadata_hash(RUNTIME, '1');
        let on_chain = with_metadata_hash(RUNTIME, 'f');
        verify_contract_bytecode(&compiled, &on_chain).unwrap();
    }

    #[test]
    fn empty_expected_is_a_programmer_error() {
        assert!(matches!(
            verify_contract_bytecode("0x", RUNTIME).unwrap_err(),
            VerifyError::EmptyExpected
        ));
    }

    #[test]
    fn empty_chain_code_is_no_code_not_mismatch() {
        assert!(matches!(
            verify_contract_bytecode(RUNTIME, "0x").unwrap_err(),
            VerifyError::NoCode
        ));
    }

    #[test]
    fn mismatch_reports_both_raw_values() {
        let err = verify_contract_bytecode(RUNTIME, "0xdeadbeef").unwrap_err();
        let VerifyError::Mismatch { expected, actual } = err else {
            panic!("expected mismatch, got {err}");
        };
        assert_eq!(expected, RUNTIME);
        assert_eq!(actual, "0xdeadbeef");
    }

    struct FixedCode(Bytes);

    impl ChainClient for FixedCode {
        fn latest_block_number(&self) -> Result<u64, ChainClientError> {
            Ok(7)
        }

        fn code_at(&self, _address: Address, _block: u64) -> Result<Bytes, ChainClientError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn verify_deployed_fetches_and_compares() {
        let code = Bytes::from(hex::decode(RUNTIME).unwrap());
        let client = FixedCode(code);
        let target = address!("0x5a443704dd4b594b382c22a083e2bd3090a6fef3");

        verify_deployed(&client, target, RUNTIME).unwrap();
        assert!(matches!(
            verify_deployed(&client, target, "0x6001").unwrap_err(),
            VerifyError::Mismatch { .. }
        ));

        let empty = FixedCode(Bytes::new());
        assert!(matches!(
            verify_deployed(&empty, target, RUNTIME).unwrap_err(),
            VerifyError::NoCode
        ));
    }
}
