//! Link-reference extraction.
//!
//! A contract that calls into an external library carries a fixed-width
//! placeholder in its hex bytecode where the library's address belongs.
//! When the compiler reported placeholder locations structurally we trust
//! them; otherwise we scan the bytecode for the placeholder pattern and
//! match what we find against the known contract keys.

use aspen_artifacts::{ContractKey, ContractRecord};
use regex::Regex;
use std::sync::LazyLock;

/// Width of an address placeholder in bytes. Placeholders occupy the slot
/// the 20-byte library address will be linked into.
pub const PLACEHOLDER_BYTE_LEN: usize = 20;

/// Placeholder as it appears in hex bytecode: `__`, 36 characters of the
/// (possibly truncated) `source:Name` identifier padded with `_`, then `__`.
static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"__([A-Za-z0-9$./\\:_-]{36})__").unwrap());

/// A placeholder found in a contract's bytecode: where it sits and which
/// contract's address must be linked into it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkReference {
    /// Byte offset of the placeholder within the (unprefixed) bytecode.
    pub offset: usize,
    /// Placeholder width in bytes.
    pub length: usize,
    /// The referenced contract.
    pub key: ContractKey,
}

/// Extracts the link references embedded in a record's bytecode.
///
/// `candidates` is the full key space placeholders are matched against,
/// narrowed to the record's own `metadata.sources` files when the compiler
/// reported them. `runtime` selects the runtime bytecode variant.
///
/// A scanned placeholder that matches no candidate, or more than one, is
/// dropped rather than guessed; the compiler may legitimately emit
/// placeholders for things that are not project libraries.
pub fn extract_link_references(
    record: &ContractRecord,
    candidates: &[ContractKey],
    runtime: bool,
) -> Vec<LinkReference> {
    let (bytecode, structured) = if runtime {
        (record.bytecode_runtime.as_deref(), record.link_references_runtime.as_ref())
    } else {
        (record.bytecode.as_deref(), record.link_references.as_ref())
    };

    // The compiler's own analysis wins over scanning.
    if let Some(refs) = structured {
        return refs
            .iter()
            .flat_map(|(file, libs)| {
                libs.iter().flat_map(|(name, offsets)| {
                    let key = ContractKey { source: file.clone(), name: name.clone() };
                    offsets.iter().map(move |o| LinkReference {
                        offset: o.start as usize,
                        length: o.length as usize,
                        key: key.clone(),
                    })
                })
            })
            .collect();
    }

    let Some(bytecode) = bytecode else { return Vec::new() };

    let sources = record.metadata_sources();
    let narrowed: Vec<&ContractKey> = match &sources {
        Some(sources) => candidates
            .iter()
            .filter(|key| key.source.is_empty() || sources.contains(&key.source))
            .collect(),
        None => candidates.iter().collect(),
    };

    scan_placeholders(bytecode, &narrowed)
}

/// Scans hex bytecode for placeholder patterns and resolves each against
/// the candidate set.
fn scan_placeholders(bytecode: &str, candidates: &[&ContractKey]) -> Vec<LinkReference> {
    let unprefixed = bytecode.strip_prefix("0x").unwrap_or(bytecode);

    PLACEHOLDER_RE
        .find_iter(unprefixed)
        .filter_map(|found| {
            let key = resolve_placeholder(found.as_str(), candidates)?;
            Some(LinkReference {
                offset: found.start() / 2,
                length: PLACEHOLDER_BYTE_LEN,
                key: key.clone(),
            })
        })
        .collect()
}

/// Matches one placeholder against the candidate keys.
///
/// The embedded text is the `source:Name` identifier (or a bare name),
/// truncated to 36 characters and padded with `_`. An identifier that fits
/// entirely must match a candidate exactly; one that fills all 36 characters
/// may have been cut off and matches candidates by prefix.
fn resolve_placeholder<'a>(
    placeholder: &str,
    candidates: &[&'a ContractKey],
) -> Option<&'a ContractKey> {
    let interior = placeholder.trim_matches('_');
    let truncated = interior.len() == 2 * PLACEHOLDER_BYTE_LEN - 4;

    let matches: Vec<&ContractKey> = candidates
        .iter()
        .copied()
        .filter(|key| {
            if truncated {
                return key.identifier().starts_with(interior) || key.name.starts_with(interior);
            }
            match interior.rsplit_once(':') {
                Some((path, name)) => {
                    key.name == name && (key.source.is_empty() || key.source == path)
                }
                None => key.name == interior,
            }
        })
        .collect();

    match matches.as_slice() {
        [] => {
            debug!(placeholder = interior, "link placeholder matched no known contract, dropping");
            None
        }
        [only] => Some(only),
        _ => {
            debug!(
                placeholder = interior,
                matches = %matches.len(),
                "link placeholder is ambiguous across candidates, dropping"
            );
            None
        }
    }
}
