use crate::ContractKey;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Location of a link-reference placeholder inside a bytecode object, in
/// bytes, as reported by solc standard-json output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offsets {
    pub start: u32,
    pub length: u32,
}

/// Structured link references as emitted by the compiler:
/// source file -> library name -> placeholder locations.
pub type LinkReferences = BTreeMap<String, BTreeMap<String, Vec<Offsets>>>;

/// A single compiled contract, as handed over by the compilation step.
///
/// Bytecode fields are `0x`-prefixed hex strings and may contain unresolved
/// link-reference placeholders. `ordered_dependencies` stays empty until the
/// deploy planner populates it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ContractRecord {
    /// Deploy-time (creation) bytecode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytecode: Option<String>,
    /// Runtime bytecode, the code that lives at the deployed address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytecode_runtime: Option<String>,
    /// Contract ABI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abi: Option<Value>,
    /// Compiler-emitted metadata, either as a JSON object or the raw JSON
    /// string solc embeds in combined-json output. Absent for interfaces and
    /// abstract contracts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    /// Link references for the creation bytecode, when the compiler reported
    /// them structurally.
    #[serde(default, rename = "linkrefs", skip_serializing_if = "Option::is_none")]
    pub link_references: Option<LinkReferences>,
    /// Link references for the runtime bytecode.
    #[serde(default, rename = "linkrefs_runtime", skip_serializing_if = "Option::is_none")]
    pub link_references_runtime: Option<LinkReferences>,
    /// The contract's transitive dependencies in deployable order. Written
    /// once by the deploy planner.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ordered_dependencies: Vec<ContractKey>,
}

impl ContractRecord {
    /// Returns the creation bytecode if it is present and holds actual code.
    pub fn linkable_bytecode(&self) -> Option<&str> {
        self.bytecode.as_deref().filter(|code| !is_empty_bytecode(code))
    }

    /// Returns the compiler metadata as a JSON object, parsing it first if
    /// the compiler emitted it as an embedded JSON string.
    pub fn metadata_object(&self) -> Option<Map<String, Value>> {
        match self.metadata.as_ref()? {
            Value::Object(map) => Some(map.clone()),
            Value::String(raw) => serde_json::from_str::<Value>(raw)
                .ok()
                .and_then(|value| value.as_object().cloned()),
            _ => None,
        }
    }

    /// The source path the compiler actually compiled this contract from,
    /// taken from `metadata.settings.compilationTarget`. This is the
    /// authoritative path when the contract key carries an empty source.
    pub fn compilation_target(&self) -> Option<String> {
        let metadata = self.metadata_object()?;
        let target = metadata.get("settings")?.get("compilationTarget")?.as_object()?;
        if target.len() != 1 {
            return None;
        }
        target.keys().next().cloned()
    }

    /// Source files named in the contract's own metadata, used to narrow
    /// link-reference candidates to symbols the contract can actually see.
    pub fn metadata_sources(&self) -> Option<Vec<String>> {
        let metadata = self.metadata_object()?;
        Some(metadata.get("sources")?.as_object()?.keys().cloned().collect())
    }
}

/// Returns `true` for the values solc emits when a contract has no code of
/// its own, e.g. interfaces and abstract contracts.
pub(crate) fn is_empty_bytecode(code: &str) -> bool {
    matches!(code, "" | "0x")
}
