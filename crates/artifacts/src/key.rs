use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{convert::Infallible, fmt, str::FromStr};

/// Separator between the source path and the contract name in the canonical
/// string form of a [`ContractKey`].
pub const KEY_SEPARATOR: char = ':';

/// The symbol of a [`ContractKey`] contains the reserved `:` separator.
#[derive(Debug, thiserror::Error)]
#[error("contract symbol `{0}` contains the reserved separator `:`")]
pub struct InvalidSymbolError(pub String);

/// Identifies a compiled contract as a `(source path, contract name)` pair.
///
/// The source path may be empty when the compiler did not report one. Keys
/// compare structurally; the canonical `"source:name"` string form exists
/// only for external representation and is produced by [`fmt::Display`].
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContractKey {
    /// Source file the contract was compiled from, e.g. `contracts/Math.sol`.
    /// Empty if unknown.
    pub source: String,
    /// Contract name, e.g. `Math`. Never contains `:`.
    pub name: String,
}

impl ContractKey {
    /// Creates a new key, rejecting names that contain the `:` separator.
    pub fn new(
        source: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<Self, InvalidSymbolError> {
        let name = name.into();
        if name.contains(KEY_SEPARATOR) {
            return Err(InvalidSymbolError(name));
        }
        Ok(Self { source: source.into(), name })
    }

    /// Creates a key with an empty source path.
    pub fn unsourced(name: impl Into<String>) -> Result<Self, InvalidSymbolError> {
        Self::new(String::new(), name.into())
    }

    /// Returns the canonical `"source:name"` identifier.
    pub fn identifier(&self) -> String {
        format!("{}{KEY_SEPARATOR}{}", self.source, self.name)
    }
}

impl fmt::Display for ContractKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{KEY_SEPARATOR}{}", self.source, self.name)
    }
}

impl FromStr for ContractKey {
    type Err = Infallible;

    /// Parses `"source:name"` or a bare `"name"`, splitting on the last `:`
    /// so that source paths containing `:` stay intact.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (source, name) = match s.rsplit_once(KEY_SEPARATOR) {
            Some((source, name)) => (source, name),
            None => ("", s),
        };
        Ok(Self { source: source.into(), name: name.into() })
    }
}

impl Serialize for ContractKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ContractKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(s.parse().unwrap())
    }
}
