use crate::{key::InvalidSymbolError, ContractKey, ContractRecord};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

/// Errors raised when constructing or addressing a [`ContractRegistry`].
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error(transparent)]
    InvalidSymbol(#[from] InvalidSymbolError),
    #[error("no contract found for key `{query}`")]
    NotFound { query: String },
    #[error("multiple contracts found for key `{query}`, disambiguate with a source path: {}", display_keys(matches))]
    Ambiguous { query: String, matches: Vec<ContractKey> },
}

fn display_keys(keys: &[ContractKey]) -> String {
    keys.iter().map(ContractKey::identifier).collect::<Vec<_>>().join(", ")
}

/// Addressable collection of compiled contracts, keyed by
/// `(source path, contract name)`.
///
/// Built once per compilation pass from compiler output. Lookups accept an
/// exact key, a bare contract name, or a `"source:name"` string; a partial
/// lookup that matches more than one stored contract is an error, never a
/// silent first-match. The only post-construction mutation is the deploy
/// planner attaching `ordered_dependencies` to each record.
#[derive(Clone, Debug, Default)]
pub struct ContractRegistry {
    contracts: BTreeMap<ContractKey, ContractRecord>,
}

impl ContractRegistry {
    /// Creates a registry from compiler output, validating every key.
    pub fn new(
        contracts: impl IntoIterator<Item = (ContractKey, ContractRecord)>,
    ) -> Result<Self, RegistryError> {
        let contracts: BTreeMap<_, _> = contracts.into_iter().collect();
        for key in contracts.keys() {
            if key.name.contains(crate::KEY_SEPARATOR) {
                return Err(InvalidSymbolError(key.name.clone()).into());
            }
        }
        Ok(Self { contracts })
    }

    /// Resolves a possibly-partial key to the unique stored key it addresses.
    ///
    /// Exact structural matches win. Otherwise the key matches on contract
    /// name alone, with the source path compared only when both the query
    /// and the stored key carry one.
    pub fn resolve(&self, key: &ContractKey) -> Result<ContractKey, RegistryError> {
        if self.contracts.contains_key(key) {
            return Ok(key.clone());
        }

        let mut matches: Vec<ContractKey> = self
            .contracts
            .keys()
            .filter(|stored| {
                stored.name == key.name
                    && (key.source.is_empty()
                        || stored.source.is_empty()
                        || stored.source == key.source)
            })
            .cloned()
            .collect();

        match matches.len() {
            0 => Err(RegistryError::NotFound { query: key.identifier() }),
            1 => Ok(matches.remove(0)),
            _ => Err(RegistryError::Ambiguous { query: key.identifier(), matches }),
        }
    }

    /// Resolves a `"source:name"` or bare `"name"` string query.
    pub fn resolve_str(&self, query: &str) -> Result<ContractKey, RegistryError> {
        let key: ContractKey = query.parse().unwrap();
        self.resolve(&key)
    }

    /// Looks up the record addressed by `key`, which may be partial.
    pub fn get(&self, key: &ContractKey) -> Result<&ContractRecord, RegistryError> {
        let key = self.resolve(key)?;
        Ok(&self.contracts[&key])
    }

    /// Looks up the record addressed by a string query.
    pub fn get_str(&self, query: &str) -> Result<&ContractRecord, RegistryError> {
        self.get(&query.parse::<ContractKey>().unwrap())
    }

    /// Mutable lookup, used by the deploy planner's single write-back.
    pub fn get_mut(&mut self, key: &ContractKey) -> Result<&mut ContractRecord, RegistryError> {
        let key = self.resolve(key)?;
        Ok(self.contracts.get_mut(&key).unwrap())
    }

    /// Returns whether any stored key matches the query.
    pub fn contains(&self, key: &ContractKey) -> bool {
        self.resolve(key).is_ok()
    }

    pub fn keys(&self) -> impl Iterator<Item = &ContractKey> {
        self.contracts.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ContractKey, &ContractRecord)> {
        self.contracts.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&ContractKey, &mut ContractRecord)> {
        self.contracts.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }

    /// Renders the registry in its canonical external form, keyed by the
    /// `"source:name"` identifier string.
    pub fn to_canonical(&self) -> BTreeMap<String, ContractRecord> {
        self.contracts.iter().map(|(key, record)| (key.identifier(), record.clone())).collect()
    }

    /// Rebuilds a registry from its canonical external form. Round-trip safe
    /// as long as no contract name contains the `:` separator.
    pub fn from_canonical(
        canonical: BTreeMap<String, ContractRecord>,
    ) -> Result<Self, RegistryError> {
        Self::new(
            canonical.into_iter().map(|(key, record)| (key.parse::<ContractKey>().unwrap(), record)),
        )
    }
}

impl Serialize for ContractRegistry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.contracts.iter().map(|(k, v)| (k.identifier(), v)))
    }
}

impl<'de> Deserialize<'de> for ContractRegistry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let canonical = BTreeMap::<String, ContractRecord>::deserialize(deserializer)?;
        Self::from_canonical(canonical).map_err(serde::de::Error::custom)
    }
}
