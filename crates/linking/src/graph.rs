//! Dependency graph construction and deploy-order planning.

use crate::{extract::extract_link_references, LinkerError};
use aspen_artifacts::{ContractKey, ContractRegistry};
use std::collections::{BTreeMap, BTreeSet};

/// One-hop dependency graph: contract -> contracts it directly references
/// through unresolved library placeholders in its bytecode.
///
/// Built fresh per compilation pass and never mutated afterwards.
#[derive(Clone, Debug, Default)]
pub struct DependencyGraph {
    edges: BTreeMap<ContractKey, BTreeSet<ContractKey>>,
}

impl DependencyGraph {
    /// Builds the shallow graph for every contract in the registry that has
    /// linkable bytecode. Interfaces and abstract contracts have none and
    /// simply do not appear.
    pub fn build(registry: &ContractRegistry) -> Self {
        let candidates: Vec<ContractKey> = registry.keys().cloned().collect();

        let mut edges = BTreeMap::new();
        for (key, record) in registry.iter() {
            if record.linkable_bytecode().is_none() {
                continue;
            }

            let mut deps = BTreeSet::new();
            for reference in extract_link_references(record, &candidates, false) {
                // Structured references carry compiler-spelled keys; resolve
                // them back to the stored key so graph nodes are canonical.
                match registry.resolve(&reference.key) {
                    Ok(resolved) => {
                        deps.insert(resolved);
                    }
                    Err(err) => {
                        debug!(
                            contract = %key,
                            reference = %reference.key,
                            %err,
                            "dropping link reference that does not resolve to a known contract"
                        );
                    }
                }
            }
            edges.insert(key.clone(), deps);
        }

        Self { edges }
    }

    /// Direct dependencies of `key`. Contracts absent from the graph have
    /// none.
    pub fn direct_dependencies(&self, key: &ContractKey) -> BTreeSet<ContractKey> {
        self.edges.get(key).cloned().unwrap_or_default()
    }

    /// The full transitive dependency set of `key`.
    ///
    /// Worklist-driven so a malformed cyclic graph terminates instead of
    /// recursing forever; a revisited contract is already included and is
    /// not re-expanded.
    pub fn transitive_dependencies(&self, key: &ContractKey) -> BTreeSet<ContractKey> {
        let mut visited = BTreeSet::new();
        let mut worklist: Vec<ContractKey> = self.direct_dependencies(key).into_iter().collect();

        while let Some(dep) = worklist.pop() {
            if visited.insert(dep.clone()) {
                if let Some(next) = self.edges.get(&dep) {
                    worklist.extend(next.iter().cloned());
                }
            }
        }

        visited
    }

    /// Computes a global deployment order over every contract appearing in
    /// the graph, dependencies first.
    ///
    /// Ties between independent contracts break lexicographically on the
    /// canonical key string, so the order is reproducible across runs. A
    /// cycle makes a total order impossible and fails with the contracts
    /// that could not be ordered.
    pub fn deploy_order(&self) -> Result<Vec<ContractKey>, LinkerError> {
        // Nodes are edge sources plus every referenced dependency.
        let mut pending: BTreeMap<ContractKey, usize> = BTreeMap::new();
        let mut dependents: BTreeMap<ContractKey, Vec<ContractKey>> = BTreeMap::new();

        for (key, deps) in &self.edges {
            pending.entry(key.clone()).or_insert(0);
            for dep in deps {
                pending.entry(dep.clone()).or_insert(0);
                *pending.get_mut(key).unwrap() += 1;
                dependents.entry(dep.clone()).or_default().push(key.clone());
            }
        }

        let mut ready: BTreeSet<ContractKey> = pending
            .iter()
            .filter_map(|(key, &count)| (count == 0).then(|| key.clone()))
            .collect();

        let mut order = Vec::with_capacity(pending.len());
        while let Some(next) = ready.pop_first() {
            pending.remove(&next);
            if let Some(waiting) = dependents.get(&next) {
                for dependent in waiting {
                    let count = pending.get_mut(dependent).unwrap();
                    *count -= 1;
                    if *count == 0 {
                        ready.insert(dependent.clone());
                    }
                }
            }
            order.push(next);
        }

        if !pending.is_empty() {
            return Err(LinkerError::CyclicDependencies {
                keys: pending.into_keys().collect(),
            });
        }

        Ok(order)
    }
}

/// Runs the deploy planner over a whole registry.
///
/// Builds the shallow graph, computes the global deploy order, and writes
/// each record's `ordered_dependencies`: the subsequence of the global order
/// restricted to that contract's transitive closure. This is the single
/// post-construction mutation the registry sees.
///
/// Returns the global order for callers that deploy everything at once.
pub fn populate_ordered_dependencies(
    registry: &mut ContractRegistry,
) -> Result<Vec<ContractKey>, LinkerError> {
    let graph = DependencyGraph::build(registry);
    let order = graph.deploy_order()?;

    let closures: BTreeMap<ContractKey, BTreeSet<ContractKey>> = registry
        .keys()
        .map(|key| (key.clone(), graph.transitive_dependencies(key)))
        .collect();

    for (key, record) in registry.iter_mut() {
        let closure = &closures[key];
        record.ordered_dependencies =
            order.iter().filter(|dep| closure.contains(*dep)).cloned().collect();
        trace!(contract = %key, deps = record.ordered_dependencies.len(), "planned dependencies");
    }

    Ok(order)
}
