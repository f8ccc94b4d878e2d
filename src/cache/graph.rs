//! Migration Graph Module
//!
//! Directed acyclic graph over schema versions, used to plan a shortest
//! sequence of upgrade steps between two versions.

use std::collections::HashMap;

use tracing::warn;

use crate::config::{Migration, UpgradeFn};

// == Migration Graph ==
/// Adjacency over upgrade edges restricted to a target version range.
///
/// Edges must satisfy `from < to`, which forbids cycles by construction;
/// malformed edges are dropped with a warning. Edges outside `[low, high]`
/// are discarded up front, so the search space is exactly the candidate
/// range.
pub struct MigrationGraph {
    /// Outgoing edges per version
    adjacency: HashMap<u32, Vec<(u32, UpgradeFn)>>,
}

impl MigrationGraph {
    // == Constructor ==
    /// Builds the candidate graph for an upgrade from `low` to `high`.
    pub fn build(migrations: &[Migration], low: u32, high: u32) -> Self {
        let mut adjacency: HashMap<u32, Vec<(u32, UpgradeFn)>> = HashMap::new();

        for edge in migrations {
            if edge.from >= edge.to {
                warn!(from = edge.from, to = edge.to, "dropping malformed migration edge");
                continue;
            }
            if edge.from < low || edge.to > high {
                continue;
            }
            adjacency
                .entry(edge.from)
                .or_default()
                .push((edge.to, edge.upgrade.clone()));
        }

        Self { adjacency }
    }

    // == Shortest Path ==
    /// Minimum-length sequence of upgrade payloads from `low` to `high`.
    ///
    /// Returns `None` when `high < low` or no path exists. Ties between
    /// equal-length paths resolve to the first one discovered.
    pub fn shortest_path(&self, low: u32, high: u32) -> Option<Vec<UpgradeFn>> {
        if high < low {
            return None;
        }

        let mut best: Option<Vec<UpgradeFn>> = None;
        let mut path: Vec<UpgradeFn> = Vec::new();
        self.search(low, high, &mut path, &mut best);
        best
    }

    fn search(
        &self,
        node: u32,
        target: u32,
        path: &mut Vec<UpgradeFn>,
        best: &mut Option<Vec<UpgradeFn>>,
    ) {
        if let Some(found) = best {
            // A path at least as long as the best cannot improve on it
            if path.len() >= found.len() {
                return;
            }
        }
        if node == target {
            *best = Some(path.clone());
            return;
        }

        let Some(edges) = self.adjacency.get(&node) else {
            return;
        };
        for (next, payload) in edges {
            path.push(payload.clone());
            self.search(*next, target, path, best);
            path.pop();
        }
    }
}
