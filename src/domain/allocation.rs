//! The set of allocated nodes for one run.

use std::collections::BTreeSet;

use crate::domain::error::{GraphError, GraphResult};
use crate::domain::graph::{NodeId, TreeGraph};
use crate::domain::moves::MoveKind;

/// Allocated nodes, always a single connected component containing the
/// class start.
///
/// Values are never mutated in place: [`Allocation::with_move`] returns a
/// fresh copy, so candidates never alias the current allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    start: NodeId,
    nodes: BTreeSet<NodeId>,
}

impl Allocation {
    /// Validate and wrap a starting allocation.
    ///
    /// The start node is always included. Every id must be known to the
    /// graph and reachable from the start through allocated nodes.
    pub fn new(
        graph: &TreeGraph,
        start: NodeId,
        nodes: impl IntoIterator<Item = NodeId>,
    ) -> GraphResult<Self> {
        graph.node(start)?;
        let mut set: BTreeSet<NodeId> = BTreeSet::new();
        set.insert(start);
        for id in nodes {
            graph.node(id)?;
            set.insert(id);
        }

        let reachable = graph.reachable_within(start, &set)?;
        if reachable.len() != set.len() {
            let unreachable = set.difference(&reachable).copied().collect();
            return Err(GraphError::DisconnectedAllocation { start, unreachable });
        }

        Ok(Self { start, nodes: set })
    }

    /// Allocation holding only the class start.
    pub fn root(graph: &TreeGraph, start: NodeId) -> GraphResult<Self> {
        Self::new(graph, start, std::iter::empty())
    }

    pub fn start(&self) -> NodeId {
        self.start
    }

    pub fn nodes(&self) -> &BTreeSet<NodeId> {
        &self.nodes
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Unallocated nodes adjacent to the allocation, ascending.
    pub fn frontier(&self, graph: &TreeGraph) -> GraphResult<BTreeSet<NodeId>> {
        let mut frontier = BTreeSet::new();
        for &id in &self.nodes {
            for &next in graph.neighbors(id)? {
                if !self.nodes.contains(&next) {
                    frontier.insert(next);
                }
            }
        }
        Ok(frontier)
    }

    /// Copy of this allocation with the move applied.
    ///
    /// The generator only emits connectivity-preserving moves; the copy is
    /// not re-validated here.
    pub fn with_move(&self, kind: &MoveKind) -> Self {
        let mut nodes = self.nodes.clone();
        match kind {
            MoveKind::Add { nodes: added } => {
                nodes.extend(added.iter().copied());
            }
            MoveKind::Respec { remove, add } => {
                nodes.remove(remove);
                nodes.insert(*add);
            }
        }
        Self {
            start: self.start,
            nodes,
        }
    }

    /// Full connectivity check against the graph.
    pub fn is_connected(&self, graph: &TreeGraph) -> GraphResult<bool> {
        if !self.nodes.contains(&self.start) {
            return Ok(false);
        }
        Ok(graph.reachable_within(self.start, &self.nodes)?.len() == self.nodes.len())
    }

    /// Sorted raw ids, as handed to scoring engines.
    pub fn to_ids(&self) -> Vec<u32> {
        self.nodes.iter().map(|id| id.0).collect()
    }
}
