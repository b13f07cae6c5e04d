//! Immutable passive tree graph and connectivity queries.
//!
//! The graph is built once through [`TreeGraphBuilder`] and then shared
//! read-only (typically as `Arc<TreeGraph>`) by any number of runs.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::domain::error::{GraphError, GraphResult};

/// Identifier of a passive node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for NodeId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

/// Node category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    #[default]
    Normal,
    Notable,
    Keystone,
    Mastery,
}

impl NodeKind {
    /// Notables and keystones are the high-value targets travel nodes lead to.
    pub fn is_high_value(self) -> bool {
        matches!(self, NodeKind::Notable | NodeKind::Keystone)
    }
}

/// A passive node: stat tags with magnitudes, category and layout position.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    /// Stat tag -> magnitude granted when allocated
    pub stats: BTreeMap<String, f64>,
    pub position: (f32, f32),
}

impl Node {
    pub fn new(id: impl Into<NodeId>, kind: NodeKind) -> Self {
        let id = id.into();
        Self {
            id,
            name: format!("node-{}", id),
            kind,
            stats: BTreeMap::new(),
            position: (0.0, 0.0),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_stat(mut self, tag: impl Into<String>, value: f64) -> Self {
        self.stats.insert(tag.into(), value);
        self
    }

    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position = (x, y);
        self
    }
}

/// Number of distinct shortest paths reaching a node, saturated at two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathCount {
    One,
    Many,
}

/// Bounded BFS result for one reached node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathInfo {
    /// Hops from the nearest seed (seeds are at 0)
    pub distance: usize,
    pub count: PathCount,
    /// Predecessor on the shortest path; only tracked while the path is unique
    pub via: Option<NodeId>,
}

/// Immutable node/edge graph with per-class start nodes.
#[derive(Debug, Clone)]
pub struct TreeGraph {
    nodes: BTreeMap<NodeId, Node>,
    adjacency: BTreeMap<NodeId, BTreeSet<NodeId>>,
    class_starts: BTreeMap<String, NodeId>,
}

impl TreeGraph {
    pub fn builder() -> TreeGraphBuilder {
        TreeGraphBuilder::new()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node(&self, id: NodeId) -> GraphResult<&Node> {
        self.nodes.get(&id).ok_or(GraphError::UnknownNode(id))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn classes(&self) -> impl Iterator<Item = (&str, NodeId)> {
        self.class_starts.iter().map(|(c, id)| (c.as_str(), *id))
    }

    /// Adjacent node ids, in ascending order.
    pub fn neighbors(&self, id: NodeId) -> GraphResult<&BTreeSet<NodeId>> {
        self.adjacency.get(&id).ok_or(GraphError::UnknownNode(id))
    }

    pub fn class_start(&self, class: &str) -> GraphResult<NodeId> {
        self.class_starts
            .get(class)
            .copied()
            .ok_or_else(|| GraphError::UnknownClass(class.to_string()))
    }

    /// True if `candidate` is adjacent to any node of `allocated`.
    ///
    /// Adding such a node to a connected set keeps it connected, so no
    /// traversal is needed.
    pub fn is_reachable_through(
        &self,
        allocated: &BTreeSet<NodeId>,
        candidate: NodeId,
    ) -> GraphResult<bool> {
        Ok(self
            .neighbors(candidate)?
            .iter()
            .any(|n| allocated.contains(n)))
    }

    /// Nodes of `within` reachable from `start` without leaving `within`.
    #[instrument(level = "trace", skip(self, within))]
    pub fn reachable_within(
        &self,
        start: NodeId,
        within: &BTreeSet<NodeId>,
    ) -> GraphResult<BTreeSet<NodeId>> {
        let mut seen = BTreeSet::new();
        if !within.contains(&start) {
            return Ok(seen);
        }
        let mut queue = VecDeque::new();
        seen.insert(start);
        queue.push_back(start);

        while let Some(current) = queue.pop_front() {
            for &next in self.neighbors(current)? {
                if within.contains(&next) && seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        Ok(seen)
    }

    /// Whether every node reachable from `start` in `allocated` stays
    /// reachable once `removed` is taken out.
    ///
    /// Removing the start node itself never keeps the allocation connected.
    pub fn remains_connected_after_removal(
        &self,
        start: NodeId,
        allocated: &BTreeSet<NodeId>,
        removed: NodeId,
    ) -> GraphResult<bool> {
        self.node(removed)?;
        if removed == start {
            return Ok(false);
        }
        let before = self.reachable_within(start, allocated)?;
        if !before.contains(&removed) {
            return Ok(true);
        }

        let mut remaining = allocated.clone();
        remaining.remove(&removed);
        let after = self.reachable_within(start, &remaining)?;
        Ok(after.len() == before.len() - 1)
    }

    /// Multi-seed BFS bounded to `max_depth` hops, counting shortest paths.
    ///
    /// Only nodes for which `passable` holds are entered. Seeds sit at
    /// distance 0 with a single path each.
    pub fn shortest_paths_within<F>(
        &self,
        seeds: &BTreeSet<NodeId>,
        max_depth: usize,
        passable: F,
    ) -> GraphResult<BTreeMap<NodeId, PathInfo>>
    where
        F: Fn(NodeId) -> bool,
    {
        let mut info: BTreeMap<NodeId, PathInfo> = BTreeMap::new();
        let mut queue = VecDeque::new();
        for &seed in seeds {
            self.node(seed)?;
            info.insert(
                seed,
                PathInfo {
                    distance: 0,
                    count: PathCount::One,
                    via: None,
                },
            );
            queue.push_back(seed);
        }

        while let Some(current) = queue.pop_front() {
            let here = info[&current];
            if here.distance >= max_depth {
                continue;
            }
            for &next in self.neighbors(current)? {
                if !passable(next) {
                    continue;
                }
                match info.get_mut(&next) {
                    None => {
                        info.insert(
                            next,
                            PathInfo {
                                distance: here.distance + 1,
                                count: here.count,
                                via: Some(current),
                            },
                        );
                        queue.push_back(next);
                    }
                    Some(existing) if existing.distance == here.distance + 1 => {
                        existing.count = PathCount::Many;
                        existing.via = None;
                    }
                    Some(_) => {}
                }
            }
        }
        Ok(info)
    }
}

/// Constructs a validated [`TreeGraph`].
///
/// Edge endpoints and class starts are checked when `build` is called, so
/// nodes and edges may be added in any order.
#[derive(Debug, Default)]
pub struct TreeGraphBuilder {
    nodes: BTreeMap<NodeId, Node>,
    edges: Vec<(NodeId, NodeId)>,
    class_starts: BTreeMap<String, NodeId>,
    duplicate: Option<NodeId>,
}

impl TreeGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(mut self, node: Node) -> Self {
        self.add_node(node);
        self
    }

    pub fn edge(mut self, a: impl Into<NodeId>, b: impl Into<NodeId>) -> Self {
        self.add_edge(a, b);
        self
    }

    pub fn class_start(mut self, class: impl Into<String>, id: impl Into<NodeId>) -> Self {
        self.add_class_start(class, id);
        self
    }

    pub fn add_node(&mut self, node: Node) {
        let id = node.id;
        if self.nodes.insert(id, node).is_some() && self.duplicate.is_none() {
            self.duplicate = Some(id);
        }
    }

    pub fn add_edge(&mut self, a: impl Into<NodeId>, b: impl Into<NodeId>) {
        self.edges.push((a.into(), b.into()));
    }

    pub fn add_class_start(&mut self, class: impl Into<String>, id: impl Into<NodeId>) {
        self.class_starts.insert(class.into(), id.into());
    }

    #[instrument(level = "debug", skip(self), fields(nodes = self.nodes.len(), edges = self.edges.len()))]
    pub fn build(self) -> GraphResult<TreeGraph> {
        if let Some(id) = self.duplicate {
            return Err(GraphError::DuplicateNode(id));
        }

        let mut adjacency: BTreeMap<NodeId, BTreeSet<NodeId>> = self
            .nodes
            .keys()
            .map(|&id| (id, BTreeSet::new()))
            .collect();

        for (from, to) in self.edges {
            if from == to {
                return Err(GraphError::InvalidEdge {
                    from,
                    to,
                    reason: "self-loop".to_string(),
                });
            }
            for end in [from, to] {
                if !self.nodes.contains_key(&end) {
                    return Err(GraphError::InvalidEdge {
                        from,
                        to,
                        reason: format!("unknown endpoint {}", end),
                    });
                }
            }
            adjacency.entry(from).or_default().insert(to);
            adjacency.entry(to).or_default().insert(from);
        }

        for &start in self.class_starts.values() {
            if !self.nodes.contains_key(&start) {
                return Err(GraphError::UnknownNode(start));
            }
        }

        Ok(TreeGraph {
            nodes: self.nodes,
            adjacency,
            class_starts: self.class_starts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    //  start - 1 - 2
    //    |     |   |
    //    3 --- 5   |
    //    |         |
    //    +-------- 4
    fn ring() -> TreeGraph {
        TreeGraph::builder()
            .node(Node::new(0, NodeKind::Normal))
            .node(Node::new(1, NodeKind::Normal))
            .node(Node::new(2, NodeKind::Normal))
            .node(Node::new(3, NodeKind::Normal))
            .node(Node::new(4, NodeKind::Notable))
            .node(Node::new(5, NodeKind::Keystone))
            .edge(0, 1)
            .edge(1, 2)
            .edge(2, 4)
            .edge(0, 3)
            .edge(3, 4)
            .edge(1, 5)
            .edge(3, 5)
            .class_start("witch", 0)
            .build()
            .unwrap()
    }

    fn set(ids: &[u32]) -> BTreeSet<NodeId> {
        ids.iter().map(|&i| NodeId(i)).collect()
    }

    #[test]
    fn given_ring_when_removing_node_then_cycle_keeps_connectivity() {
        let graph = ring();
        let allocated = set(&[0, 1, 2, 3, 4]);
        assert!(graph
            .remains_connected_after_removal(NodeId(0), &allocated, NodeId(2))
            .unwrap());
    }

    #[test]
    fn given_chain_when_removing_cut_vertex_then_disconnects() {
        let graph = ring();
        let allocated = set(&[0, 1, 2]);
        assert!(!graph
            .remains_connected_after_removal(NodeId(0), &allocated, NodeId(1))
            .unwrap());
        assert!(graph
            .remains_connected_after_removal(NodeId(0), &allocated, NodeId(2))
            .unwrap());
    }

    #[test]
    fn given_two_equal_routes_when_counting_paths_then_reports_many() {
        let graph = ring();
        let info = graph
            .shortest_paths_within(&set(&[0]), 3, |_| true)
            .unwrap();
        assert_eq!(info[&NodeId(5)].distance, 2);
        assert_eq!(info[&NodeId(5)].count, PathCount::Many);
        assert_eq!(info[&NodeId(5)].via, None);
        assert_eq!(info[&NodeId(4)].count, PathCount::One);
        assert_eq!(info[&NodeId(4)].via, Some(NodeId(3)));
        assert_eq!(info[&NodeId(2)].count, PathCount::One);
        assert_eq!(info[&NodeId(2)].via, Some(NodeId(1)));
    }

    #[test]
    fn given_self_loop_when_building_then_rejects_edge() {
        let result = TreeGraph::builder()
            .node(Node::new(1, NodeKind::Normal))
            .edge(1, 1)
            .build();
        assert!(matches!(result, Err(GraphError::InvalidEdge { .. })));
    }
}
