//! Candidate move generation with two-level pruning.
//!
//! Level 1 drops frontier nodes that contribute nothing to the objective,
//! unless they lie on the unique shortest path to a relevant notable or
//! keystone within the lookahead horizon; those become multi-node travel
//! moves. Level 2 ranks by the static heuristic and keeps the top-K.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{debug, instrument, trace};

use crate::application::objective::ObjectiveSelector;
use crate::domain::{
    Allocation, BudgetState, BudgetTracker, CandidateMove, GraphResult, MoveKind, NodeId,
    PathCount, TreeGraph,
};

/// Generator knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighborConfig {
    /// Also propose respec (swap) moves
    pub respec: bool,
    /// Hops past a travel node within which a target must lie
    pub lookahead: usize,
    /// Maximum candidates per iteration; 0 is treated as 1
    pub top_k: usize,
}

impl Default for NeighborConfig {
    fn default() -> Self {
        Self {
            respec: false,
            lookahead: 2,
            top_k: 100,
        }
    }
}

/// Produces a bounded, legal, totally ordered set of candidate moves.
#[derive(Debug, Clone)]
pub struct NeighborGenerator {
    graph: Arc<TreeGraph>,
    selector: ObjectiveSelector,
    tracker: BudgetTracker,
    config: NeighborConfig,
    excluded: BTreeSet<NodeId>,
    protected: BTreeSet<NodeId>,
}

impl NeighborGenerator {
    pub fn new(
        graph: Arc<TreeGraph>,
        selector: ObjectiveSelector,
        tracker: BudgetTracker,
        config: NeighborConfig,
    ) -> Self {
        Self {
            graph,
            selector,
            tracker,
            config,
            excluded: BTreeSet::new(),
            protected: BTreeSet::new(),
        }
    }

    /// Nodes that are never added.
    pub fn with_excluded(mut self, excluded: BTreeSet<NodeId>) -> Self {
        self.excluded = excluded;
        self
    }

    /// Nodes that are never respecced out.
    pub fn with_protected(mut self, protected: BTreeSet<NodeId>) -> Self {
        self.protected = protected;
        self
    }

    pub fn config(&self) -> &NeighborConfig {
        &self.config
    }

    /// Ranked candidates for the current allocation and budget.
    #[instrument(level = "debug", skip_all, fields(allocated = allocation.len()))]
    pub fn generate(
        &self,
        allocation: &Allocation,
        budget: &BudgetState,
    ) -> GraphResult<Vec<CandidateMove>> {
        let frontier: BTreeSet<NodeId> = allocation
            .frontier(&self.graph)?
            .into_iter()
            .filter(|id| !self.excluded.contains(id))
            .collect();

        let mut kinds: Vec<(MoveKind, f64)> = Vec::new();
        let mut travel_entries = BTreeSet::new();
        for &id in &frontier {
            let node = self.graph.node(id)?;
            if self.selector.is_relevant(node) {
                kinds.push((MoveKind::Add { nodes: vec![id] }, self.selector.heuristic(node)));
            } else {
                travel_entries.insert(id);
            }
        }
        let relevant_adds = kinds.len();

        if !travel_entries.is_empty() && self.config.lookahead > 0 {
            kinds.extend(self.travel_moves(allocation, &frontier, &travel_entries)?);
        }
        let travel = kinds.len() - relevant_adds;

        if self.config.respec {
            kinds.extend(self.respec_moves(allocation, &frontier)?);
        }

        let generated = kinds.len();
        let mut moves: Vec<CandidateMove> = kinds
            .into_iter()
            .map(|(kind, heuristic)| {
                let cost = self.tracker.cost_of(&kind);
                CandidateMove {
                    kind,
                    heuristic,
                    cost,
                }
            })
            .filter(|mv| self.tracker.can_afford(mv, budget))
            .collect();
        let affordable = moves.len();

        moves.sort_by(|a, b| a.rank_cmp(b));
        moves.truncate(self.config.top_k.max(1));

        debug!(
            frontier = frontier.len(),
            relevant_adds,
            travel,
            generated,
            affordable,
            kept = moves.len(),
            "generated candidates"
        );
        Ok(moves)
    }

    /// Multi-node adds from irrelevant frontier nodes to the best relevant
    /// notable/keystone reachable through them by a unique shortest path.
    fn travel_moves(
        &self,
        allocation: &Allocation,
        frontier: &BTreeSet<NodeId>,
        entries: &BTreeSet<NodeId>,
    ) -> GraphResult<Vec<(MoveKind, f64)>> {
        let paths = self.graph.shortest_paths_within(frontier, self.config.lookahead, |n| {
            !allocation.contains(n) && !self.excluded.contains(&n)
        })?;

        // entry -> (heuristic, path)
        let mut best: BTreeMap<NodeId, (f64, Vec<NodeId>)> = BTreeMap::new();
        for (&target, info) in &paths {
            if info.distance == 0 || info.count != PathCount::One {
                continue;
            }
            let node = self.graph.node(target)?;
            if !node.kind.is_high_value() || !self.selector.is_relevant(node) {
                continue;
            }

            let Some(path) = trace_back(&paths, target) else {
                continue;
            };
            let entry = path[0];
            if !entries.contains(&entry) {
                continue;
            }

            let mut heuristic = 0.0;
            for &id in &path {
                heuristic += self.selector.heuristic(self.graph.node(id)?);
            }
            trace!("travel {} -> {} via {} hops (h={})", entry, target, path.len(), heuristic);

            let better = match best.get(&entry) {
                None => true,
                Some((h, p)) => {
                    heuristic > *h || (heuristic == *h && path.len() < p.len())
                }
            };
            if better {
                best.insert(entry, (heuristic, path));
            }
        }

        Ok(best
            .into_values()
            .map(|(h, path)| (MoveKind::Add { nodes: path }, h))
            .collect())
    }

    /// For each removable allocated node, swap it for the best relevant node
    /// still adjacent once it is gone.
    fn respec_moves(
        &self,
        allocation: &Allocation,
        frontier: &BTreeSet<NodeId>,
    ) -> GraphResult<Vec<(MoveKind, f64)>> {
        let mut targets: Vec<(NodeId, f64)> = Vec::new();
        for &id in frontier {
            let node = self.graph.node(id)?;
            if self.selector.is_relevant(node) {
                targets.push((id, self.selector.heuristic(node)));
            }
        }
        targets.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        if targets.is_empty() {
            return Ok(Vec::new());
        }

        let start = allocation.start();
        let mut moves = Vec::new();
        for &remove in allocation.nodes() {
            if remove == start || self.protected.contains(&remove) {
                continue;
            }
            if !self
                .graph
                .remains_connected_after_removal(start, allocation.nodes(), remove)?
            {
                continue;
            }

            let mut remaining = allocation.nodes().clone();
            remaining.remove(&remove);
            let removed_h = self.selector.heuristic(self.graph.node(remove)?);

            for &(add, h) in &targets {
                if self.graph.is_reachable_through(&remaining, add)? {
                    moves.push((MoveKind::Respec { remove, add }, h - removed_h));
                    break;
                }
            }
        }
        Ok(moves)
    }
}

/// Follow unique predecessors back to a seed; path is returned seed first.
fn trace_back(
    paths: &BTreeMap<NodeId, crate::domain::PathInfo>,
    target: NodeId,
) -> Option<Vec<NodeId>> {
    let mut path = vec![target];
    let mut current = target;
    while paths.get(&current)?.distance > 0 {
        current = paths.get(&current)?.via?;
        path.push(current);
    }
    path.reverse();
    Some(path)
}
