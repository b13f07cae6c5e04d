//! Candidate moves and their deterministic ordering.

use std::cmp::Ordering;
use std::fmt;

use itertools::Itertools;
use serde::Serialize;

use crate::domain::graph::NodeId;

/// What a move does to the allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MoveKind {
    /// Allocate one node, or a path of nodes ending at a high-value target.
    /// Nodes are listed from the frontier outwards.
    Add { nodes: Vec<NodeId> },
    /// Refund an allocated node and spend the point elsewhere.
    Respec { remove: NodeId, add: NodeId },
}

impl MoveKind {
    pub fn is_respec(&self) -> bool {
        matches!(self, MoveKind::Respec { .. })
    }

    /// Ids used for ordering: added nodes first, then the removed one.
    fn order_key(&self) -> Vec<NodeId> {
        match self {
            MoveKind::Add { nodes } => nodes.clone(),
            MoveKind::Respec { remove, add } => vec![*add, *remove],
        }
    }
}

impl fmt::Display for MoveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoveKind::Add { nodes } => write!(f, "add [{}]", nodes.iter().join(", ")),
            MoveKind::Respec { remove, add } => write!(f, "respec {} -> {}", remove, add),
        }
    }
}

/// Incremental budget cost of a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MoveCost {
    pub points_spent: u32,
    pub points_refunded: u32,
    pub currency: u32,
}

impl MoveCost {
    /// Net points consumed (never negative for moves the generator emits).
    pub fn net_points(&self) -> i64 {
        i64::from(self.points_spent) - i64::from(self.points_refunded)
    }

    /// Free moves consume only unspent points.
    pub fn is_free(&self) -> bool {
        self.currency == 0 && self.points_refunded == 0
    }
}

/// A legal, ranked move proposal; lives for one iteration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateMove {
    pub kind: MoveKind,
    /// Cheap static score from stat-tag weights
    pub heuristic: f64,
    pub cost: MoveCost,
}

impl CandidateMove {
    /// Total ranking order: heuristic descending, free before respec, then
    /// affected ids ascending.
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .heuristic
            .total_cmp(&self.heuristic)
            .then_with(|| self.kind.is_respec().cmp(&other.kind.is_respec()))
            .then_with(|| self.kind.order_key().cmp(&other.kind.order_key()))
    }
}

impl fmt::Display for CandidateMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (h={:.2})", self.kind, self.heuristic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add(ids: &[u32], h: f64) -> CandidateMove {
        CandidateMove {
            kind: MoveKind::Add {
                nodes: ids.iter().map(|&i| NodeId(i)).collect(),
            },
            heuristic: h,
            cost: MoveCost {
                points_spent: ids.len() as u32,
                ..MoveCost::default()
            },
        }
    }

    #[test]
    fn given_equal_heuristics_when_ranking_then_lower_id_first() {
        let mut moves = vec![add(&[9], 1.0), add(&[3], 1.0), add(&[5], 2.0)];
        moves.sort_by(|a, b| a.rank_cmp(b));
        let order: Vec<_> = moves.iter().map(|m| m.kind.order_key()[0].0).collect();
        assert_eq!(order, vec![5, 3, 9]);
    }

    #[test]
    fn given_equal_heuristics_when_ranking_then_free_before_respec() {
        let respec = CandidateMove {
            kind: MoveKind::Respec {
                remove: NodeId(1),
                add: NodeId(2),
            },
            heuristic: 1.0,
            cost: MoveCost {
                points_spent: 1,
                points_refunded: 1,
                currency: 1,
            },
        };
        let free = add(&[7], 1.0);
        assert_eq!(respec.rank_cmp(&free), Ordering::Greater);
        assert!(free.cost.is_free());
        assert!(!respec.cost.is_free());
    }
}
