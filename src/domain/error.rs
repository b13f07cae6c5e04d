//! Domain-level errors (no external dependencies)

use thiserror::Error;

use crate::domain::graph::NodeId;

/// Graph errors indicate corrupt input or a caller bug.
/// Any of these aborts the optimization run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("unknown node: {0}")]
    UnknownNode(NodeId),

    #[error("unknown class: {0}")]
    UnknownClass(String),

    #[error("duplicate node: {0}")]
    DuplicateNode(NodeId),

    #[error("invalid edge {from} -> {to}: {reason}")]
    InvalidEdge {
        from: NodeId,
        to: NodeId,
        reason: String,
    },

    #[error("allocation is not connected to class start {start}: {unreachable:?}")]
    DisconnectedAllocation {
        start: NodeId,
        unreachable: Vec<NodeId>,
    },
}

/// A move that would push a budget past its limit.
///
/// Never surfaced to callers: the generator drops such moves before evaluation.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("budget exceeded: points {points_needed}/{points_limit}, currency {currency_needed}/{currency_limit}")]
pub struct BudgetExceeded {
    pub points_needed: u32,
    pub points_limit: u32,
    pub currency_needed: u32,
    pub currency_limit: u32,
}

/// Result type for graph operations.
pub type GraphResult<T> = Result<T, GraphError>;
