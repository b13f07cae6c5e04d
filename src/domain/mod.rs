//! Domain layer: tree graph, allocations, budgets and moves
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod allocation;
pub mod budget;
pub mod error;
pub mod graph;
pub mod moves;

pub use allocation::Allocation;
pub use budget::{BudgetState, BudgetTracker};
pub use error::{BudgetExceeded, GraphError, GraphResult};
pub use graph::{Node, NodeId, NodeKind, PathCount, PathInfo, TreeGraph, TreeGraphBuilder};
pub use moves::{CandidateMove, MoveCost, MoveKind};
