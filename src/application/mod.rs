//! Application layer: the search engine and its use cases
//!
//! This layer orchestrates domain logic and depends on I/O boundary traits.

pub mod cancel;
pub mod error;
pub mod evaluator;
pub mod neighbors;
pub mod objective;
pub mod optimizer;
pub mod progress;
pub mod services;

pub use cancel::CancellationToken;
pub use error::{ApplicationError, ApplicationResult, EvaluationError, RunFailure};
pub use evaluator::EvaluatorAdapter;
pub use neighbors::{NeighborConfig, NeighborGenerator};
pub use objective::{Objective, ObjectiveMetric, ObjectiveSelector};
pub use optimizer::{
    AcceptedMove, HillClimbingOptimizer, OptimizationState, Phase, RunLimits, RunReport,
    RunRequest, TerminalStatus,
};
pub use progress::{ChannelProgress, NullProgress, ProgressEvent, ProgressSink, TracingProgress};
