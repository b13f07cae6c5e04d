//! Application-level errors (wraps domain errors)

use std::path::PathBuf;

use thiserror::Error;

use crate::domain::GraphError;
use crate::infrastructure::traits::EngineError;

/// Failure of a single evaluation. Never fatal on its own: the candidate is
/// skipped. Only a failed baseline ends the run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("scoring engine panicked: {0}")]
    Panicked(String),

    #[error("objective disqualified: {0}")]
    Disqualified(String),

    #[error("evaluator pool is shut down")]
    PoolClosed,
}

/// The only two ways a run ends without a usable result.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RunFailure {
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("baseline evaluation failed: {0}")]
    BaselineEvaluationFailed(#[source] EvaluationError),
}

/// Application errors wrap domain errors and add application-level context.
#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("{0}")]
    Graph(#[from] GraphError),

    #[error("{0}")]
    Run(#[from] RunFailure),

    #[error("invalid run request: {0}")]
    InvalidRequest(String),

    #[error("config error: {message}")]
    Config { message: String },

    #[error("invalid document {path}: {message}")]
    InvalidDocument { path: PathBuf, message: String },

    #[error("I/O error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("operation failed: {context}")]
    OperationFailed {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Result type for application layer operations.
pub type ApplicationResult<T> = Result<T, ApplicationError>;
