//! CLI-level errors (wraps infrastructure errors)

use thiserror::Error;

use crate::application::{ApplicationError, RunFailure};
use crate::infrastructure::InfraError;

/// CLI errors are the top-level error type.
/// These are what get displayed to the user.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0}")]
    Infra(#[from] InfraError),

    #[error("{0}")]
    Usage(String),
}

impl From<ApplicationError> for CliError {
    fn from(e: ApplicationError) -> Self {
        CliError::Infra(InfraError::Application(e))
    }
}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

impl CliError {
    /// Get the appropriate exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Usage(_) => crate::exitcode::USAGE,
            CliError::Infra(e) => match e {
                InfraError::Io { .. } => crate::exitcode::IOERR,
                InfraError::Document { .. } => crate::exitcode::DATAERR,
                InfraError::Application(e) => application_exit_code(e),
            },
        }
    }
}

fn application_exit_code(e: &ApplicationError) -> i32 {
    match e {
        ApplicationError::Graph(_) | ApplicationError::InvalidDocument { .. } => {
            crate::exitcode::DATAERR
        }
        ApplicationError::Run(RunFailure::Graph(_)) => crate::exitcode::DATAERR,
        ApplicationError::Run(RunFailure::BaselineEvaluationFailed(_)) => {
            crate::exitcode::UNAVAILABLE
        }
        ApplicationError::InvalidRequest(_) => crate::exitcode::USAGE,
        ApplicationError::Config { .. } => crate::exitcode::CONFIG,
        ApplicationError::Io { .. } => crate::exitcode::IOERR,
        ApplicationError::OperationFailed { .. } => crate::exitcode::SOFTWARE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::EvaluationError;
    use crate::domain::{GraphError, NodeId};

    #[test]
    fn given_unknown_node_when_mapping_exit_code_then_dataerr() {
        let err: CliError = ApplicationError::Graph(GraphError::UnknownNode(NodeId(7))).into();
        assert_eq!(err.exit_code(), crate::exitcode::DATAERR);
    }

    #[test]
    fn given_unscoreable_baseline_when_mapping_exit_code_then_unavailable() {
        let failure = RunFailure::BaselineEvaluationFailed(EvaluationError::PoolClosed);
        let err: CliError = ApplicationError::Run(failure).into();
        assert_eq!(err.exit_code(), crate::exitcode::UNAVAILABLE);
    }

    #[test]
    fn given_config_error_when_mapping_exit_code_then_config() {
        let err: CliError = ApplicationError::Config {
            message: "bad".into(),
        }
        .into();
        assert_eq!(err.exit_code(), crate::exitcode::CONFIG);
    }
}
