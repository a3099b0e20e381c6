use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("pipeline internal invariant violated: {0}")]
    InvariantViolation(String),

    #[error(transparent)]
    Substrate(#[from] validator_substrate::SubstrateError),

    #[error(transparent)]
    Scoring(#[from] validator_scoring::ScoringError),

    #[error("failed to append submission log entry: {0}")]
    SubmissionLog(String),
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
