use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScoringError {
    #[error("hotkey_to_uid map is empty; refusing to build a submission vector")]
    EmptyUidMap,

    #[error("burn_percentage {0} out of range [0,100]")]
    InvalidBurnPercentage(f64),

    #[error("ema alpha {0} out of range (0,1]")]
    InvalidEmaAlpha(f64),

    #[error("failed to persist EMA snapshot: {0}")]
    PersistenceFailure(String),
}

pub type Result<T> = std::result::Result<T, ScoringError>;
