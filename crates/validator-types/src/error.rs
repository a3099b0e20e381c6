use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TypesError {
    #[error("tick_lower ({tick_lower}) must be <= tick_upper ({tick_upper})")]
    InvalidTickRange { tick_lower: i32, tick_upper: i32 },

    #[error("malformed pool key: {0}")]
    MalformedPoolKey(String),

    #[error("unknown chain tag: {0}")]
    UnknownChain(String),
}

pub type Result<T> = std::result::Result<T, TypesError>;
