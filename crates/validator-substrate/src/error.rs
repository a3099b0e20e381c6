use thiserror::Error;

#[derive(Error, Debug)]
pub enum SubstrateError {
    #[error("client is not ready (state: {state})")]
    NotReady { state: String },

    #[error("connection to {endpoint} failed: {message}")]
    Connection { endpoint: String, message: String },

    #[error("storage query {pallet}::{entry} failed: {message}")]
    Storage {
        pallet: String,
        entry: String,
        message: String,
    },

    #[error("failed to decode storage value for {pallet}::{entry}: {message}")]
    Decode {
        pallet: String,
        entry: String,
        message: String,
    },

    #[error("invalid signer mnemonic: {0}")]
    InvalidSigner(String),

    #[error("set_weights submission failed: {0}")]
    Submission(String),

    #[error("all {total} per-uid lookups failed for netuid {netuid}")]
    AllHotkeyLookupsFailed { netuid: u16, total: usize },
}

pub type Result<T> = std::result::Result<T, SubstrateError>;
