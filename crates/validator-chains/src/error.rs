use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChainAdapterError {
    #[error("transport error on {chain}: {message}")]
    Transport { chain: String, message: String },

    #[error("configured contract address missing for {chain}")]
    ContractNotConfigured { chain: String },

    #[error("failed to decode account/response from {chain}: {message}")]
    Decode { chain: String, message: String },
}

pub type Result<T> = std::result::Result<T, ChainAdapterError>;
