pub mod client;
pub mod error;
pub mod queries;
pub mod submit;

pub use client::{ClientState, SubstrateClient};
pub use error::{Result, SubstrateError};
pub use queries::{current_block_number, hotkey_to_uid, subnet_alpha_prices};
pub use submit::{submit_set_weights, Signer};
