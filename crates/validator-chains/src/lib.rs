pub mod adapter;
pub mod error;
pub mod evm;
pub mod retry;
pub mod solana;

pub use adapter::{fetch_all_current_ticks, fetch_all_positions, list_all_active_pools, pool_keys_for_subnets, ChainAdapter};
pub use error::{ChainAdapterError, Result};
pub use evm::{EvmAdapter, EvmAdapterConfig};
pub use retry::{with_backoff, RetryConfig, Transient};
pub use solana::{SolanaAdapter, SolanaAdapterConfig};
