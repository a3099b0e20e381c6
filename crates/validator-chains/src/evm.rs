//! EVM adapter: shared implementation for every `ChainTag` backed by an EVM
//! staking contract wrapping Uniswap V3 (`ethereum`, `base`, and any future
//! EVM chain tag). One instance per chain, parameterized by RPC URL and
//! contract addresses (spec.md §6's per-chain config knobs).

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use alloy::primitives::Address;
use alloy::providers::{Provider, ProviderBuilder};
use alloy::sol;
use async_trait::async_trait;
use tracing::warn;

use validator_types::{ChainTag, Hotkey, Pool, PoolKey, PoolTick, Position};

use crate::adapter::ChainAdapter;
use crate::error::{ChainAdapterError, Result};
use crate::retry::{with_backoff, RetryConfig, Transient};

sol! {
    #[sol(rpc)]
    interface IStakingContract {
        function getAllPools() external view returns (address[] memory pools, uint8[] memory subnetIds);
        function getStakesByMultipleHotkeys(address[] calldata hotkeys)
            external view returns (uint256[][] memory tokenIds, address[][] memory pools);
        function positions(uint256 tokenId) external view returns (
            uint96 nonce,
            address operator,
            address token0,
            address token1,
            uint24 fee,
            int24 tickLower,
            int24 tickUpper,
            uint128 liquidity,
            uint256 feeGrowthInside0LastX128,
            uint256 feeGrowthInside1LastX128,
            uint128 tokensOwed0,
            uint128 tokensOwed1
        );
    }

    #[sol(rpc)]
    interface IUniswapV3Pool {
        function slot0() external view returns (
            uint160 sqrtPriceX96,
            int24 tick,
            uint16 observationIndex,
            uint16 observationCardinality,
            uint16 observationCardinalityNext,
            uint8 feeProtocol,
            bool unlocked
        );
    }
}

#[derive(Debug, Clone)]
pub struct EvmAdapterConfig {
    pub chain: ChainTag,
    pub rpc_url: String,
    pub staking_contract: Option<Address>,
    pub position_manager: Option<Address>,
    pub max_concurrent_batches: usize,
    pub retry: RetryConfig,
}

pub struct EvmAdapter {
    config: EvmAdapterConfig,
}

impl EvmAdapter {
    pub fn new(config: EvmAdapterConfig) -> Self {
        Self { config }
    }

    fn pool_key(&self, native: Address) -> PoolKey {
        PoolKey::new(self.config.chain, format!("{native:#x}"))
    }

    fn provider(&self) -> Result<impl Provider + Clone> {
        ProviderBuilder::new()
            .connect_http(self.config.rpc_url.parse().map_err(|e| ChainAdapterError::Transport {
                chain: self.config.chain.to_string(),
                message: format!("invalid rpc url: {e}"),
            })?)
            .into()
            .map_err(|e: alloy::transports::TransportError| ChainAdapterError::Transport {
                chain: self.config.chain.to_string(),
                message: e.to_string(),
            })
    }
}

fn classify_evm_error(err: &alloy::contract::Error) -> Transient {
    let message = err.to_string();
    if message.contains("429") || message.to_lowercase().contains("rate limit") {
        Transient::RateLimited
    } else {
        Transient::Retry
    }
}

#[async_trait]
impl ChainAdapter for EvmAdapter {
    fn chain(&self) -> ChainTag {
        self.config.chain
    }

    async fn list_active_pools(&self) -> Result<Vec<Pool>> {
        let Some(staking_contract) = self.config.staking_contract else {
            return Ok(Vec::new());
        };
        let provider = Arc::new(self.provider()?);
        let contract = IStakingContract::new(staking_contract, provider);

        let result = with_backoff(
            &self.config.retry,
            "evm_getAllPools",
            classify_evm_error,
            || {
                let contract = &contract;
                async move { contract.getAllPools().call().await }
            },
        )
        .await
        .map_err(|e| ChainAdapterError::Transport {
            chain: self.config.chain.to_string(),
            message: e.to_string(),
        })?;

        let mut pools = Vec::new();
        for (pool_addr, subnet_id) in result.pools.into_iter().zip(result.subnetIds.into_iter()) {
            if pool_addr == Address::ZERO {
                continue;
            }
            pools.push(Pool {
                key: self.pool_key(pool_addr),
                subnet: subnet_id as u16,
                active: true,
            });
        }
        Ok(pools)
    }

    async fn fetch_current_ticks(
        &self,
        allowed: Option<&BTreeSet<PoolKey>>,
    ) -> Result<BTreeMap<PoolKey, PoolTick>> {
        let pools: Vec<PoolKey> = match allowed {
            Some(allowed) => allowed.iter().filter(|k| k.chain == self.config.chain).cloned().collect(),
            None => self.list_active_pools().await?.into_iter().map(|p| p.key).collect(),
        };
        if pools.is_empty() {
            return Ok(BTreeMap::new());
        }

        let provider = Arc::new(self.provider()?);
        let semaphore = Arc::new(tokio::sync::Semaphore::new(self.config.max_concurrent_batches.max(1)));
        let mut handles = Vec::new();
        for pool_key in pools {
            let Ok(address) = pool_key.native_id.parse::<Address>() else {
                continue;
            };
            let provider = provider.clone();
            let semaphore = semaphore.clone();
            let retry = self.config.retry;
            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire().await.expect("semaphore not closed");
                let contract = IUniswapV3Pool::new(address, provider);
                let result = with_backoff(&retry, "evm_slot0", classify_evm_error, || {
                    let contract = &contract;
                    async move { contract.slot0().call().await }
                })
                .await;
                (pool_key, result)
            }));
        }

        let mut out = BTreeMap::new();
        for handle in handles {
            let (pool_key, result) = handle.await.map_err(|e| ChainAdapterError::Transport {
                chain: self.config.chain.to_string(),
                message: e.to_string(),
            })?;
            match result {
                Ok(slot0) => {
                    out.insert(
                        pool_key,
                        PoolTick {
                            current_tick: Some(slot0.tick.as_i32()),
                        },
                    );
                }
                Err(err) => {
                    warn!(pool = %pool_key, error = %err, "slot0() failed after retries, omitting pool");
                }
            }
        }
        Ok(out)
    }

    async fn fetch_positions(&self, hotkeys: &BTreeSet<Hotkey>) -> Result<Vec<Position>> {
        let (Some(staking_contract), Some(position_manager)) =
            (self.config.staking_contract, self.config.position_manager)
        else {
            return Ok(Vec::new());
        };
        if hotkeys.is_empty() {
            return Ok(Vec::new());
        }

        let addresses: Vec<(Hotkey, Address)> = hotkeys
            .iter()
            .filter_map(|h| h.as_str().parse::<Address>().ok().map(|a| (h.clone(), a)))
            .collect();
        if addresses.len() != hotkeys.len() {
            warn!(
                chain = %self.config.chain,
                skipped = hotkeys.len() - addresses.len(),
                "some hotkeys are not valid EVM addresses, skipping"
            );
        }
        if addresses.is_empty() {
            return Ok(Vec::new());
        }

        let provider = Arc::new(self.provider()?);
        let staking = IStakingContract::new(staking_contract, provider.clone());

        let stake_result = with_backoff(
            &self.config.retry,
            "evm_getStakesByMultipleHotkeys",
            classify_evm_error,
            || {
                let staking = &staking;
                let hotkey_addrs: Vec<Address> = addresses.iter().map(|(_, a)| *a).collect();
                async move { staking.getStakesByMultipleHotkeys(hotkey_addrs).call().await }
            },
        )
        .await
        .map_err(|e| ChainAdapterError::Transport {
            chain: self.config.chain.to_string(),
            message: e.to_string(),
        })?;

        let position_manager_contract = IStakingContract::new(position_manager, provider);

        let semaphore = Arc::new(tokio::sync::Semaphore::new(self.config.max_concurrent_batches.max(1)));
        let mut handles = Vec::new();
        for (idx, (hotkey, _)) in addresses.iter().enumerate() {
            let Some(token_ids) = stake_result.tokenIds.get(idx) else {
                continue;
            };
            let Some(pool_addrs) = stake_result.pools.get(idx) else {
                continue;
            };
            for (token_id, pool_addr) in token_ids.iter().zip(pool_addrs.iter()) {
                if *pool_addr == Address::ZERO {
                    continue;
                }
                let hotkey = hotkey.clone();
                let pool_key = self.pool_key(*pool_addr);
                let token_id = *token_id;
                let contract = position_manager_contract.clone();
                let semaphore = semaphore.clone();
                let retry = self.config.retry;
                let chain = self.config.chain;
                handles.push(tokio::spawn(async move {
                    let _permit = semaphore.acquire().await.expect("semaphore not closed");
                    let result = with_backoff(&retry, "evm_positions", classify_evm_error, || {
                        let contract = &contract;
                        async move { contract.positions(token_id).call().await }
                    })
                    .await;
                    (chain, hotkey, pool_key, token_id, result)
                }));
            }
        }

        let mut positions = Vec::new();
        for handle in handles {
            let (chain, hotkey, pool_key, token_id, result) =
                handle.await.map_err(|e| ChainAdapterError::Transport {
                    chain: self.config.chain.to_string(),
                    message: e.to_string(),
                })?;
            let fields = match result {
                Ok(fields) => fields,
                Err(err) => {
                    warn!(hotkey = %hotkey, token_id = %token_id, error = %err, "positions() failed, skipping");
                    continue;
                }
            };
            if fields.tickLower > fields.tickUpper {
                warn!(hotkey = %hotkey, token_id = %token_id, "inverted tick range from positions(), skipping");
                continue;
            }
            match Position::new(
                hotkey.clone(),
                chain,
                pool_key,
                token_id.to_string(),
                fields.tickLower.as_i32(),
                fields.tickUpper.as_i32(),
                fields.liquidity as u128,
            ) {
                Ok(position) => positions.push(position),
                Err(err) => warn!(hotkey = %hotkey, error = %err, "skipping malformed position"),
            }
        }
        Ok(positions)
    }
}
