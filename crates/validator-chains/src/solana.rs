//! Solana adapter: reads pool/stake state from the Raydium-CLMM staking
//! program and current ticks from Raydium's own `PoolState` accounts.
//!
//! Account layouts are fixed-offset byte slices rather than a generated
//! IDL client, matching how `PoolRecord`/`StakeRecord`/CLMM `PoolState` are
//! described in spec.md §6 ("per-account binary layouts ... with fixed
//! offsets"). Any account that doesn't parse is skipped with a warning,
//! never failing the whole batch (spec §7 taxonomy item 3).

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use solana_account_decoder::UiAccountEncoding;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::{RpcAccountInfoConfig, RpcProgramAccountsConfig};
use solana_client::rpc_filter::{Memcmp, MemcmpEncodedBytes, RpcFilterType};
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use tokio::sync::Semaphore;
use tracing::warn;

use validator_types::{ChainTag, Hotkey, Pool, PoolKey, PoolTick, Position};

use crate::adapter::ChainAdapter;
use crate::error::{ChainAdapterError, Result};
use crate::retry::{with_backoff, RetryConfig, Transient};

/// `PoolRecord` account layout: `[8-byte discriminator][32-byte pool
/// pubkey][32-byte CLMM pool_state pubkey][2-byte subnet_id][1-byte active]`.
mod pool_record {
    pub const DISCRIMINATOR_LEN: usize = 8;
    pub const POOL_PUBKEY_OFFSET: usize = 8;
    pub const CLMM_STATE_OFFSET: usize = 40;
    pub const SUBNET_ID_OFFSET: usize = 72;
    pub const ACTIVE_OFFSET: usize = 74;
    pub const LEN: usize = 75;
}

/// `StakeRecord` account layout: `[8-byte discriminator][32-byte owner
/// hotkey][32-byte pool pubkey][8-byte position nft mint, as base58 token
/// id][4-byte tick_lower i32][4-byte tick_upper i32][16-byte liquidity u128]`.
mod stake_record {
    pub const OWNER_OFFSET: usize = 8;
    pub const POOL_OFFSET: usize = 40;
    pub const MINT_OFFSET: usize = 72;
    pub const TICK_LOWER_OFFSET: usize = 104;
    pub const TICK_UPPER_OFFSET: usize = 108;
    pub const LIQUIDITY_OFFSET: usize = 112;
    pub const LEN: usize = 128;
}

/// Raydium CLMM `PoolState`: `tick_current` lives at a fixed offset past the
/// account discriminator and the pool's mint/vault pubkeys.
mod clmm_pool_state {
    pub const TICK_CURRENT_OFFSET: usize = 253;
}

#[derive(Debug, Clone)]
pub struct SolanaAdapterConfig {
    pub rpc_url: String,
    pub staking_program_id: Option<Pubkey>,
    pub position_batch_size: usize,
    pub max_concurrent_batches: usize,
    pub batch_delay: Duration,
    pub retry: RetryConfig,
}

pub struct SolanaAdapter {
    client: Arc<RpcClient>,
    config: SolanaAdapterConfig,
}

impl SolanaAdapter {
    pub fn new(config: SolanaAdapterConfig) -> Self {
        let client = Arc::new(RpcClient::new_with_commitment(
            config.rpc_url.clone(),
            CommitmentConfig::confirmed(),
        ));
        Self { client, config }
    }

    fn program_id(&self) -> Result<Pubkey> {
        self.config
            .staking_program_id
            .ok_or_else(|| ChainAdapterError::ContractNotConfigured {
                chain: ChainTag::Solana.to_string(),
            })
    }

    fn pool_key(native: &Pubkey) -> PoolKey {
        PoolKey::new(ChainTag::Solana, native.to_string())
    }

    async fn get_multiple_accounts_chunked(
        &self,
        keys: &[Pubkey],
    ) -> Result<Vec<(Pubkey, Option<Vec<u8>>)>> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_batches.max(1)));
        let mut handles = Vec::new();
        for chunk in keys.chunks(self.config.position_batch_size.max(1)) {
            let chunk = chunk.to_vec();
            let client = self.client.clone();
            let semaphore = semaphore.clone();
            let retry = self.config.retry;
            let delay = self.config.batch_delay;
            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire().await.expect("semaphore not closed");
                let result = with_backoff(
                    &retry,
                    "solana_get_multiple_accounts",
                    classify_rpc_error,
                    || {
                        let client = client.clone();
                        let chunk = chunk.clone();
                        async move {
                            client
                                .get_multiple_accounts_with_config(
                                    &chunk,
                                    RpcAccountInfoConfig {
                                        encoding: Some(UiAccountEncoding::Base64),
                                        commitment: Some(CommitmentConfig::confirmed()),
                                        ..Default::default()
                                    },
                                )
                                .await
                        }
                    },
                )
                .await;
                tokio::time::sleep(delay).await;
                (chunk, result)
            }));
        }

        let mut out = Vec::with_capacity(keys.len());
        for handle in handles {
            let (chunk, result) = handle.await.map_err(|e| ChainAdapterError::Transport {
                chain: ChainTag::Solana.to_string(),
                message: e.to_string(),
            })?;
            match result {
                Ok(response) => {
                    for (key, account) in chunk.into_iter().zip(response.value.into_iter()) {
                        out.push((key, account.map(|a| a.data)));
                    }
                }
                Err(err) => {
                    warn!(error = %err, "get_multiple_accounts batch failed after retries, skipping");
                }
            }
        }
        Ok(out)
    }
}

fn classify_rpc_error(err: &solana_client::client_error::ClientError) -> Transient {
    let message = err.to_string();
    if message.contains("429") || message.to_lowercase().contains("rate limit") {
        Transient::RateLimited
    } else {
        Transient::Retry
    }
}

fn read_i32_le(data: &[u8], offset: usize) -> Option<i32> {
    data.get(offset..offset + 4)
        .map(|s| i32::from_le_bytes(s.try_into().unwrap()))
}

fn read_u128_le(data: &[u8], offset: usize) -> Option<u128> {
    data.get(offset..offset + 16)
        .map(|s| u128::from_le_bytes(s.try_into().unwrap()))
}

fn read_pubkey(data: &[u8], offset: usize) -> Option<Pubkey> {
    data.get(offset..offset + 32)
        .map(|s| Pubkey::try_from(s).unwrap())
}

#[async_trait]
impl ChainAdapter for SolanaAdapter {
    fn chain(&self) -> ChainTag {
        ChainTag::Solana
    }

    async fn list_active_pools(&self) -> Result<Vec<Pool>> {
        let program_id = match self.program_id() {
            Ok(id) => id,
            Err(_) => return Ok(Vec::new()),
        };

        let accounts = with_backoff(
            &self.config.retry,
            "solana_get_program_accounts(pools)",
            classify_rpc_error,
            || {
                let client = self.client.clone();
                let program_id = program_id;
                async move {
                    client
                        .get_program_accounts_with_config(
                            &program_id,
                            RpcProgramAccountsConfig {
                                filters: Some(vec![RpcFilterType::DataSize(
                                    pool_record::LEN as u64,
                                )]),
                                account_config: RpcAccountInfoConfig {
                                    encoding: Some(UiAccountEncoding::Base64),
                                    ..Default::default()
                                },
                                ..Default::default()
                            },
                        )
                        .await
                }
            },
        )
        .await
        .map_err(|e| ChainAdapterError::Transport {
            chain: ChainTag::Solana.to_string(),
            message: e.to_string(),
        })?;

        let mut pools = Vec::new();
        for (_, account) in accounts {
            let data = &account.data;
            if data.len() < pool_record::LEN {
                continue;
            }
            let Some(native_pool) = read_pubkey(data, pool_record::POOL_PUBKEY_OFFSET) else {
                continue;
            };
            if native_pool == Pubkey::default() {
                continue;
            }
            let Some(subnet_bytes) = data.get(pool_record::SUBNET_ID_OFFSET..pool_record::SUBNET_ID_OFFSET + 2) else {
                continue;
            };
            let subnet = u16::from_le_bytes(subnet_bytes.try_into().unwrap());
            let active = data
                .get(pool_record::ACTIVE_OFFSET)
                .map(|&b| b != 0)
                .unwrap_or(false);
            pools.push(Pool {
                key: Self::pool_key(&native_pool),
                subnet,
                active,
            });
        }
        Ok(pools)
    }

    async fn fetch_current_ticks(
        &self,
        allowed: Option<&BTreeSet<PoolKey>>,
    ) -> Result<BTreeMap<PoolKey, PoolTick>> {
        let keys: Vec<(PoolKey, Pubkey)> = match allowed {
            Some(allowed) => allowed
                .iter()
                .filter(|k| k.chain == ChainTag::Solana)
                .filter_map(|k| Pubkey::from_str(&k.native_id).ok().map(|p| (k.clone(), p)))
                .collect(),
            None => self
                .list_active_pools()
                .await?
                .into_iter()
                .filter_map(|p| {
                    Pubkey::from_str(&p.key.native_id)
                        .ok()
                        .map(|pk| (p.key, pk))
                })
                .collect(),
        };
        if keys.is_empty() {
            return Ok(BTreeMap::new());
        }

        let pubkeys: Vec<Pubkey> = keys.iter().map(|(_, p)| *p).collect();
        let accounts = self.get_multiple_accounts_chunked(&pubkeys).await?;
        let by_pubkey: BTreeMap<Pubkey, Option<Vec<u8>>> = accounts.into_iter().collect();

        let mut out = BTreeMap::new();
        for (pool_key, pubkey) in keys {
            let Some(Some(data)) = by_pubkey.get(&pubkey) else {
                // account missing or unreadable: omitted per spec §4.A, not failed.
                continue;
            };
            match read_i32_le(data, clmm_pool_state::TICK_CURRENT_OFFSET) {
                Some(tick) => {
                    out.insert(pool_key, PoolTick { current_tick: Some(tick) });
                }
                None => {
                    warn!(pool = %pool_key, "CLMM pool_state too short to read tick_current, skipping");
                }
            }
        }
        Ok(out)
    }

    async fn fetch_positions(&self, hotkeys: &BTreeSet<Hotkey>) -> Result<Vec<Position>> {
        let program_id = match self.program_id() {
            Ok(id) => id,
            Err(_) => return Ok(Vec::new()),
        };
        if hotkeys.is_empty() {
            return Ok(Vec::new());
        }

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_batches.max(1)));
        let mut handles = Vec::new();
        for hotkey in hotkeys {
            let Ok(owner) = Pubkey::from_str(hotkey.as_str()) else {
                warn!(hotkey = %hotkey, "hotkey is not a valid base58 pubkey, skipping");
                continue;
            };
            let client = self.client.clone();
            let semaphore = semaphore.clone();
            let retry = self.config.retry;
            let delay = self.config.batch_delay;
            let hotkey = hotkey.clone();
            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire().await.expect("semaphore not closed");
                let result = with_backoff(
                    &retry,
                    "solana_get_program_accounts(stakes)",
                    classify_rpc_error,
                    || {
                        let client = client.clone();
                        async move {
                            client
                                .get_program_accounts_with_config(
                                    &program_id,
                                    RpcProgramAccountsConfig {
                                        filters: Some(vec![
                                            RpcFilterType::DataSize(stake_record::LEN as u64),
                                            RpcFilterType::Memcmp(Memcmp::new(
                                                stake_record::OWNER_OFFSET,
                                                MemcmpEncodedBytes::Base58(owner.to_string()),
                                            )),
                                        ]),
                                        account_config: RpcAccountInfoConfig {
                                            encoding: Some(UiAccountEncoding::Base64),
                                            ..Default::default()
                                        },
                                        ..Default::default()
                                    },
                                )
                                .await
                        }
                    },
                )
                .await;
                tokio::time::sleep(delay).await;
                (hotkey, result)
            }));
        }

        let mut positions = Vec::new();
        for handle in handles {
            let (hotkey, result) = handle.await.map_err(|e| ChainAdapterError::Transport {
                chain: ChainTag::Solana.to_string(),
                message: e.to_string(),
            })?;
            let accounts = match result {
                Ok(accounts) => accounts,
                Err(err) => {
                    warn!(hotkey = %hotkey, error = %err, "fetch_positions batch failed after retries, skipping");
                    continue;
                }
            };
            for (_, account) in accounts {
                let data = &account.data;
                if data.len() < stake_record::LEN {
                    continue;
                }
                let Some(pool_pubkey) = read_pubkey(data, stake_record::POOL_OFFSET) else {
                    continue;
                };
                if pool_pubkey == Pubkey::default() {
                    continue;
                }
                let Some(mint) = read_pubkey(data, stake_record::MINT_OFFSET) else {
                    continue;
                };
                let (Some(tick_lower), Some(tick_upper), Some(liquidity)) = (
                    read_i32_le(data, stake_record::TICK_LOWER_OFFSET),
                    read_i32_le(data, stake_record::TICK_UPPER_OFFSET),
                    read_u128_le(data, stake_record::LIQUIDITY_OFFSET),
                ) else {
                    continue;
                };
                if tick_lower > tick_upper {
                    warn!(hotkey = %hotkey, "stake record has inverted tick range, skipping");
                    continue;
                }
                match Position::new(
                    hotkey.clone(),
                    ChainTag::Solana,
                    Self::pool_key(&pool_pubkey),
                    mint.to_string(),
                    tick_lower,
                    tick_upper,
                    liquidity,
                ) {
                    Ok(position) => positions.push(position),
                    Err(err) => warn!(hotkey = %hotkey, error = %err, "skipping malformed position"),
                }
            }
        }
        Ok(positions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_i32_and_u128_at_offset() {
        let mut data = vec![0u8; 200];
        data[10..14].copy_from_slice(&(-42i32).to_le_bytes());
        data[20..36].copy_from_slice(&123456789u128.to_le_bytes());
        assert_eq!(read_i32_le(&data, 10), Some(-42));
        assert_eq!(read_u128_le(&data, 20), Some(123456789));
    }

    #[test]
    fn returns_none_past_end_of_buffer() {
        let data = vec![0u8; 4];
        assert_eq!(read_i32_le(&data, 2), None);
    }
}
