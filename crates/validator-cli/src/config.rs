//! Environment configuration, mirroring `OracleConfig::from_env` /
//! `luxtensor-indexer::Config::from_env`: every variable in spec.md §6 is
//! read with `std::env::var`, defaults are applied inline, and the whole
//! thing returns `anyhow::Result` so `main` can turn a fatal config error
//! into exit code 1.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use validator_chains::RetryConfig;
use validator_types::ChainTag;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocatorKind {
    ReservedShare,
    ChainSplit,
}

#[derive(Debug, Clone)]
pub struct ChainConfig {
    pub chain: ChainTag,
    pub rpc_url: String,
    pub staking_contract: Option<String>,
    pub position_manager: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub subtensor_ws_url: String,
    pub netuid: u16,
    pub validator_hotkey_mnemonic: String,
    pub hotkeys_cache_ttl_ms: u64,

    pub interval_minutes: u64,
    pub interval_is_randomized_range: bool,

    pub use_ema: bool,
    pub ema_alpha: f64,
    pub ema_epsilon: f64,
    pub ema_state_path: Option<PathBuf>,

    pub enabled_chains: Vec<ChainConfig>,

    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub initial_retry_delay_ms: u64,
    pub max_retry_delay_ms: u64,
    pub rpc_timeout_ms: u64,
    pub position_batch_size: usize,
    pub max_concurrent_batches: usize,
    pub batch_delay_ms: u64,
    pub hotkey_batch_size: usize,

    pub reserved_share_subnet_0: f64,
    pub reserved_share_subnet_106: f64,
    pub burn_percentage: f64,
    pub allocator_kind: AllocatorKind,
    pub total_reward: f64,

    pub workdir: PathBuf,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let enabled_chains = parse_enabled_chains()?;

        Ok(Self {
            subtensor_ws_url: env_or("SUBTENSOR_WS_URL", "BITTENSOR_WS_ENDPOINT")
                .unwrap_or_else(|| "wss://entrypoint-finney.opentensor.ai:443".to_string()),
            netuid: env::var("NETUID")
                .context("NETUID environment variable is required")?
                .parse()
                .context("NETUID must be a u16")?,
            validator_hotkey_mnemonic: env::var("VALIDATOR_HOTKEY_MNEMONIC")
                .context("VALIDATOR_HOTKEY_MNEMONIC environment variable must be set")?,
            hotkeys_cache_ttl_ms: env_parse("HOTKEYS_CACHE_TTL_MS", 60_000),

            interval_minutes: env_parse("VALIDATOR_INTERVAL_MINUTES", 20),
            interval_is_randomized_range: env::var("VALIDATOR_INTERVAL_RANDOMIZED")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),

            use_ema: env::var("USE_EMA")
                .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
                .unwrap_or(true),
            ema_alpha: env_parse("EMA_ALPHA", 0.3),
            ema_epsilon: env_parse("EMA_EPSILON", 1e-6),
            ema_state_path: env::var("EMA_STATE_PATH").ok().map(PathBuf::from),

            enabled_chains,

            max_retries: env_parse("MAX_RETRIES", 3),
            retry_base_delay_ms: env_parse("RETRY_BASE_DELAY_MS", 2_000),
            initial_retry_delay_ms: env_parse("INITIAL_RETRY_DELAY_MS", 250),
            max_retry_delay_ms: env_parse("MAX_RETRY_DELAY_MS", 10_000),
            rpc_timeout_ms: env_parse("RPC_TIMEOUT_MS", 30_000),
            position_batch_size: env_parse("POSITION_BATCH_SIZE", 50),
            max_concurrent_batches: env_parse("MAX_CONCURRENT_BATCHES", 4),
            batch_delay_ms: env_parse("BATCH_DELAY_MS", 100),
            hotkey_batch_size: env_parse("HOTKEY_BATCH_SIZE", 32),

            reserved_share_subnet_0: env_parse("RESERVED_SHARE_SUBNET_0", 0.25),
            reserved_share_subnet_106: env_parse("RESERVED_SHARE_SUBNET_106", 0.0),
            burn_percentage: env_parse("BURN_PERCENTAGE", 0.0),
            allocator_kind: match env::var("ALLOCATOR_KIND").as_deref() {
                Ok("chain_split") => AllocatorKind::ChainSplit,
                _ => AllocatorKind::ReservedShare,
            },
            total_reward: env_parse("TOTAL_REWARD", 1.0),

            workdir: env::var("VALIDATOR_WORKDIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".")),
        })
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            initial_delay: Duration::from_millis(self.initial_retry_delay_ms),
            max_delay: Duration::from_millis(self.max_retry_delay_ms),
            rate_limit_base_delay: Duration::from_millis(self.retry_base_delay_ms),
        }
    }
}

fn env_or(primary: &str, fallback: &str) -> Option<String> {
    env::var(primary).ok().or_else(|| env::var(fallback).ok())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn parse_enabled_chains() -> anyhow::Result<Vec<ChainConfig>> {
    let raw = env::var("ENABLED_CHAINS").unwrap_or_else(|_| "solana,ethereum,base".to_string());
    let mut chains = Vec::new();
    for tag_str in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let chain: ChainTag = tag_str
            .parse()
            .map_err(|_| anyhow::anyhow!("unknown chain tag in ENABLED_CHAINS: {tag_str}"))?;
        let prefix = tag_str.to_ascii_uppercase();
        chains.push(ChainConfig {
            chain,
            rpc_url: env::var(format!("{prefix}_RPC_URL")).unwrap_or_default(),
            staking_contract: env::var(format!("{prefix}_STAKING_CONTRACT")).ok(),
            position_manager: env::var(format!("{prefix}_POSITION_MANAGER")).ok(),
        });
    }
    Ok(chains)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_parse_falls_back_to_default_on_missing_or_invalid() {
        env::remove_var("SN106_TEST_NONEXISTENT");
        assert_eq!(env_parse::<u32>("SN106_TEST_NONEXISTENT", 7), 7);
    }
}
