mod config;

use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use validator_chains::{ChainAdapter, EvmAdapter, EvmAdapterConfig, SolanaAdapter, SolanaAdapterConfig};
use validator_orchestrator::{run_forever, Interval, Orchestrator, PipelineConfig, SubmissionLog};
use validator_scoring::{Allocator, ChainSplitAllocator, EmaStore, ReservedShareAllocator};
use validator_substrate::{Signer, SubstrateClient};
use validator_types::{ChainTag, BURN_UID};

use config::{AllocatorKind, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    let substrate = SubstrateClient::new(5, Duration::from_secs(2));
    substrate.initialize(&config.subtensor_ws_url).await?;

    let adapters = build_adapters(&config);
    let allocator: Box<dyn Allocator + Send + Sync> = match config.allocator_kind {
        AllocatorKind::ReservedShare => Box::new(ReservedShareAllocator),
        AllocatorKind::ChainSplit => Box::new(ChainSplitAllocator),
    };

    let ema_store = match (&config.ema_state_path, config.use_ema) {
        (Some(path), true) => EmaStore::load_from(path, config.ema_alpha, config.ema_epsilon)?,
        _ => EmaStore::new(config.ema_alpha, config.ema_epsilon)?,
    };

    let signer = Signer::from_mnemonic(&config.validator_hotkey_mnemonic)?;
    let submission_log = SubmissionLog::new(
        validator_orchestrator::path_for_workdir(&config.workdir),
    );

    let pipeline_config = PipelineConfig {
        netuid: config.netuid,
        total_reward: config.total_reward,
        reserved_share_subnet_0: config.reserved_share_subnet_0,
        reserved_share_subnet_106: config.reserved_share_subnet_106,
        burn_uid: BURN_UID,
        burn_percentage: config.burn_percentage,
        use_ema: config.use_ema,
        ema_epsilon: config.ema_epsilon,
    };

    let orchestrator = Orchestrator::new(
        substrate,
        adapters,
        allocator,
        ema_store,
        pipeline_config,
        submission_log,
        signer,
    );

    let interval = if config.interval_is_randomized_range {
        Interval::Randomized {
            min: Duration::from_secs(10 * 60),
            max: Duration::from_secs(config.interval_minutes.max(10) * 60),
        }
    } else {
        Interval::Fixed(Duration::from_secs(config.interval_minutes * 60))
    };
    run_forever(orchestrator, interval).await;

    Ok(())
}

fn build_adapters(config: &Config) -> Vec<Box<dyn ChainAdapter>> {
    let mut adapters: Vec<Box<dyn ChainAdapter>> = Vec::new();
    for chain_config in &config.enabled_chains {
        match chain_config.chain {
            ChainTag::Solana => {
                let staking_program_id = chain_config
                    .staking_contract
                    .as_deref()
                    .and_then(|s| s.parse().ok());
                adapters.push(Box::new(SolanaAdapter::new(SolanaAdapterConfig {
                    rpc_url: chain_config.rpc_url.clone(),
                    staking_program_id,
                    position_batch_size: config.position_batch_size,
                    max_concurrent_batches: config.max_concurrent_batches,
                    batch_delay: Duration::from_millis(config.batch_delay_ms),
                    retry: config.retry_config(),
                })));
            }
            ChainTag::Ethereum | ChainTag::Base => {
                let staking_contract = chain_config
                    .staking_contract
                    .as_deref()
                    .and_then(|s| s.parse().ok());
                let position_manager = chain_config
                    .position_manager
                    .as_deref()
                    .and_then(|s| s.parse().ok());
                adapters.push(Box::new(EvmAdapter::new(EvmAdapterConfig {
                    chain: chain_config.chain,
                    rpc_url: chain_config.rpc_url.clone(),
                    staking_contract,
                    position_manager,
                    max_concurrent_batches: config.max_concurrent_batches,
                    retry: config.retry_config(),
                })));
            }
        }
    }
    adapters
}
