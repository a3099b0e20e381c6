//! Drives one full A→B→C→D→E→F→G→B(submit) pass (spec §2 data flow, §4.H).

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info};

use validator_chains::{fetch_all_current_ticks, fetch_all_positions, list_all_active_pools, pool_keys_for_subnets, ChainAdapter};
use validator_scoring::{aggregate_miner_weights, score_positions, AllocationResult, Allocator, AllocatorInput, EmaStore, SubmissionPolicyConfig};
use validator_substrate::{current_block_number, hotkey_to_uid, subnet_alpha_prices, submit_set_weights, Signer, SubstrateClient};
use validator_types::{Pool, PoolKey, PoolTick, SubnetId, NO_ALPHA_SUBNET, OWN_SUBNET};

use crate::error::{OrchestratorError, Result};
use crate::submission_log::{SubmissionLog, SubmissionLogEntry};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub netuid: u16,
    pub total_reward: f64,
    pub reserved_share_subnet_0: f64,
    pub reserved_share_subnet_106: f64,
    pub burn_uid: u16,
    pub burn_percentage: f64,
    pub use_ema: bool,
    pub ema_epsilon: f64,
}

pub struct Orchestrator {
    substrate: Arc<SubstrateClient>,
    adapters: Vec<Box<dyn ChainAdapter>>,
    allocator: Box<dyn Allocator + Send + Sync>,
    ema_store: EmaStore,
    config: PipelineConfig,
    submission_log: SubmissionLog,
    signer: Signer,
}

impl Orchestrator {
    pub fn new(
        substrate: Arc<SubstrateClient>,
        adapters: Vec<Box<dyn ChainAdapter>>,
        allocator: Box<dyn Allocator + Send + Sync>,
        ema_store: EmaStore,
        config: PipelineConfig,
        submission_log: SubmissionLog,
        signer: Signer,
    ) -> Self {
        Self {
            substrate,
            adapters,
            allocator,
            ema_store,
            config,
            submission_log,
            signer,
        }
    }

    /// The process-wide substrate handle, so the scheduler can drive the
    /// spec §4.B background health-check and close the connection on
    /// shutdown without the `Orchestrator` itself owning that lifecycle.
    pub fn substrate_handle(&self) -> Arc<SubstrateClient> {
        self.substrate.clone()
    }

    /// Every external call this run makes is fail-isolated up to component
    /// B's `hotkey_to_uid`, whose emptiness is the one invariant violation
    /// that aborts the run outright (spec §7 item 4).
    pub async fn run_once(&mut self) -> Result<()> {
        let hotkey_to_uid = hotkey_to_uid(&self.substrate, self.config.netuid).await?;
        if hotkey_to_uid.is_empty() {
            return Err(OrchestratorError::InvariantViolation(
                "hotkey_to_uid map is empty".to_string(),
            ));
        }
        let hotkeys: BTreeSet<_> = hotkey_to_uid.keys().cloned().collect();

        let positions = fetch_all_positions(&self.adapters, &hotkeys).await;
        let pools = list_all_active_pools(&self.adapters).await;
        let pools_by_key: BTreeMap<PoolKey, Pool> =
            pools.iter().cloned().map(|p| (p.key.clone(), p)).collect();

        let relevant_subnets: BTreeSet<SubnetId> = pools.iter().map(|p| p.subnet).collect();
        let allowed_keys = pool_keys_for_subnets(&pools, &relevant_subnets);
        let pool_ticks: BTreeMap<PoolKey, PoolTick> =
            fetch_all_current_ticks(&self.adapters, Some(&allowed_keys)).await;

        let other_subnets: Vec<SubnetId> = relevant_subnets
            .iter()
            .copied()
            .filter(|s| *s != NO_ALPHA_SUBNET && *s != OWN_SUBNET)
            .collect();
        let alpha_prices = subnet_alpha_prices(&self.substrate, &other_subnets).await?;
        let alpha_prices_f64: BTreeMap<SubnetId, f64> = alpha_prices
            .into_iter()
            .map(|(s, p)| (s, p.as_float()))
            .collect();

        let allocator_input = AllocatorInput {
            positions: &positions,
            pools: &pools_by_key,
            pool_ticks: &pool_ticks,
            alpha_prices: &alpha_prices_f64,
            reserved_share_subnet_0: self.config.reserved_share_subnet_0,
            reserved_share_subnet_106: self.config.reserved_share_subnet_106,
        };
        let AllocationResult { weights: pool_weights, .. } = self.allocator.allocate(&allocator_input);

        let emissions = score_positions(&positions, &pool_ticks, &pool_weights, self.config.total_reward);
        let raw = aggregate_miner_weights(&emissions);

        self.ema_store.update(&raw);

        let policy = SubmissionPolicyConfig {
            burn_uid: self.config.burn_uid,
            burn_percentage: self.config.burn_percentage,
            use_ema: self.config.use_ema,
            ema_epsilon: self.config.ema_epsilon,
        };
        let submission = validator_scoring::build_submission_vector(
            &raw,
            &hotkey_to_uid,
            Some(self.ema_store.current()),
            &policy,
        )?;

        let version_key = current_block_number(&self.substrate).await?;

        match submit_set_weights(&self.substrate, self.config.netuid, &submission, version_key, &self.signer).await {
            Ok(tx_hash) => {
                info!(netuid = self.config.netuid, version_key, tx_hash = %tx_hash, "submitted set_weights");
                self.submission_log.append(SubmissionLogEntry {
                    timestamp: Utc::now().to_rfc3339(),
                    tx_hash,
                    version_key,
                    weights: submission.0,
                });
                Ok(())
            }
            Err(err) => {
                error!(error = %err, "set_weights submission failed, no log entry written");
                Err(OrchestratorError::Substrate(err))
            }
        }
    }

    /// Best-effort run used by the scheduler: errors are logged, never
    /// propagated, so a bad tick never kills the process (spec §7 item 4/5).
    pub async fn run_once_logged(&mut self) {
        if let Err(err) = self.run_once().await {
            error!(error = %err, "validator run failed, will retry next scheduled tick");
        }
    }
}
