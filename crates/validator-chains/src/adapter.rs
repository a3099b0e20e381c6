use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use validator_types::{Hotkey, Pool, PoolKey, PoolTick, Position, SubnetId};

use crate::error::Result;

/// Everything a chain adapter must expose to the pipeline. One impl per
/// `ChainTag`; dispatch happens by holding a `Vec<Box<dyn ChainAdapter>>`
/// rather than matching on the tag downstream (spec §9 "tagged variants").
///
/// Every method here is fail-isolated by convention: an adapter degrading to
/// an empty result on a broken RPC endpoint is expected behavior, not a bug,
/// so the trait returns `Result` only for the narrow set of errors worth
/// distinguishing in logs. Callers that want the "never abort the run"
/// guarantee from spec §4.A should use the `*_or_empty` helpers below rather
/// than propagating adapter errors into the orchestrator.
#[async_trait]
pub trait ChainAdapter: Send + Sync {
    fn chain(&self) -> validator_types::ChainTag;

    async fn list_active_pools(&self) -> Result<Vec<Pool>>;

    /// `allowed = None` means "all pools this adapter knows about".
    async fn fetch_current_ticks(
        &self,
        allowed: Option<&BTreeSet<PoolKey>>,
    ) -> Result<BTreeMap<PoolKey, PoolTick>>;

    async fn fetch_positions(&self, hotkeys: &BTreeSet<Hotkey>) -> Result<Vec<Position>>;
}

/// Runs `list_active_pools` against every adapter, logging and dropping any
/// adapter whose call failed rather than aborting the run (spec §4.A).
pub async fn list_all_active_pools(adapters: &[Box<dyn ChainAdapter>]) -> Vec<Pool> {
    let mut out = Vec::new();
    for adapter in adapters {
        match adapter.list_active_pools().await {
            Ok(pools) => out.extend(pools),
            Err(err) => {
                tracing::error!(chain = %adapter.chain(), error = %err, "list_active_pools failed, degrading to empty");
            }
        }
    }
    out
}

pub async fn fetch_all_current_ticks(
    adapters: &[Box<dyn ChainAdapter>],
    allowed: Option<&BTreeSet<PoolKey>>,
) -> BTreeMap<PoolKey, PoolTick> {
    let mut out = BTreeMap::new();
    for adapter in adapters {
        match adapter.fetch_current_ticks(allowed).await {
            Ok(ticks) => out.extend(ticks),
            Err(err) => {
                tracing::error!(chain = %adapter.chain(), error = %err, "fetch_current_ticks failed, degrading to empty");
            }
        }
    }
    out
}

pub async fn fetch_all_positions(
    adapters: &[Box<dyn ChainAdapter>],
    hotkeys: &BTreeSet<Hotkey>,
) -> Vec<Position> {
    let mut out = Vec::new();
    for adapter in adapters {
        match adapter.fetch_positions(hotkeys).await {
            Ok(positions) => out.extend(positions),
            Err(err) => {
                tracing::error!(chain = %adapter.chain(), error = %err, "fetch_positions failed, degrading to empty");
            }
        }
    }
    out
}

/// `SubnetId` filter applied by subnet ids a pool belongs to, used by the
/// orchestrator when narrowing `fetch_current_ticks` to the "relevant
/// subnet set" (spec §2 data flow).
pub fn pool_keys_for_subnets(pools: &[Pool], subnets: &BTreeSet<SubnetId>) -> BTreeSet<PoolKey> {
    pools
        .iter()
        .filter(|p| p.active && subnets.contains(&p.subnet))
        .map(|p| p.key.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator_types::ChainTag;

    #[test]
    fn filters_pools_by_subnet_set() {
        let pools = vec![
            Pool { key: PoolKey::new(ChainTag::Solana, "a"), subnet: 1, active: true },
            Pool { key: PoolKey::new(ChainTag::Solana, "b"), subnet: 2, active: true },
            Pool { key: PoolKey::new(ChainTag::Solana, "c"), subnet: 1, active: false },
        ];
        let subnets: BTreeSet<SubnetId> = [1].into_iter().collect();
        let keys = pool_keys_for_subnets(&pools, &subnets);
        assert_eq!(keys.len(), 1);
        assert!(keys.contains(&PoolKey::new(ChainTag::Solana, "a")));
    }
}
