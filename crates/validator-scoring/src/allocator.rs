use std::collections::{BTreeMap, BTreeSet};

use validator_types::{ChainTag, Pool, PoolKey, PoolTick, PoolWeights, Position, SubnetId};

const RESERVED_SUBNET_0: SubnetId = 0;
const RESERVED_SUBNET_106: SubnetId = 106;

/// Everything the pool-weight allocator needs for one run. Borrowed, not
/// owned: this is recomputed fresh every tick and never outlives the run.
pub struct AllocatorInput<'a> {
    pub positions: &'a [Position],
    pub pools: &'a BTreeMap<PoolKey, Pool>,
    pub pool_ticks: &'a BTreeMap<PoolKey, PoolTick>,
    pub alpha_prices: &'a BTreeMap<SubnetId, f64>,
    pub reserved_share_subnet_0: f64,
    pub reserved_share_subnet_106: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AllocationResult {
    pub weights: PoolWeights,
    /// Raw per-subnet alpha prices actually used, kept for the submission log.
    pub subnet_alpha: BTreeMap<SubnetId, f64>,
}

/// A pool-weight policy. More than one exists in production; callers select
/// one at startup and never branch on policy downstream.
pub trait Allocator {
    fn allocate(&self, input: &AllocatorInput<'_>) -> AllocationResult;
}

fn pools_with_tick_data_by_subnet(
    input: &AllocatorInput<'_>,
) -> BTreeMap<SubnetId, BTreeSet<PoolKey>> {
    let mut by_subnet: BTreeMap<SubnetId, BTreeSet<PoolKey>> = BTreeMap::new();
    let mut seen: BTreeSet<&PoolKey> = BTreeSet::new();
    for position in input.positions {
        if !seen.insert(&position.pool) {
            continue;
        }
        if !input.pool_ticks.contains_key(&position.pool) {
            continue;
        }
        let Some(pool) = input.pools.get(&position.pool) else {
            continue;
        };
        if !pool.active {
            continue;
        }
        by_subnet
            .entry(pool.subnet)
            .or_default()
            .insert(position.pool.clone());
    }
    by_subnet
}

/// The default reserved-share policy (spec §4.C): subnet 0 and subnet 106
/// each get a fixed slice split equally across their own pools; the rest is
/// distributed to market-priced subnets proportionally to alpha price.
#[derive(Debug, Clone, Copy)]
pub struct ReservedShareAllocator;

impl Allocator for ReservedShareAllocator {
    fn allocate(&self, input: &AllocatorInput<'_>) -> AllocationResult {
        let by_subnet = pools_with_tick_data_by_subnet(input);
        let mut weights: BTreeMap<PoolKey, f64> = BTreeMap::new();

        let pools0 = by_subnet.get(&RESERVED_SUBNET_0);
        let pools106 = by_subnet.get(&RESERVED_SUBNET_106);

        let r0 = match pools0 {
            Some(p) if !p.is_empty() => input.reserved_share_subnet_0.clamp(0.0, 1.0),
            _ => 0.0,
        };
        let r106 = match pools106 {
            Some(p) if !p.is_empty() => input.reserved_share_subnet_106.clamp(0.0, (1.0 - r0).max(0.0)),
            _ => 0.0,
        };
        let remaining = (1.0 - r0 - r106).max(0.0);

        if let Some(pools) = pools0 {
            if !pools.is_empty() {
                let share = r0 / pools.len() as f64;
                for pool in pools {
                    *weights.entry(pool.clone()).or_insert(0.0) += share;
                }
            }
        }
        if let Some(pools) = pools106 {
            if !pools.is_empty() {
                let share = r106 / pools.len() as f64;
                for pool in pools {
                    *weights.entry(pool.clone()).or_insert(0.0) += share;
                }
            }
        }

        let other_subnets: BTreeMap<&SubnetId, &BTreeSet<PoolKey>> = by_subnet
            .iter()
            .filter(|(subnet, _)| **subnet != RESERVED_SUBNET_0 && **subnet != RESERVED_SUBNET_106)
            .collect();

        let mut subnet_alpha: BTreeMap<SubnetId, f64> = BTreeMap::new();
        if !other_subnets.is_empty() && remaining > 0.0 {
            let alphas: BTreeMap<SubnetId, f64> = other_subnets
                .keys()
                .map(|&&s| (s, input.alpha_prices.get(&s).copied().unwrap_or(0.0).max(0.0)))
                .collect();
            let alpha_sum: f64 = alphas.values().sum();
            subnet_alpha = alphas.clone();

            if alpha_sum > 0.0 {
                for (&subnet, pools) in &other_subnets {
                    if pools.is_empty() {
                        continue;
                    }
                    let subnet_share = remaining * alphas[subnet] / alpha_sum;
                    let per_pool = subnet_share / pools.len() as f64;
                    for pool in *pools {
                        *weights.entry(pool.clone()).or_insert(0.0) += per_pool;
                    }
                }
            } else {
                let total_pools: usize = other_subnets.values().map(|p| p.len()).sum();
                if total_pools > 0 {
                    let per_pool = remaining / total_pools as f64;
                    for pools in other_subnets.values() {
                        for pool in *pools {
                            *weights.entry(pool.clone()).or_insert(0.0) += per_pool;
                        }
                    }
                }
            }
        }

        AllocationResult {
            weights: PoolWeights(weights),
            subnet_alpha,
        }
    }
}

/// Chain-split variant (spec §4.C policy-variant note): subnet 0 is split
/// equally between Solana pools and EVM pools; subnet 106 goes only to EVM
/// pools. Other-subnet distribution is unchanged from the reserved-share
/// policy.
#[derive(Debug, Clone, Copy)]
pub struct ChainSplitAllocator;

fn is_evm(chain: ChainTag) -> bool {
    matches!(chain, ChainTag::Ethereum | ChainTag::Base)
}

impl Allocator for ChainSplitAllocator {
    fn allocate(&self, input: &AllocatorInput<'_>) -> AllocationResult {
        let by_subnet = pools_with_tick_data_by_subnet(input);
        let mut weights: BTreeMap<PoolKey, f64> = BTreeMap::new();

        let pool_chain = |key: &PoolKey| key.chain;

        let pools0 = by_subnet.get(&RESERVED_SUBNET_0).cloned().unwrap_or_default();
        let pools106 = by_subnet
            .get(&RESERVED_SUBNET_106)
            .cloned()
            .unwrap_or_default();

        let r0 = if !pools0.is_empty() {
            input.reserved_share_subnet_0.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let r106_pools_evm: BTreeSet<PoolKey> =
            pools106.iter().filter(|p| is_evm(pool_chain(p))).cloned().collect();
        let r106 = if !r106_pools_evm.is_empty() {
            input
                .reserved_share_subnet_106
                .clamp(0.0, (1.0 - r0).max(0.0))
        } else {
            0.0
        };
        let remaining = (1.0 - r0 - r106).max(0.0);

        if !pools0.is_empty() {
            let solana_pools: BTreeSet<PoolKey> = pools0
                .iter()
                .filter(|p| pool_chain(p) == ChainTag::Solana)
                .cloned()
                .collect();
            let evm_pools: BTreeSet<PoolKey> =
                pools0.iter().filter(|p| is_evm(pool_chain(p))).cloned().collect();

            let (solana_share, evm_share) = match (solana_pools.is_empty(), evm_pools.is_empty()) {
                (true, true) => (0.0, 0.0),
                (true, false) => (0.0, r0),
                (false, true) => (r0, 0.0),
                (false, false) => (r0 / 2.0, r0 / 2.0),
            };
            if !solana_pools.is_empty() {
                let per_pool = solana_share / solana_pools.len() as f64;
                for pool in &solana_pools {
                    *weights.entry(pool.clone()).or_insert(0.0) += per_pool;
                }
            }
            if !evm_pools.is_empty() {
                let per_pool = evm_share / evm_pools.len() as f64;
                for pool in &evm_pools {
                    *weights.entry(pool.clone()).or_insert(0.0) += per_pool;
                }
            }
        }

        if !r106_pools_evm.is_empty() {
            let per_pool = r106 / r106_pools_evm.len() as f64;
            for pool in &r106_pools_evm {
                *weights.entry(pool.clone()).or_insert(0.0) += per_pool;
            }
        }

        let other_subnets: BTreeMap<&SubnetId, &BTreeSet<PoolKey>> = by_subnet
            .iter()
            .filter(|(subnet, _)| **subnet != RESERVED_SUBNET_0 && **subnet != RESERVED_SUBNET_106)
            .collect();

        let mut subnet_alpha: BTreeMap<SubnetId, f64> = BTreeMap::new();
        if !other_subnets.is_empty() && remaining > 0.0 {
            let alphas: BTreeMap<SubnetId, f64> = other_subnets
                .keys()
                .map(|&&s| (s, input.alpha_prices.get(&s).copied().unwrap_or(0.0).max(0.0)))
                .collect();
            let alpha_sum: f64 = alphas.values().sum();
            subnet_alpha = alphas.clone();

            if alpha_sum > 0.0 {
                for (&subnet, pools) in &other_subnets {
                    if pools.is_empty() {
                        continue;
                    }
                    let subnet_share = remaining * alphas[subnet] / alpha_sum;
                    let per_pool = subnet_share / pools.len() as f64;
                    for pool in *pools {
                        *weights.entry(pool.clone()).or_insert(0.0) += per_pool;
                    }
                }
            } else {
                let total_pools: usize = other_subnets.values().map(|p| p.len()).sum();
                if total_pools > 0 {
                    let per_pool = remaining / total_pools as f64;
                    for pools in other_subnets.values() {
                        for pool in *pools {
                            *weights.entry(pool.clone()).or_insert(0.0) += per_pool;
                        }
                    }
                }
            }
        }

        AllocationResult {
            weights: PoolWeights(weights),
            subnet_alpha,
        }
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use validator_types::Hotkey;

    fn pool(chain: ChainTag, id: &str) -> PoolKey {
        PoolKey::new(chain, id)
    }

    proptest! {
        /// Invariant 1 (spec §8): total allocated weight never exceeds
        /// `1 + 1e-9`, and subnet 0 receives exactly `r0` whenever it has at
        /// least one tick-bearing pool.
        #[test]
        fn weights_never_exceed_one_and_reserved_share_is_exact(
            r0 in 0.0f64..=1.0,
            other_alpha in 0.0f64..10.0,
        ) {
            let p0 = pool(ChainTag::Solana, "p0");
            let p1 = pool(ChainTag::Ethereum, "p1");
            let positions = vec![
                Position::new(Hotkey::from("m0"), ChainTag::Solana, p0.clone(), "1", -1, 1, 1).unwrap(),
                Position::new(Hotkey::from("m1"), ChainTag::Ethereum, p1.clone(), "1", -1, 1, 1).unwrap(),
            ];
            let pools: BTreeMap<_, _> = [
                (p0.clone(), Pool { key: p0.clone(), subnet: 0, active: true }),
                (p1.clone(), Pool { key: p1.clone(), subnet: 1, active: true }),
            ]
            .into_iter()
            .collect();
            let pool_ticks: BTreeMap<_, _> = [
                (p0.clone(), PoolTick { current_tick: Some(0) }),
                (p1.clone(), PoolTick { current_tick: Some(0) }),
            ]
            .into_iter()
            .collect();
            let alpha_prices: BTreeMap<_, _> = [(1u16, other_alpha)].into_iter().collect();

            let input = AllocatorInput {
                positions: &positions,
                pools: &pools,
                pool_ticks: &pool_ticks,
                alpha_prices: &alpha_prices,
                reserved_share_subnet_0: r0,
                reserved_share_subnet_106: 0.0,
            };
            let result = ReservedShareAllocator.allocate(&input);
            prop_assert!(result.weights.total() <= 1.0 + 1e-9);
            prop_assert!((result.weights.get(&p0) - r0).abs() < 1e-9);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator_types::Hotkey;

    fn pool(chain: ChainTag, id: &str) -> PoolKey {
        PoolKey::new(chain, id)
    }

    fn active_pool(key: PoolKey, subnet: SubnetId) -> Pool {
        Pool {
            key,
            subnet,
            active: true,
        }
    }

    fn position(pool: PoolKey) -> Position {
        Position::new(Hotkey::from("miner"), pool.chain, pool, "1", -10, 10, 1).unwrap()
    }

    fn ticked(pool: &PoolKey) -> (PoolKey, PoolTick) {
        (pool.clone(), PoolTick { current_tick: Some(0) })
    }

    #[test]
    fn scenario_s1_two_subnet_zero_pools_no_others() {
        let p0a = pool(ChainTag::Solana, "p0a");
        let p0b = pool(ChainTag::Solana, "p0b");
        let positions = vec![position(p0a.clone()), position(p0b.clone())];
        let pools: BTreeMap<_, _> = [
            (p0a.clone(), active_pool(p0a.clone(), 0)),
            (p0b.clone(), active_pool(p0b.clone(), 0)),
        ]
        .into_iter()
        .collect();
        let pool_ticks: BTreeMap<_, _> = [ticked(&p0a), ticked(&p0b)].into_iter().collect();
        let alpha_prices = BTreeMap::new();

        let input = AllocatorInput {
            positions: &positions,
            pools: &pools,
            pool_ticks: &pool_ticks,
            alpha_prices: &alpha_prices,
            reserved_share_subnet_0: 0.25,
            reserved_share_subnet_106: 0.0,
        };
        let result = ReservedShareAllocator.allocate(&input);
        assert!((result.weights.get(&p0a) - 0.125).abs() < 1e-9);
        assert!((result.weights.get(&p0b) - 0.125).abs() < 1e-9);
        assert!((result.weights.total() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn scenario_s2_alpha_weighted_other_subnets() {
        let p0a = pool(ChainTag::Solana, "p0a");
        let p0b = pool(ChainTag::Solana, "p0b");
        let p1a = pool(ChainTag::Ethereum, "p1a");
        let p1b = pool(ChainTag::Ethereum, "p1b");
        let p1c = pool(ChainTag::Ethereum, "p1c");
        let p2a = pool(ChainTag::Base, "p2a");

        let positions = vec![
            position(p0a.clone()),
            position(p0b.clone()),
            position(p1a.clone()),
            position(p1b.clone()),
            position(p1c.clone()),
            position(p2a.clone()),
        ];
        let pools: BTreeMap<_, _> = [
            (p0a.clone(), active_pool(p0a.clone(), 0)),
            (p0b.clone(), active_pool(p0b.clone(), 0)),
            (p1a.clone(), active_pool(p1a.clone(), 1)),
            (p1b.clone(), active_pool(p1b.clone(), 1)),
            (p1c.clone(), active_pool(p1c.clone(), 1)),
            (p2a.clone(), active_pool(p2a.clone(), 2)),
        ]
        .into_iter()
        .collect();
        let pool_ticks: BTreeMap<_, _> = [
            ticked(&p0a),
            ticked(&p0b),
            ticked(&p1a),
            ticked(&p1b),
            ticked(&p1c),
            ticked(&p2a),
        ]
        .into_iter()
        .collect();
        let alpha_prices: BTreeMap<_, _> = [(0u16, 0.0), (1u16, 2.0), (2u16, 1.0)].into_iter().collect();

        let input = AllocatorInput {
            positions: &positions,
            pools: &pools,
            pool_ticks: &pool_ticks,
            alpha_prices: &alpha_prices,
            reserved_share_subnet_0: 0.25,
            reserved_share_subnet_106: 0.0,
        };
        let result = ReservedShareAllocator.allocate(&input);
        assert!((result.weights.get(&p0a) - 0.125).abs() < 1e-9);
        assert!((result.weights.get(&p1a) - 0.5 / 3.0).abs() < 1e-9);
        assert!((result.weights.get(&p2a) - 0.25).abs() < 1e-9);
        assert!((result.weights.total() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn unallocated_share_when_no_other_subnet_pools() {
        let p0a = pool(ChainTag::Solana, "p0a");
        let positions = vec![position(p0a.clone())];
        let pools: BTreeMap<_, _> = [(p0a.clone(), active_pool(p0a.clone(), 0))].into_iter().collect();
        let pool_ticks: BTreeMap<_, _> = [ticked(&p0a)].into_iter().collect();
        let alpha_prices = BTreeMap::new();

        let input = AllocatorInput {
            positions: &positions,
            pools: &pools,
            pool_ticks: &pool_ticks,
            alpha_prices: &alpha_prices,
            reserved_share_subnet_0: 0.25,
            reserved_share_subnet_106: 0.0,
        };
        let result = ReservedShareAllocator.allocate(&input);
        assert!(result.weights.total() < 1.0 - 1e-9);
    }
}
