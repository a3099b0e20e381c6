use std::collections::BTreeMap;

use validator_types::{PoolKey, PoolTick, PoolWeights, Position, PositionEmission};

/// Scores every position against the pool's current tick and distributes
/// each pool's reward across its in-range positions proportionally.
///
/// Pure, order-independent up to float associativity: positions are grouped
/// by pool, then iterated sorted by `(pool, token_id)` so results are
/// reproducible across runs (spec determinism note, §4.D).
pub fn score_positions(
    positions: &[Position],
    pool_ticks: &BTreeMap<PoolKey, PoolTick>,
    pool_weights: &PoolWeights,
    total_reward: f64,
) -> Vec<PositionEmission> {
    let mut by_pool: BTreeMap<PoolKey, Vec<&Position>> = BTreeMap::new();
    for position in positions {
        by_pool.entry(position.pool.clone()).or_default().push(position);
    }
    for bucket in by_pool.values_mut() {
        bucket.sort_by(|a, b| a.token_id.cmp(&b.token_id));
    }

    let mut out = Vec::with_capacity(positions.len());
    for (pool, bucket) in by_pool {
        let pool_weight = pool_weights.get(&pool);
        let pool_reward = if pool_weight > 0.0 {
            pool_weight * total_reward
        } else {
            0.0
        };

        let current_tick = pool_ticks.get(&pool).map(|t| t.tick_or_zero()).unwrap_or(0);
        // A pool with no tick reading at all is treated as missing ⇒ every
        // position in it is out-of-range, matching the documented (if
        // arguably surprising) tick=0 fallback behavior.
        let has_tick_data = pool_ticks.contains_key(&pool);

        let scored: Vec<(f64, &Position)> = bucket
            .into_iter()
            .map(|position| {
                let score = if has_tick_data && position.in_range(current_tick) {
                    raw_score(position, current_tick)
                } else {
                    0.0
                };
                (score, position)
            })
            .collect();

        let score_sum: f64 = scored.iter().map(|(s, _)| s).sum();

        for (score, position) in scored {
            let emission = if pool_reward > 0.0 && score_sum > 0.0 {
                score * pool_reward / score_sum
            } else {
                0.0
            };
            out.push(PositionEmission {
                miner: position.miner.clone(),
                chain: position.chain,
                pool: position.pool.clone(),
                token_id: position.token_id.clone(),
                tick_lower: position.tick_lower,
                tick_upper: position.tick_upper,
                liquidity: position.liquidity,
                current_tick,
                score,
                emission,
            });
        }
    }
    out
}

fn raw_score(position: &Position, current_tick: i32) -> f64 {
    if position.liquidity == 0 {
        return 0.0;
    }
    let width = position.width().max(1) as f64;
    let center = position.center();
    let distance = (center - current_tick as f64).abs();
    let width_penalty = 1.0 / width.powf(1.2);
    let center_weight = 1.0 / (1.0 + distance);
    width_penalty * center_weight * position.liquidity as f64
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use validator_types::{ChainTag, Hotkey};

    proptest! {
        /// Invariant 2 (spec §8): within a pool, emissions sum to
        /// `poolWeight * totalReward`, provided some score in the pool is
        /// positive.
        #[test]
        fn pool_wise_emission_is_additive(
            liquidities in prop::collection::vec(1u128..10_000, 1..6),
            pool_weight in 0.01f64..1.0,
            total_reward in 1.0f64..1_000.0,
        ) {
            let pool = PoolKey::new(ChainTag::Solana, "pA");
            let positions: Vec<Position> = liquidities
                .iter()
                .enumerate()
                .map(|(i, &liq)| {
                    Position::new(Hotkey::from(format!("m{i}")), ChainTag::Solana, pool.clone(), i.to_string(), -10, 10, liq)
                        .unwrap()
                })
                .collect();
            let pool_ticks: BTreeMap<_, _> = [(pool.clone(), PoolTick { current_tick: Some(0) })].into_iter().collect();
            let weights = PoolWeights([(pool.clone(), pool_weight)].into_iter().collect());

            let emissions = score_positions(&positions, &pool_ticks, &weights, total_reward);
            let sum: f64 = emissions.iter().map(|e| e.emission).sum();
            let expected = pool_weight * total_reward;
            prop_assert!((sum - expected).abs() < 1e-6 * total_reward + 1e-9);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator_types::{ChainTag, Hotkey};

    fn pos(id: &str, lower: i32, upper: i32, liquidity: u128) -> Position {
        Position::new(
            Hotkey::from("miner"),
            ChainTag::Solana,
            PoolKey::new(ChainTag::Solana, "pA"),
            id,
            lower,
            upper,
            liquidity,
        )
        .unwrap()
    }

    fn weights_of(pool: &PoolKey, w: f64) -> PoolWeights {
        PoolWeights([(pool.clone(), w)].into_iter().collect())
    }

    #[test]
    fn scenario_s3_proportional_to_liquidity() {
        let pool = PoolKey::new(ChainTag::Solana, "pA");
        let positions = vec![
            pos("1", -1, 1, 100),
            pos("2", -1, 1, 100),
            pos("3", -1, 1, 200),
        ];
        let pool_ticks: BTreeMap<_, _> = [(pool.clone(), PoolTick { current_tick: Some(0) })]
            .into_iter()
            .collect();
        let result = score_positions(&positions, &pool_ticks, &weights_of(&pool, 1.0), 1.0);
        let sum: f64 = result.iter().map(|e| e.emission).sum();
        assert!((sum - 1.0).abs() < 1e-9);
        assert!((result[0].emission - 0.25).abs() < 1e-9);
        assert!((result[2].emission - 0.5).abs() < 1e-9);
    }

    #[test]
    fn scenario_s4_boundary_ticks_are_inclusive() {
        let pool = PoolKey::new(ChainTag::Solana, "pA");
        let a = pos("a", 100, 110, 1000);
        let b = pos("b", 90, 100, 1000);
        let c = pos("c", 101, 110, 1000);
        let d = pos("d", 90, 99, 1000);
        let positions = vec![a, b, c, d];
        let pool_ticks: BTreeMap<_, _> = [(pool.clone(), PoolTick { current_tick: Some(100) })]
            .into_iter()
            .collect();
        let result = score_positions(&positions, &pool_ticks, &weights_of(&pool, 1.0), 1.0);
        let find = |id: &str| result.iter().find(|e| e.token_id == id).unwrap();
        assert!(find("a").emission > 0.0);
        assert!(find("b").emission > 0.0);
        assert_eq!(find("c").emission, 0.0);
        assert_eq!(find("d").emission, 0.0);
        assert!((find("a").emission + find("b").emission - 1.0).abs() < 1e-9);
    }

    #[test]
    fn missing_tick_data_is_out_of_range() {
        let pool = PoolKey::new(ChainTag::Solana, "pA");
        let positions = vec![pos("1", -5, 5, 100)];
        let pool_ticks = BTreeMap::new();
        let result = score_positions(&positions, &pool_ticks, &weights_of(&pool, 1.0), 1.0);
        assert_eq!(result[0].score, 0.0);
        assert_eq!(result[0].emission, 0.0);
    }

    #[test]
    fn zero_liquidity_scores_zero_even_in_range() {
        let pool = PoolKey::new(ChainTag::Solana, "pA");
        let positions = vec![pos("1", -5, 5, 0)];
        let pool_ticks: BTreeMap<_, _> = [(pool.clone(), PoolTick { current_tick: Some(0) })]
            .into_iter()
            .collect();
        let result = score_positions(&positions, &pool_ticks, &weights_of(&pool, 1.0), 1.0);
        assert_eq!(result[0].score, 0.0);
        assert_eq!(result[0].emission, 0.0);
    }

    #[test]
    fn doubling_liquidity_doubles_score() {
        let a = pos("1", -5, 5, 100);
        let b = pos("2", -5, 5, 200);
        let tick = 0;
        assert!((raw_score(&b, tick) - 2.0 * raw_score(&a, tick)).abs() < 1e-9);
    }

    #[test]
    fn narrower_width_scores_higher_at_same_center() {
        let narrow = pos("1", -5, 5, 100);
        let wide = pos("2", -50, 50, 100);
        assert!(raw_score(&narrow, 0) > raw_score(&wide, 0));
    }
}
