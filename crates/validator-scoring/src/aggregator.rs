use validator_types::{Hotkey, PositionEmission, RawMinerWeights};

/// Sums per-position emissions into per-hotkey raw weights (spec §4.E).
/// Hotkeys with no positions, or whose positions all scored zero, are
/// simply absent from the result.
pub fn aggregate_miner_weights(emissions: &[PositionEmission]) -> RawMinerWeights {
    let mut totals: std::collections::BTreeMap<Hotkey, f64> = std::collections::BTreeMap::new();
    for emission in emissions {
        if emission.emission > 0.0 {
            *totals.entry(emission.miner.clone()).or_insert(0.0) += emission.emission;
        }
    }
    RawMinerWeights(totals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator_types::{ChainTag, PoolKey};

    fn emission(miner: &str, pool: &str, value: f64) -> PositionEmission {
        PositionEmission {
            miner: Hotkey::from(miner),
            chain: ChainTag::Solana,
            pool: PoolKey::new(ChainTag::Solana, pool),
            token_id: "1".to_string(),
            tick_lower: -1,
            tick_upper: 1,
            liquidity: 1,
            current_tick: 0,
            score: value,
            emission: value,
        }
    }

    #[test]
    fn sums_across_positions_for_the_same_miner() {
        let emissions = vec![
            emission("alice", "p1", 0.2),
            emission("alice", "p2", 0.3),
            emission("bob", "p1", 0.1),
        ];
        let raw = aggregate_miner_weights(&emissions);
        assert!((raw.0.get(&Hotkey::from("alice")).copied().unwrap() - 0.5).abs() < 1e-9);
        assert!((raw.0.get(&Hotkey::from("bob")).copied().unwrap() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn zero_emission_produces_no_entry() {
        let emissions = vec![emission("alice", "p1", 0.0)];
        let raw = aggregate_miner_weights(&emissions);
        assert!(raw.0.is_empty());
    }
}
