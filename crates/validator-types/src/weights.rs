use crate::identity::{Hotkey, Uid};
use crate::pool::PoolKey;
use std::collections::BTreeMap;

/// Output of the pool-weight allocator (component C): how much of the
/// subnet's total emission each pool is entitled to this epoch, summing to
/// `1.0` (or to `0.0` when no pool qualifies).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoolWeights(pub BTreeMap<PoolKey, f64>);

impl PoolWeights {
    pub fn total(&self) -> f64 {
        self.0.values().sum()
    }

    pub fn get(&self, pool: &PoolKey) -> f64 {
        self.0.get(pool).copied().unwrap_or(0.0)
    }
}

/// Per-miner raw scores for the current epoch, before EMA smoothing.
/// Miners absent from the map earned nothing this epoch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawMinerWeights(pub BTreeMap<Hotkey, f64>);

/// Per-miner EMA-smoothed scores, persisted across epochs by component F.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmaMinerWeights(pub BTreeMap<Hotkey, f64>);

impl EmaMinerWeights {
    pub fn get(&self, miner: &Hotkey) -> f64 {
        self.0.get(miner).copied().unwrap_or(0.0)
    }
}

/// The final integer weight vector, indexed by UID, ready for a
/// `set_weights` extrinsic. Entries are expected to sum to `u16::MAX` once
/// scaling (component G) has run, except in the all-zero case.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmissionVector(pub BTreeMap<Uid, u16>);

impl SubmissionVector {
    pub fn sum(&self) -> u32 {
        self.0.values().map(|&w| w as u32).sum()
    }

    pub fn is_all_zero(&self) -> bool {
        self.0.values().all(|&w| w == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ChainTag;

    #[test]
    fn pool_weights_total_sums_values() {
        let mut w = PoolWeights::default();
        w.0.insert(PoolKey::new(ChainTag::Solana, "a"), 0.4);
        w.0.insert(PoolKey::new(ChainTag::Solana, "b"), 0.6);
        assert!((w.total() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn submission_vector_detects_all_zero() {
        let mut v = SubmissionVector::default();
        v.0.insert(0, 0);
        v.0.insert(1, 0);
        assert!(v.is_all_zero());
        v.0.insert(1, 5);
        assert!(!v.is_all_zero());
    }
}
