use crate::chain::ChainTag;
use crate::error::{Result, TypesError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Globally unique identifier for a concentrated-liquidity pool: the chain
/// it lives on plus that chain's native pool address/id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PoolKey {
    pub chain: ChainTag,
    pub native_id: String,
}

impl PoolKey {
    pub fn new(chain: ChainTag, native_id: impl Into<String>) -> Self {
        Self {
            chain,
            native_id: native_id.into(),
        }
    }
}

impl fmt::Display for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chain, self.native_id)
    }
}

impl FromStr for PoolKey {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self> {
        let (chain_str, native_id) = s
            .split_once(':')
            .ok_or_else(|| TypesError::MalformedPoolKey(s.to_string()))?;
        let chain = ChainTag::from_str(chain_str)
            .map_err(|_| TypesError::MalformedPoolKey(s.to_string()))?;
        if native_id.is_empty() {
            return Err(TypesError::MalformedPoolKey(s.to_string()));
        }
        Ok(PoolKey::new(chain, native_id))
    }
}

/// A pool as enumerated from chain state, before any scoring has happened.
/// `(PoolKey -> SubnetId)` is authoritative: a position's subnet is always
/// looked up through its pool, never carried on the position itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pool {
    pub key: PoolKey,
    pub subnet: crate::identity::SubnetId,
    pub active: bool,
}

/// Current tick and alpha-denominated price for a pool at the time of a
/// scoring pass. `current_tick` is `None` when the adapter could not read
/// the pool's slot0/current-tick state; callers treat that the same as a
/// pool with zero active liquidity (spec.md §9 open question: preserved
/// as-is rather than treated as an error).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoolTick {
    pub current_tick: Option<i32>,
}

impl PoolTick {
    /// Tick value to score against, defaulting missing reads to 0.
    pub fn tick_or_zero(&self) -> i32 {
        self.current_tick.unwrap_or(0)
    }
}

/// Alpha-denominated price of a subnet's token, as read from the substrate
/// chain. Represented as a fixed-point integer scaled by `SCALE` to avoid
/// floating point in consensus-relevant arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlphaPrice(pub u128);

impl AlphaPrice {
    /// 1e18: spec §3 requires "≥18-decimal fixed-point scaling before float
    /// conversion to preserve precision".
    pub const SCALE: u128 = 1_000_000_000_000_000_000;

    pub fn from_float(value: f64) -> Self {
        Self((value * Self::SCALE as f64).round() as u128)
    }

    pub fn as_float(&self) -> f64 {
        self.0 as f64 / Self::SCALE as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_key_round_trips_through_display() {
        let key = PoolKey::new(ChainTag::Solana, "4ZY8v...pool");
        let parsed: PoolKey = key.to_string().parse().unwrap();
        assert_eq!(parsed, key);
    }

    #[test]
    fn pool_key_rejects_missing_separator() {
        assert!("solana-only".parse::<PoolKey>().is_err());
    }

    #[test]
    fn missing_tick_defaults_to_zero() {
        let tick = PoolTick { current_tick: None };
        assert_eq!(tick.tick_or_zero(), 0);
    }
}
