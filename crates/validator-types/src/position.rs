use crate::chain::ChainTag;
use crate::error::{Result, TypesError};
use crate::identity::Hotkey;
use crate::pool::PoolKey;
use serde::{Deserialize, Serialize};

/// A single concentrated-liquidity position owned by a miner, as enumerated
/// from chain state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub miner: Hotkey,
    pub chain: ChainTag,
    pub pool: PoolKey,
    pub token_id: String,
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub liquidity: u128,
}

impl Position {
    /// Constructs a position, rejecting an inverted tick range up front so
    /// every downstream scoring step can assume `tick_lower <= tick_upper`.
    pub fn new(
        miner: Hotkey,
        chain: ChainTag,
        pool: PoolKey,
        token_id: impl Into<String>,
        tick_lower: i32,
        tick_upper: i32,
        liquidity: u128,
    ) -> Result<Self> {
        if tick_lower > tick_upper {
            return Err(TypesError::InvalidTickRange {
                tick_lower,
                tick_upper,
            });
        }
        Ok(Self {
            miner,
            chain,
            pool,
            token_id: token_id.into(),
            tick_lower,
            tick_upper,
            liquidity,
        })
    }

    pub fn width(&self) -> i64 {
        self.tick_upper as i64 - self.tick_lower as i64
    }

    pub fn center(&self) -> f64 {
        (self.tick_lower as f64 + self.tick_upper as f64) / 2.0
    }

    /// Inclusive on both edges, matching the on-chain range semantics this
    /// score is derived from.
    pub fn in_range(&self, current_tick: i32) -> bool {
        current_tick >= self.tick_lower && current_tick <= self.tick_upper
    }
}

/// A scored position: the source position plus the tick it was judged
/// against, its raw score, and the emission it was ultimately assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionEmission {
    pub miner: Hotkey,
    pub chain: ChainTag,
    pub pool: PoolKey,
    pub token_id: String,
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub liquidity: u128,
    pub current_tick: i32,
    pub score: f64,
    pub emission: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> PoolKey {
        PoolKey::new(ChainTag::Solana, "pool-1")
    }

    #[test]
    fn rejects_inverted_tick_range() {
        let err = Position::new(Hotkey::from("alice"), ChainTag::Solana, pool(), "1", 100, 50, 1)
            .unwrap_err();
        assert!(matches!(err, TypesError::InvalidTickRange { .. }));
    }

    #[test]
    fn accepts_equal_bounds_as_zero_width() {
        let pos =
            Position::new(Hotkey::from("alice"), ChainTag::Solana, pool(), "1", 50, 50, 1).unwrap();
        assert_eq!(pos.width(), 0);
    }

    #[test]
    fn in_range_is_inclusive_on_both_edges() {
        let pos =
            Position::new(Hotkey::from("alice"), ChainTag::Solana, pool(), "1", 0, 100, 1).unwrap();
        assert!(pos.in_range(0));
        assert!(pos.in_range(99));
        assert!(pos.in_range(100));
        assert!(!pos.in_range(101));
        assert!(!pos.in_range(-1));
    }
}
