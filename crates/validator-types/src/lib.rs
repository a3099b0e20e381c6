pub mod chain;
pub mod error;
pub mod identity;
pub mod pool;
pub mod position;
pub mod weights;

pub use chain::ChainTag;
pub use error::{Result, TypesError};
pub use identity::{Hotkey, SubnetId, Uid, BURN_UID, NO_ALPHA_SUBNET, OWN_SUBNET};
pub use pool::{AlphaPrice, Pool, PoolKey, PoolTick};
pub use position::{Position, PositionEmission};
pub use weights::{EmaMinerWeights, PoolWeights, RawMinerWeights, SubmissionVector};
