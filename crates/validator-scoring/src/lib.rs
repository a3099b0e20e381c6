pub mod aggregator;
pub mod allocator;
pub mod ema;
pub mod error;
pub mod scorer;
pub mod submission;

pub use aggregator::aggregate_miner_weights;
pub use allocator::{AllocationResult, Allocator, AllocatorInput, ChainSplitAllocator, ReservedShareAllocator};
pub use ema::EmaStore;
pub use error::{Result, ScoringError};
pub use scorer::score_positions;
pub use submission::{build_submission_vector, normalize_weights, scale_to_u16, SubmissionPolicyConfig};
