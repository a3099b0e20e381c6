pub mod error;
pub mod pipeline;
pub mod scheduler;
pub mod submission_log;

pub use error::{OrchestratorError, Result};
pub use pipeline::{Orchestrator, PipelineConfig};
pub use scheduler::{run_forever, Interval};
pub use submission_log::{path_for_workdir, SubmissionLog, SubmissionLogEntry};
