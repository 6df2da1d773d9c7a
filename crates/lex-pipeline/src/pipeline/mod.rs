//! Pipeline module.
//!
//! This module provides the pipeline engine and its progress and
//! cancellation support.

mod builder;
mod executor;
pub mod progress;

pub use builder::{DEFAULT_PIPELINE_NAME, Pipeline};
pub use progress::{
    CancellationToken, ClosureProgressReporter, PipelineStage, ProgressReporter, ProgressUpdate,
};
