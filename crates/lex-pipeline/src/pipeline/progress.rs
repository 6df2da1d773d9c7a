//! Progress reporting and cancellation support for pipeline runs.
//!
//! A run reports an `Initializing` [`ProgressUpdate`], then one update as
//! each stage starts, then a terminal update (`Complete`, `Cancelled` or
//! `Failed`). A [`CancellationToken`] can be cancelled from any thread; the
//! pipeline checks it before every stage.
//!
//! # Example
//!
//! ```rust,ignore
//! use lex_pipeline::{CancellationToken, Pipeline};
//!
//! let token = CancellationToken::new();
//! let token_clone = token.clone();
//!
//! std::thread::spawn(move || {
//!     std::thread::sleep(std::time::Duration::from_secs(5));
//!     token_clone.cancel();
//! });
//!
//! let result = pipeline
//!     .cancellation_token(token)
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .run();
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Stages of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Validating the pipeline before any component runs
    Initializing,
    /// Running the loader
    Loading,
    /// Running one of the processors
    Processing,
    /// Running the writer
    Writing,
    /// Run completed successfully
    Complete,
    /// Run was cancelled through its token
    Cancelled,
    /// Run failed with an error
    Failed,
}

impl PipelineStage {
    /// Returns a human-readable name for the stage.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Initializing => "Initializing",
            Self::Loading => "Loading Data",
            Self::Processing => "Processing Data",
            Self::Writing => "Writing Data",
            Self::Complete => "Complete",
            Self::Cancelled => "Cancelled",
            Self::Failed => "Failed",
        }
    }

    /// Whether the run is over once this stage is reported.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Cancelled | Self::Failed)
    }
}

/// A progress event emitted during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Current pipeline stage
    pub stage: PipelineStage,

    /// Name of the component executing the stage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,

    /// Overall progress (0.0 - 1.0), measured in completed stages
    pub progress: f32,

    /// Human-readable message describing current activity
    pub message: String,

    /// Number of stages finished so far
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stages_completed: Option<usize>,

    /// Total number of stages in the run (loader + processors + writer)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stages_total: Option<usize>,
}

impl ProgressUpdate {
    /// Creates an update without component or stage counts.
    pub fn new(stage: PipelineStage, progress: f32, message: impl Into<String>) -> Self {
        Self {
            stage,
            component: None,
            progress: progress.clamp(0.0, 1.0),
            message: message.into(),
            stages_completed: None,
            stages_total: None,
        }
    }

    /// Creates an update for a component stage, with progress derived from
    /// the number of completed stages.
    pub fn for_stage(
        stage: PipelineStage,
        component: impl Into<String>,
        completed: usize,
        total: usize,
        message: impl Into<String>,
    ) -> Self {
        let progress = if total > 0 {
            completed as f32 / total as f32
        } else {
            0.0
        };
        Self {
            stage,
            component: Some(component.into()),
            progress: progress.clamp(0.0, 1.0),
            message: message.into(),
            stages_completed: Some(completed),
            stages_total: Some(total),
        }
    }

    /// Creates a completion progress update.
    pub fn complete(message: impl Into<String>) -> Self {
        Self::new(PipelineStage::Complete, 1.0, message)
    }

    /// Creates a cancelled progress update.
    pub fn cancelled() -> Self {
        Self::new(PipelineStage::Cancelled, 0.0, "Pipeline cancelled")
    }

    /// Creates a failed progress update.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(PipelineStage::Failed, 0.0, message)
    }
}

/// Receives progress updates during a run.
///
/// Implementations must be `Send + Sync` so a pipeline can run on a
/// background thread while reporting to another.
///
/// # Example
///
/// ```rust,ignore
/// use lex_pipeline::{ProgressReporter, ProgressUpdate};
///
/// struct StderrReporter;
///
/// impl ProgressReporter for StderrReporter {
///     fn report(&self, update: ProgressUpdate) {
///         eprintln!("{}: {}", update.stage.display_name(), update.message);
///     }
/// }
/// ```
pub trait ProgressReporter: Send + Sync {
    /// Called at every stage boundary. Implementations should not block.
    fn report(&self, update: ProgressUpdate);
}

/// Wrapper that implements [`ProgressReporter`] using a closure.
pub struct ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    /// Creates a new closure-based progress reporter.
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        (self.callback)(update);
    }
}

/// Token for cancelling a running pipeline.
///
/// Cloning shares the flag, so any clone can cancel the run. The pipeline
/// checks the token before each stage and fails with
/// [`PipelineError::Cancelled`](crate::error::PipelineError::Cancelled)
/// once it is set. A stage that is already executing is not interrupted.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

static_assertions::assert_impl_all!(CancellationToken: Send, Sync);
static_assertions::assert_impl_all!(ProgressUpdate: Send, Sync);

impl CancellationToken {
    /// Creates a new cancellation token.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation. Safe to call from any thread.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns `true` once [`cancel()`](Self::cancel) has been called on this
    /// token or any of its clones.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Clear the flag so the token can be reused for another run.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}
