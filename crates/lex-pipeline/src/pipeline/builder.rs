//! The pipeline: one loader, an ordered list of processors, one writer.
//!
//! A [`Pipeline`] owns its components and runs them synchronously on the
//! calling thread. It keeps no state between runs other than its
//! configuration, so [`Pipeline::run`] can be called repeatedly, including
//! after a failed run.

use crate::components::{Loader, Processor, Writer};
use crate::config::PipelineDocument;
use crate::error::{PipelineError, Result};
use crate::pipeline::executor::StageTimer;
use crate::pipeline::progress::{
    CancellationToken, ClosureProgressReporter, PipelineStage, ProgressReporter, ProgressUpdate,
};
use crate::registry::ComponentRegistry;
use crate::types::{RunResult, Table, TableShape};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Name used when a pipeline is created without one.
pub const DEFAULT_PIPELINE_NAME: &str = "DataPipeline";

/// An ordered assembly of a loader, processors and a writer.
///
/// # Example
///
/// ```rust,ignore
/// use lex_pipeline::{ComponentRegistry, Params, Pipeline};
///
/// let registry = ComponentRegistry::global();
/// let mut pipeline = Pipeline::new("adults");
/// pipeline
///     .set_loader(registry.get_loader("CsvLoader", &Params::new().with("input_dir", "data"))?)
///     .add_processor(registry.get_processor(
///         "FilterProcessor",
///         &Params::new().with("column", "age").with("condition", 18),
///     )?)
///     .set_writer(registry.get_writer("CsvWriter", &Params::new().with("filename", "out.csv"))?);
///
/// let result = pipeline.run()?;
/// println!("{} rows written", result.output_shape().map_or(0, |s| s.rows));
/// ```
pub struct Pipeline {
    name: String,
    loader: Option<Box<dyn Loader>>,
    processors: Vec<Box<dyn Processor>>,
    writer: Option<Box<dyn Writer>>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    cancellation_token: CancellationToken,
    skip_empty: bool,
}

static_assertions::assert_impl_all!(Pipeline: Send);

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(DEFAULT_PIPELINE_NAME)
    }
}

impl Pipeline {
    /// Create an empty pipeline with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            loader: None,
            processors: Vec::new(),
            writer: None,
            progress_reporter: None,
            cancellation_token: CancellationToken::new(),
            skip_empty: false,
        }
    }

    /// Build a pipeline from a configuration document.
    pub fn from_config(document: &PipelineDocument, registry: &ComponentRegistry) -> Result<Self> {
        document.build(registry)
    }

    /// Read a JSON or YAML configuration file and build a pipeline from it.
    pub fn from_path(path: impl AsRef<Path>, registry: &ComponentRegistry) -> Result<Self> {
        PipelineDocument::from_path(path)?.build(registry)
    }

    // ------------------------------------------------------------------
    // Assembly
    // ------------------------------------------------------------------

    /// Set the loader, replacing any previous one.
    pub fn set_loader(&mut self, loader: Box<dyn Loader>) -> &mut Self {
        debug!(pipeline = %self.name, loader = loader.name(), "Loader set");
        self.loader = Some(loader);
        self
    }

    /// Append a processor. Processors run in the order they are added.
    pub fn add_processor(&mut self, processor: Box<dyn Processor>) -> &mut Self {
        debug!(
            pipeline = %self.name,
            processor = processor.name(),
            index = self.processors.len(),
            "Processor added"
        );
        self.processors.push(processor);
        self
    }

    /// Set the writer, replacing any previous one.
    pub fn set_writer(&mut self, writer: Box<dyn Writer>) -> &mut Self {
        debug!(pipeline = %self.name, writer = writer.name(), "Writer set");
        self.writer = Some(writer);
        self
    }

    pub fn with_loader(mut self, loader: Box<dyn Loader>) -> Self {
        self.set_loader(loader);
        self
    }

    pub fn with_processor(mut self, processor: Box<dyn Processor>) -> Self {
        self.add_processor(processor);
        self
    }

    pub fn with_writer(mut self, writer: Box<dyn Writer>) -> Self {
        self.set_writer(writer);
        self
    }

    /// Set a progress reporter for receiving updates during a run.
    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a progress callback closure.
    ///
    /// Convenience over [`progress_reporter`](Self::progress_reporter).
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Set a cancellation token for stopping the pipeline between stages.
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    /// Stop the run successfully as soon as a stage produces an empty table.
    ///
    /// Later processors and the writer are skipped and
    /// [`RunResult::stopped_early`] is set. Off by default.
    pub fn skip_empty(mut self, skip: bool) -> Self {
        self.skip_empty = skip;
        self
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn loader(&self) -> Option<&dyn Loader> {
        self.loader.as_deref()
    }

    pub fn processors(&self) -> &[Box<dyn Processor>] {
        &self.processors
    }

    pub fn writer(&self) -> Option<&dyn Writer> {
        self.writer.as_deref()
    }

    /// Names of the processors, in execution order.
    pub fn processor_names(&self) -> Vec<&str> {
        self.processors.iter().map(|p| p.name()).collect()
    }

    /// Check that a loader and a writer are set.
    pub fn validate(&self) -> Result<()> {
        self.endpoints().map(|_| ())
    }

    fn endpoints(&self) -> Result<(&dyn Loader, &dyn Writer)> {
        let reason = match (self.loader.as_deref(), self.writer.as_deref()) {
            (Some(loader), Some(writer)) => return Ok((loader, writer)),
            (None, Some(_)) => "no loader set",
            (Some(_), None) => "no writer set",
            (None, None) => "no loader or writer set",
        };
        Err(PipelineError::PipelineConfiguration {
            pipeline: self.name.clone(),
            reason: reason.to_string(),
        })
    }

    // ------------------------------------------------------------------
    // Execution
    // ------------------------------------------------------------------

    /// Run the pipeline: load, process in order, write.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::PipelineConfiguration`] if the loader or writer is
    ///   missing; no component is invoked.
    /// - [`PipelineError::LoaderFailure`], [`PipelineError::ProcessorFailure`]
    ///   or [`PipelineError::WriterFailure`] for the first stage that fails;
    ///   nothing after it runs.
    /// - [`PipelineError::Cancelled`] if the token was cancelled before a stage.
    pub fn run(&self) -> Result<RunResult> {
        match self.run_internal() {
            Ok(result) => {
                let message = if result.stopped_early {
                    "Pipeline stopped early on an empty table"
                } else {
                    "Pipeline completed successfully"
                };
                self.report_progress(ProgressUpdate::complete(message));
                Ok(result)
            }
            Err(e) => {
                if e.is_cancelled() {
                    self.report_progress(ProgressUpdate::cancelled());
                    warn!(pipeline = %self.name, "Pipeline cancelled");
                } else {
                    self.report_progress(ProgressUpdate::failed(e.to_string()));
                    error!(pipeline = %self.name, "Pipeline error: {}", e);
                }
                Err(e)
            }
        }
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancellation_token.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        Ok(())
    }

    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }

    /// Whether the run should end here because `table` is empty.
    fn should_stop(&self, table: &Table, after: &str) -> bool {
        if self.skip_empty && table.height() == 0 {
            warn!(pipeline = %self.name, stage = after, "Empty table, stopping pipeline");
            return true;
        }
        false
    }

    fn run_internal(&self) -> Result<RunResult> {
        let start_time = Instant::now();

        let (loader, writer) = self.endpoints()?;

        let total = self.processors.len() + 2;
        let mut result = RunResult::new(&self.name);

        info!(
            pipeline = %self.name,
            loader = loader.name(),
            processors = self.processors.len(),
            writer = writer.name(),
            "Starting pipeline"
        );
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Initializing,
            0.0,
            format!("Starting pipeline {}", self.name),
        ));

        // Stage 1: load
        self.check_cancelled()?;
        self.report_progress(ProgressUpdate::for_stage(
            PipelineStage::Loading,
            loader.name(),
            0,
            total,
            format!("Loading data with {}", loader.name()),
        ));
        let timer = StageTimer::start(PipelineStage::Loading, loader.name(), None, None);
        let mut table = match loader.load() {
            Ok(table) => table,
            Err(source) => {
                timer.fail(&source);
                return Err(PipelineError::LoaderFailure {
                    loader: loader.name().to_string(),
                    source,
                });
            }
        };
        result.stages.push(timer.finish(Some(TableShape::of(&table))));

        if self.should_stop(&table, loader.name()) {
            return Ok(self.finish(result, start_time, true));
        }

        // Stage 2: processors, strictly in order
        for (index, processor) in self.processors.iter().enumerate() {
            self.check_cancelled()?;
            self.report_progress(ProgressUpdate::for_stage(
                PipelineStage::Processing,
                processor.name(),
                index + 1,
                total,
                format!("Running {} ({}/{})", processor.name(), index + 1, self.processors.len()),
            ));

            let timer = StageTimer::start(
                PipelineStage::Processing,
                processor.name(),
                Some(index),
                Some(TableShape::of(&table)),
            );
            table = match processor.process(table) {
                Ok(table) => table,
                Err(source) => {
                    timer.fail(&source);
                    return Err(PipelineError::ProcessorFailure {
                        processor: processor.name().to_string(),
                        index,
                        source,
                    });
                }
            };
            result.stages.push(timer.finish(Some(TableShape::of(&table))));

            if self.should_stop(&table, processor.name()) {
                return Ok(self.finish(result, start_time, true));
            }
        }

        // Stage 3: write
        self.check_cancelled()?;
        self.report_progress(ProgressUpdate::for_stage(
            PipelineStage::Writing,
            writer.name(),
            total - 1,
            total,
            format!("Writing data with {}", writer.name()),
        ));
        let timer = StageTimer::start(
            PipelineStage::Writing,
            writer.name(),
            None,
            Some(TableShape::of(&table)),
        );
        if let Err(source) = writer.write(&table) {
            timer.fail(&source);
            return Err(PipelineError::WriterFailure {
                writer: writer.name().to_string(),
                source,
            });
        }
        result.stages.push(timer.finish(None));

        Ok(self.finish(result, start_time, false))
    }

    fn finish(&self, mut result: RunResult, start_time: Instant, stopped_early: bool) -> RunResult {
        result.success = true;
        result.stopped_early = stopped_early;
        result.duration_ms = start_time.elapsed().as_millis() as u64;

        info!(
            pipeline = %self.name,
            stages = result.stages.len(),
            elapsed_ms = result.duration_ms,
            stopped_early,
            "Pipeline completed"
        );
        result
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.name)?;
        f.write_str(self.loader().map_or("<no loader>", |l| l.name()))?;
        for processor in &self.processors {
            write!(f, " -> {}", processor.name())?;
        }
        write!(f, " -> {}", self.writer().map_or("<no writer>", |w| w.name()))
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("loader", &self.loader().map(|l| l.name()))
            .field("processors", &self.processor_names())
            .field("writer", &self.writer().map(|w| w.name()))
            .field("skip_empty", &self.skip_empty)
            .finish()
    }
}
