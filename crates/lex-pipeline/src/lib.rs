//! Loader / processor / writer data pipelines
//!
//! A pipeline reads a table with one [`Loader`], passes it through an ordered
//! chain of [`Processor`]s and hands the result to one [`Writer`]. Components
//! are looked up by name in a [`ComponentRegistry`], so whole pipelines can be
//! described in JSON or YAML documents.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use lex_pipeline::{ComponentRegistry, Pipeline, PipelineDocument};
//!
//! let document = PipelineDocument::from_json_str(r#"{
//!     "name": "adults",
//!     "loader": {"name": "CsvLoader", "params": {"input_dir": "data"}},
//!     "processors": [
//!         {"name": "FilterProcessor", "params": {"column": "age", "condition": {"op": "ge", "value": 18}}}
//!     ],
//!     "writer": {"name": "CsvWriter", "params": {"output_dir": "output", "filename": "adults.csv"}}
//! }"#)?;
//!
//! let result = Pipeline::from_config(&document, ComponentRegistry::global())?.run()?;
//! println!("{} stages in {} ms", result.stages.len(), result.duration_ms);
//! ```
//!
//! # Programmatic assembly
//!
//! ```rust,ignore
//! use lex_pipeline::{CsvLoader, CsvWriter, FilterProcessor, Condition, Pipeline};
//!
//! let pipeline = Pipeline::new("adults")
//!     .with_loader(Box::new(CsvLoader::new("data")))
//!     .with_processor(Box::new(FilterProcessor::new("age", Condition::equals(18i64))))
//!     .with_writer(Box::new(CsvWriter::new("output")))
//!     .on_progress(|update| println!("[{:?}] {}", update.stage, update.message));
//!
//! pipeline.run()?;
//! ```
//!
//! # Custom components
//!
//! Implement [`Processor`] (or [`Loader`] / [`Writer`]) and register a
//! constructor under a name:
//!
//! ```rust,ignore
//! let registry = ComponentRegistry::with_builtins();
//! registry.register_processor("Dedup", "Removes duplicate rows", |_params| {
//!     Ok(Box::new(Dedup))
//! })?;
//! ```

pub mod components;
pub mod config;
pub mod error;
pub mod loaders;
pub mod logging;
pub mod params;
pub mod pipeline;
pub mod processors;
pub mod registry;
pub mod types;
pub mod utils;
pub mod writers;

pub use components::{ComponentKind, FromParams, Loader, Processor, Writer};
pub use config::{ComponentSpec, PipelineDocument, PipelineDocumentBuilder};
pub use error::{PipelineError, Result, ResultExt};
pub use loaders::CsvLoader;
pub use logging::{LoggingConfig, LoggingConfigBuilder, init_logging};
pub use params::{ParamError, Params};
pub use pipeline::{
    CancellationToken, ClosureProgressReporter, DEFAULT_PIPELINE_NAME, Pipeline, PipelineStage,
    ProgressReporter, ProgressUpdate,
};
pub use processors::{
    ColumnOperation, ColumnProcessor, Comparison, Condition, FieldsOrganizer, FilterProcessor,
    Transform, TransformProcessor,
};
pub use registry::{ComponentInfo, ComponentRegistry};
pub use types::{RunResult, StageMetrics, Table, TableShape};
pub use writers::CsvWriter;
