//! Error types for the pipeline engine.
//!
//! [`PipelineError`] covers registry lookups, configuration documents and
//! pipeline runs. Failures raised by components themselves are plain
//! [`anyhow::Error`] values; the engine keeps them as the `source` of the
//! stage failure so the full cause chain survives.
//!
//! Errors are serializable as `{code, message}` so they can be emitted as
//! JSON by the CLI.

use crate::components::ComponentKind;
use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for registry, configuration and pipeline operations.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A component with the same name is already registered in this category.
    #[error("Duplicate {kind} name '{name}'")]
    DuplicateName { kind: ComponentKind, name: String },

    /// No component with this name is registered in this category.
    #[error("Unknown {kind} '{name}'")]
    UnknownComponent { kind: ComponentKind, name: String },

    /// The component's constructor rejected its parameters.
    #[error("Failed to construct {kind} '{name}': {source:#}")]
    ComponentConstruction {
        kind: ComponentKind,
        name: String,
        #[source]
        source: anyhow::Error,
    },

    /// The pipeline is missing a loader or a writer.
    #[error("Pipeline '{pipeline}' cannot run: {reason}")]
    PipelineConfiguration { pipeline: String, reason: String },

    /// The loader failed; nothing downstream was executed.
    #[error("Loader '{loader}' failed: {source:#}")]
    LoaderFailure {
        loader: String,
        #[source]
        source: anyhow::Error,
    },

    /// A processor failed; later processors and the writer were skipped.
    ///
    /// `index` is the zero-based position of the processor in the pipeline.
    #[error("Processor '{processor}' at index {index} failed: {source:#}")]
    ProcessorFailure {
        processor: String,
        index: usize,
        #[source]
        source: anyhow::Error,
    },

    /// The writer failed. Partial output is the writer's responsibility.
    #[error("Writer '{writer}' failed: {source:#}")]
    WriterFailure {
        writer: String,
        #[source]
        source: anyhow::Error,
    },

    /// A configuration document could not be read or resolved.
    #[error("Configuration error: {context}")]
    Configuration {
        context: String,
        #[source]
        source: Option<Box<PipelineError>>,
    },

    /// The run was cancelled through its cancellation token.
    #[error("Pipeline cancelled")]
    Cancelled,

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML deserialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl PipelineError {
    /// Build a configuration error without an underlying cause.
    pub fn configuration(context: impl Into<String>) -> Self {
        Self::Configuration {
            context: context.into(),
            source: None,
        }
    }

    /// Wrap another error as a configuration error.
    ///
    /// The wrapped error's message is appended to the context so the error
    /// reads well even when only its `Display` output is shown.
    pub fn into_configuration(self, context: impl AsRef<str>) -> Self {
        Self::Configuration {
            context: format!("{}: {}", context.as_ref(), self),
            source: Some(Box::new(self)),
        }
    }

    /// Get a stable error code for machine consumers.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::DuplicateName { .. } => "DUPLICATE_NAME",
            Self::UnknownComponent { .. } => "UNKNOWN_COMPONENT",
            Self::ComponentConstruction { .. } => "COMPONENT_CONSTRUCTION",
            Self::PipelineConfiguration { .. } => "PIPELINE_CONFIGURATION",
            Self::LoaderFailure { .. } => "LOADER_FAILURE",
            Self::ProcessorFailure { .. } => "PROCESSOR_FAILURE",
            Self::WriterFailure { .. } => "WRITER_FAILURE",
            Self::Configuration { .. } => "CONFIGURATION_ERROR",
            Self::Cancelled => "CANCELLED",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::Yaml(_) => "YAML_ERROR",
        }
    }

    /// Check if this error represents a cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Check if this error was raised while a stage was executing.
    pub fn is_stage_failure(&self) -> bool {
        matches!(
            self,
            Self::LoaderFailure { .. } | Self::ProcessorFailure { .. } | Self::WriterFailure { .. }
        )
    }

    /// Zero-based index of the failing processor, if this is a processor failure.
    pub fn processor_index(&self) -> Option<usize> {
        match self {
            Self::ProcessorFailure { index, .. } => Some(*index),
            _ => None,
        }
    }
}

impl Serialize for PipelineError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("PipelineError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Extension trait for turning failures into configuration errors with context.
pub trait ResultExt<T> {
    /// Wrap the error as [`PipelineError::Configuration`] with the given context.
    fn context(self, context: impl AsRef<str>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl AsRef<str>) -> Result<T> {
        self.map_err(|e| e.into_configuration(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn context(self, context: impl AsRef<str>) -> Result<T> {
        self.map_err(|e| PipelineError::Io(e).into_configuration(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_code() {
        assert_eq!(PipelineError::Cancelled.error_code(), "CANCELLED");
        assert_eq!(
            PipelineError::UnknownComponent {
                kind: ComponentKind::Loader,
                name: "Nope".to_string()
            }
            .error_code(),
            "UNKNOWN_COMPONENT"
        );
    }

    #[test]
    fn test_processor_failure_carries_name_and_index() {
        let error = PipelineError::ProcessorFailure {
            processor: "FilterProcessor".to_string(),
            index: 2,
            source: anyhow::anyhow!("column type mismatch"),
        };
        let message = error.to_string();
        assert!(message.contains("FilterProcessor"));
        assert!(message.contains("index 2"));
        assert!(message.contains("column type mismatch"));
        assert_eq!(error.processor_index(), Some(2));
        assert!(error.is_stage_failure());
    }

    #[test]
    fn test_into_configuration_keeps_source() {
        let error = PipelineError::UnknownComponent {
            kind: ComponentKind::Writer,
            name: "ParquetWriter".to_string(),
        }
        .into_configuration("writer");

        assert_eq!(error.error_code(), "CONFIGURATION_ERROR");
        assert!(error.to_string().contains("ParquetWriter"));
        let source = error.source().expect("configuration error should keep its cause");
        assert!(source.to_string().contains("Unknown writer"));
    }

    #[test]
    fn test_error_serialization() {
        let error = PipelineError::DuplicateName {
            kind: ComponentKind::Processor,
            name: "FilterProcessor".to_string(),
        };
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("DUPLICATE_NAME"));
        assert!(json.contains("FilterProcessor"));
    }

    #[test]
    fn test_is_cancelled() {
        assert!(PipelineError::Cancelled.is_cancelled());
        assert!(!PipelineError::configuration("bad").is_cancelled());
    }
}
