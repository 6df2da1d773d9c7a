//! Pipeline configuration documents.
//!
//! A [`PipelineDocument`] names a loader, an ordered list of processors and a
//! writer, each with its parameters. Documents are read from JSON or YAML and
//! resolved against a [`ComponentRegistry`] to produce a [`Pipeline`].
//!
//! ```json
//! {
//!   "name": "adults",
//!   "loader": {"name": "CSVLoader", "params": {"input_dir": "data"}},
//!   "processors": [
//!     {"name": "FilterProcessor", "params": {"column": "age", "condition": 18}}
//!   ],
//!   "writer": {"name": "CSVWriter", "params": {"output_dir": "output", "filename": "out.csv"}}
//! }
//! ```
//!
//! Unknown fields are ignored. Building never runs the pipeline.

use crate::error::{PipelineError, Result, ResultExt};
use crate::params::Params;
use crate::pipeline::{DEFAULT_PIPELINE_NAME, Pipeline};
use crate::registry::ComponentRegistry;
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// One component reference: a registered name plus constructor parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentSpec {
    /// Registered component name. A blank processor name is skipped.
    #[serde(default)]
    pub name: String,

    /// Constructor parameters. `null` or absent means no parameters.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub params: Params,
}

impl ComponentSpec {
    pub fn new(name: impl Into<String>, params: Params) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }

    fn is_blank(&self) -> bool {
        self.name.trim().is_empty()
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Params, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Params>::deserialize(deserializer)?.unwrap_or_default())
}

/// Declarative description of a pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineDocument {
    /// Pipeline name. Defaults to [`DEFAULT_PIPELINE_NAME`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loader: Option<ComponentSpec>,

    /// Processors in execution order.
    #[serde(default)]
    pub processors: Vec<ComponentSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub writer: Option<ComponentSpec>,
}

impl PipelineDocument {
    /// Create a new document builder.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let document = PipelineDocument::builder()
    ///     .name("adults")
    ///     .loader("CsvLoader", Params::new().with("input_dir", "data"))
    ///     .processor("FilterProcessor", Params::new().with("column", "age").with("condition", 18))
    ///     .writer("CsvWriter", Params::new().with("filename", "out.csv"))
    ///     .build()?;
    /// ```
    pub fn builder() -> PipelineDocumentBuilder {
        PipelineDocumentBuilder::default()
    }

    /// Parse a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(PipelineError::from)
            .context("invalid JSON pipeline document")
    }

    /// Parse a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(PipelineError::from)
            .context("invalid YAML pipeline document")
    }

    /// Read a document from disk. `.yaml` and `.yml` files are parsed as
    /// YAML, everything else as JSON.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Reading pipeline document");

        let text = fs::read_to_string(path).context(format!("cannot read {}", path.display()))?;

        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));

        let parsed = if is_yaml {
            serde_yaml::from_str(&text).map_err(PipelineError::from)
        } else {
            serde_json::from_str(&text).map_err(PipelineError::from)
        };
        parsed.context(format!("invalid pipeline document {}", path.display()))
    }

    /// Serialize as pretty-printed JSON.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// The name the built pipeline will carry.
    pub fn pipeline_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(DEFAULT_PIPELINE_NAME)
    }

    /// Check that a loader and a writer are named.
    pub fn validate(&self) -> Result<()> {
        let name = self.pipeline_name();
        match &self.loader {
            None => {
                return Err(PipelineError::configuration(format!(
                    "pipeline '{name}' has no loader"
                )));
            }
            Some(spec) if spec.is_blank() => {
                return Err(PipelineError::configuration(format!(
                    "pipeline '{name}' has a loader without a name"
                )));
            }
            Some(_) => {}
        }
        match &self.writer {
            None => Err(PipelineError::configuration(format!(
                "pipeline '{name}' has no writer"
            ))),
            Some(spec) if spec.is_blank() => Err(PipelineError::configuration(format!(
                "pipeline '{name}' has a writer without a name"
            ))),
            Some(_) => Ok(()),
        }
    }

    /// Resolve every component through `registry` and assemble a pipeline.
    ///
    /// Processors are added in document order. Any lookup or construction
    /// failure is returned as [`PipelineError::Configuration`] with the
    /// registry error as its source.
    pub fn build(&self, registry: &ComponentRegistry) -> Result<Pipeline> {
        self.validate()?;
        let (Some(loader_spec), Some(writer_spec)) = (&self.loader, &self.writer) else {
            return Err(PipelineError::configuration("pipeline has no loader or writer"));
        };

        let mut pipeline = Pipeline::new(self.pipeline_name());

        let loader = registry
            .get_loader(&loader_spec.name, &loader_spec.params)
            .context(format!("loader '{}'", loader_spec.name))?;
        pipeline.set_loader(loader);

        for (position, spec) in self.processors.iter().enumerate() {
            if spec.is_blank() {
                warn!(position, "Processor entry without a name, skipping");
                continue;
            }
            let processor = registry
                .get_processor(&spec.name, &spec.params)
                .context(format!("processor '{}' (entry {position})", spec.name))?;
            pipeline.add_processor(processor);
        }

        let writer = registry
            .get_writer(&writer_spec.name, &writer_spec.params)
            .context(format!("writer '{}'", writer_spec.name))?;
        pipeline.set_writer(writer);

        info!(
            pipeline = pipeline.name(),
            processors = pipeline.processors().len(),
            "Pipeline built from configuration"
        );
        Ok(pipeline)
    }
}

/// Builder for [`PipelineDocument`] with fluent API.
#[derive(Debug, Default)]
pub struct PipelineDocumentBuilder {
    name: Option<String>,
    loader: Option<ComponentSpec>,
    processors: Vec<ComponentSpec>,
    writer: Option<ComponentSpec>,
}

impl PipelineDocumentBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn loader(mut self, name: impl Into<String>, params: Params) -> Self {
        self.loader = Some(ComponentSpec::new(name, params));
        self
    }

    /// Append a processor entry.
    pub fn processor(mut self, name: impl Into<String>, params: Params) -> Self {
        self.processors.push(ComponentSpec::new(name, params));
        self
    }

    pub fn writer(mut self, name: impl Into<String>, params: Params) -> Self {
        self.writer = Some(ComponentSpec::new(name, params));
        self
    }

    /// Build the document.
    ///
    /// Returns an error if the loader or writer is missing.
    pub fn build(self) -> Result<PipelineDocument> {
        let document = PipelineDocument {
            name: self.name,
            loader: self.loader,
            processors: self.processors,
            writer: self.writer,
        };
        document.validate()?;
        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Loader, Processor, Writer};
    use crate::types::Table;
    use polars::prelude::*;
    use pretty_assertions::assert_eq;
    use std::error::Error as _;
    use std::io::Write as _;

    struct Named(String);

    impl Loader for Named {
        fn name(&self) -> &str {
            &self.0
        }
        fn load(&self) -> anyhow::Result<Table> {
            Ok(DataFrame::empty())
        }
    }

    impl Processor for Named {
        fn name(&self) -> &str {
            &self.0
        }
        fn process(&self, input: Table) -> anyhow::Result<Table> {
            Ok(input)
        }
    }

    impl Writer for Named {
        fn name(&self) -> &str {
            &self.0
        }
        fn write(&self, _input: &Table) -> anyhow::Result<()> {
            Ok(())
        }
    }

    /// Registry whose processors are named after their `label` parameter.
    fn test_registry() -> ComponentRegistry {
        let registry = ComponentRegistry::new();
        registry
            .register_loader("Source", "", |_: &Params| {
                Ok(Box::new(Named("Source".into())) as Box<dyn Loader>)
            })
            .unwrap();
        registry
            .register_processor("Step", "", |params: &Params| {
                let label = params.required_str("label")?;
                Ok(Box::new(Named(label.to_string())) as Box<dyn Processor>)
            })
            .unwrap();
        registry
            .register_writer("Sink", "", |_: &Params| {
                Ok(Box::new(Named("Sink".into())) as Box<dyn Writer>)
            })
            .unwrap();
        registry
    }

    #[test]
    fn test_parse_json_ignores_unknown_fields() {
        let document = PipelineDocument::from_json_str(
            r#"{
                "name": "adults",
                "version": 3,
                "loader": {"name": "CSVLoader", "params": {"input_dir": "data"}},
                "processors": [{"name": "FilterProcessor", "params": {"column": "age", "condition": 18}}],
                "writer": {"name": "CSVWriter", "params": {"filename": "out.csv"}}
            }"#,
        )
        .unwrap();

        assert_eq!(document.pipeline_name(), "adults");
        assert_eq!(document.processors.len(), 1);
        assert_eq!(
            document.processors[0].params.str("column").unwrap(),
            Some("age")
        );
    }

    #[test]
    fn test_parse_yaml_with_null_params() {
        let document = PipelineDocument::from_yaml_str(
            "loader:\n  name: CSVLoader\n  params:\nwriter:\n  name: CSVWriter\n",
        )
        .unwrap();

        assert!(document.processors.is_empty());
        assert!(document.loader.unwrap().params.is_empty());
        assert_eq!(document.name, None);
    }

    #[test]
    fn test_invalid_json_is_configuration_error() {
        let err = PipelineDocument::from_json_str("{not json").unwrap_err();
        assert_eq!(err.error_code(), "CONFIGURATION_ERROR");
    }

    #[test]
    fn test_build_preserves_processor_order() {
        let labels = ["clean", "filter", "rename", "organize"];
        let mut builder = PipelineDocument::builder()
            .loader("Source", Params::new())
            .writer("Sink", Params::new());
        for label in labels {
            builder = builder.processor("Step", Params::new().with("label", label));
        }

        let pipeline = builder.build().unwrap().build(&test_registry()).unwrap();

        assert_eq!(pipeline.processor_names(), labels.to_vec());
        assert_eq!(pipeline.name(), "DataPipeline");
    }

    #[test]
    fn test_blank_processor_name_is_skipped() {
        let document = PipelineDocument {
            name: Some("skips".into()),
            loader: Some(ComponentSpec::new("Source", Params::new())),
            processors: vec![
                ComponentSpec::new("", Params::new()),
                ComponentSpec::new("Step", Params::new().with("label", "kept")),
            ],
            writer: Some(ComponentSpec::new("Sink", Params::new())),
        };

        let pipeline = document.build(&test_registry()).unwrap();
        assert_eq!(pipeline.processor_names(), vec!["kept"]);
    }

    #[test]
    fn test_missing_writer_is_configuration_error() {
        let document = PipelineDocument {
            loader: Some(ComponentSpec::new("Source", Params::new())),
            ..Default::default()
        };
        let err = document.build(&test_registry()).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration { .. }));
        assert!(err.to_string().contains("no writer"));
    }

    #[test]
    fn test_unknown_component_is_wrapped() {
        let document = PipelineDocument::builder()
            .loader("Source", Params::new())
            .processor("Missing", Params::new())
            .writer("Sink", Params::new())
            .build()
            .unwrap();

        let err = document.build(&test_registry()).unwrap_err();
        assert_eq!(err.error_code(), "CONFIGURATION_ERROR");
        let source = err.source().expect("registry error should be kept");
        assert!(source.to_string().contains("Unknown processor 'Missing'"));
    }

    #[test]
    fn test_construction_failure_is_wrapped() {
        let document = PipelineDocument::builder()
            .loader("Source", Params::new())
            .processor("Step", Params::new())
            .writer("Sink", Params::new())
            .build()
            .unwrap();

        let err = document.build(&test_registry()).unwrap_err();
        assert!(err.to_string().contains("label"));
    }

    #[test]
    fn test_from_path_by_extension() {
        let dir = tempfile::tempdir().unwrap();

        let yaml_path = dir.path().join("pipeline.yml");
        let mut file = fs::File::create(&yaml_path).unwrap();
        writeln!(file, "name: from-yaml\nloader: {{name: Source}}\nwriter: {{name: Sink}}").unwrap();

        let json_path = dir.path().join("pipeline.json");
        fs::write(
            &json_path,
            r#"{"name": "from-json", "loader": {"name": "Source"}, "writer": {"name": "Sink"}}"#,
        )
        .unwrap();

        let registry = test_registry();
        assert_eq!(Pipeline::from_path(&yaml_path, &registry).unwrap().name(), "from-yaml");
        assert_eq!(Pipeline::from_path(&json_path, &registry).unwrap().name(), "from-json");
    }

    #[test]
    fn test_missing_file_is_configuration_error() {
        let err = PipelineDocument::from_path("/nonexistent/pipeline.json").unwrap_err();
        assert_eq!(err.error_code(), "CONFIGURATION_ERROR");
        assert!(err.to_string().contains("cannot read"));
    }

    #[test]
    fn test_document_json_roundtrip() {
        let document = PipelineDocument::builder()
            .name("roundtrip")
            .loader("Source", Params::new().with("input_dir", "data"))
            .writer("Sink", Params::new())
            .build()
            .unwrap();

        let json = document.to_json_string().unwrap();
        assert_eq!(PipelineDocument::from_json_str(&json).unwrap(), document);
    }
}
