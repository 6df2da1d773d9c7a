//! CLI entry point for running loader/processor/writer pipelines.

use anyhow::{Result, anyhow};
use clap::Parser;
use lex_pipeline::{
    ComponentKind, ComponentRegistry, LoggingConfig, Params, Pipeline, PipelineDocument,
    RunResult, init_logging,
};
use std::path::Path;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(
    author = "Lex Machina Team",
    version,
    about = "Loader / processor / writer data pipeline runner",
    long_about = "Runs a data pipeline described by a JSON or YAML document, or a plain\n\
                  CSV-to-CSV copy when no document is given.\n\n\
                  EXAMPLES:\n  \
                  # Combine every CSV file in data/ into output/\n  \
                  lex-pipeline -i data -o output\n\n  \
                  # Run a pipeline document\n  \
                  lex-pipeline -c pipeline.yaml\n\n  \
                  # Show registered components\n  \
                  lex-pipeline --list-components"
)]
struct Args {
    /// Directory the default CSV loader reads from
    #[arg(short, long, default_value = "data")]
    input_dir: String,

    /// Directory the default CSV writer writes to
    #[arg(short, long, default_value = "output")]
    output_dir: String,

    /// Pipeline document (.json, .yaml or .yml)
    ///
    /// When given, --input-dir, --output-dir, --file-pattern and
    /// --output-file are ignored.
    #[arg(short, long)]
    config: Option<String>,

    /// Wildcard pattern selecting input files
    #[arg(long, default_value = "*.csv")]
    file_pattern: String,

    /// Output file name (default: data_<timestamp>.csv)
    #[arg(long)]
    output_file: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Directory for log files
    #[arg(long, default_value = "logs")]
    log_dir: String,

    /// Do not write a log file
    #[arg(long)]
    no_log_file: bool,

    /// Only show warnings and errors on the console
    #[arg(short, long)]
    quiet: bool,

    /// Print the run result as JSON to stdout
    ///
    /// Disables console logging so stdout only carries the JSON document.
    #[arg(long)]
    json: bool,

    /// List registered loaders, processors and writers and exit
    #[arg(long)]
    list_components: bool,
}

fn logging_config(args: &Args) -> LoggingConfig {
    let level = if args.quiet { "warn" } else { args.log_level.as_str() };
    LoggingConfig::builder()
        .level(level)
        .log_dir(&args.log_dir)
        .console(!args.json)
        .file(!args.no_log_file)
        .build()
}

/// Document used when no `--config` is given: CsvLoader straight into CsvWriter.
fn default_document(args: &Args) -> Result<PipelineDocument> {
    let loader = Params::new()
        .with("input_dir", args.input_dir.as_str())
        .with("file_pattern", args.file_pattern.as_str());
    let mut writer = Params::new().with("output_dir", args.output_dir.as_str());
    if let Some(filename) = &args.output_file {
        writer = writer.with("filename", filename.as_str());
    }

    Ok(PipelineDocument::builder()
        .loader("CsvLoader", loader)
        .writer("CsvWriter", writer)
        .build()?)
}

fn load_document(args: &Args) -> Result<PipelineDocument> {
    match &args.config {
        Some(path) => {
            if !Path::new(path).exists() {
                return Err(anyhow!("Config file not found: {}", path));
            }
            info!("Loading pipeline document from: {}", path);
            Ok(PipelineDocument::from_path(path)?)
        }
        None => default_document(args),
    }
}

/// Note: uses `println!` on purpose; this listing is the command's output.
fn list_components(registry: &ComponentRegistry) {
    for kind in [ComponentKind::Loader, ComponentKind::Processor, ComponentKind::Writer] {
        println!("{}s:", kind);
        for info in registry.describe(kind) {
            println!("  {:<22} {}", info.name, info.description);
        }
    }
}

fn summary(result: &RunResult) -> String {
    let mut lines = vec![format!(
        "Pipeline '{}' finished in {} ms",
        result.pipeline_name, result.duration_ms
    )];
    if let Some(shape) = result.input_shape() {
        lines.push(format!("  input:  {}", shape));
    }
    if let Some(shape) = result.output_shape() {
        lines.push(format!("  output: {}", shape));
    }
    for metrics in &result.stages {
        lines.push(format!(
            "  {:<12} {:<22} {:>6} ms",
            metrics.stage.display_name(),
            metrics.component,
            metrics.duration_ms
        ));
    }
    lines.join("\n")
}

fn main() -> Result<()> {
    let args = Args::parse();
    let registry = ComponentRegistry::global();

    if args.list_components {
        list_components(registry);
        return Ok(());
    }

    if let Some(log_file) = init_logging(&logging_config(&args))? {
        info!("Logging to {}", log_file.display());
    }

    let document = load_document(&args)?;
    let pipeline = Pipeline::from_config(&document, registry)?;
    info!("Running {}", pipeline);

    match pipeline.run() {
        Ok(result) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else if !args.quiet {
                println!("{}", summary(&result));
            }
            Ok(())
        }
        Err(e) => {
            error!("Pipeline failed: {}", e);
            if args.json {
                println!("{}", serde_json::to_string_pretty(&e)?);
            }
            Err(anyhow!("Pipeline failed: {}", e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lex_pipeline::{PipelineStage, StageMetrics, TableShape};
    use pretty_assertions::assert_eq;

    fn metrics(
        stage: PipelineStage,
        component: &str,
        shape_in: Option<TableShape>,
        shape_out: Option<TableShape>,
    ) -> StageMetrics {
        StageMetrics {
            stage,
            component: component.to_string(),
            index: None,
            shape_in,
            shape_out,
            duration_ms: 3,
        }
    }

    #[test]
    fn test_summary_lists_shapes_and_stages() {
        let result = RunResult {
            success: true,
            pipeline_name: "adults".to_string(),
            duration_ms: 9,
            stages: vec![
                metrics(PipelineStage::Loading, "CsvLoader", None, Some(TableShape { rows: 3, columns: 2 })),
                metrics(PipelineStage::Writing, "CsvWriter", Some(TableShape { rows: 1, columns: 2 }), None),
            ],
            stopped_early: true,
        };

        let text = summary(&result);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "Pipeline 'adults' finished in 9 ms");
        assert!(lines[1].starts_with("  input:"));
        assert!(lines[2].starts_with("  output:"));
        assert!(lines[3].contains("CsvLoader"));
        assert!(lines[4].contains("CsvWriter"));
    }
}
