use crate::pipeline::PipelineStage;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The unit of exchange between pipeline stages.
pub type Table = DataFrame;

/// Row and column counts of a table at a stage boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableShape {
    pub rows: usize,
    pub columns: usize,
}

impl TableShape {
    pub fn of(table: &Table) -> Self {
        Self {
            rows: table.height(),
            columns: table.width(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }
}

impl fmt::Display for TableShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.rows, self.columns)
    }
}

/// Metrics recorded for one executed stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageMetrics {
    pub stage: PipelineStage,
    pub component: String,
    /// Zero-based processor position; `None` for the loader and writer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    /// Shape of the table handed to the stage (`None` for the loader).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shape_in: Option<TableShape>,
    /// Shape of the table the stage produced (`None` for the writer).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shape_out: Option<TableShape>,
    pub duration_ms: u64,
}

/// Outcome of a successful [`Pipeline::run`](crate::Pipeline::run).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub success: bool,
    pub pipeline_name: String,
    pub duration_ms: u64,
    pub stages: Vec<StageMetrics>,
    /// True when the run stopped on an empty table (see `Pipeline::skip_empty`).
    pub stopped_early: bool,
}

impl RunResult {
    pub(crate) fn new(pipeline_name: impl Into<String>) -> Self {
        Self {
            success: false,
            pipeline_name: pipeline_name.into(),
            duration_ms: 0,
            stages: Vec::new(),
            stopped_early: false,
        }
    }

    /// Shape of the table produced by the loader.
    pub fn input_shape(&self) -> Option<TableShape> {
        self.stages
            .iter()
            .find(|m| m.stage == PipelineStage::Loading)
            .and_then(|m| m.shape_out)
    }

    /// Shape of the table handed to the writer.
    pub fn output_shape(&self) -> Option<TableShape> {
        self.stages
            .iter()
            .find(|m| m.stage == PipelineStage::Writing)
            .and_then(|m| m.shape_in)
    }

    /// Metrics of processor stages, in execution order.
    pub fn processor_metrics(&self) -> impl Iterator<Item = &StageMetrics> {
        self.stages
            .iter()
            .filter(|m| m.stage == PipelineStage::Processing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    #[test]
    fn test_table_shape_of() {
        let df = df!("id" => [1i64, 2, 3], "name" => ["a", "b", "c"]).unwrap();
        let shape = TableShape::of(&df);
        assert_eq!(shape, TableShape { rows: 3, columns: 2 });
        assert_eq!(shape.to_string(), "3x2");
        assert!(TableShape::of(&DataFrame::empty()).is_empty());
    }

    #[test]
    fn test_run_result_shapes() {
        let mut result = RunResult::new("test");
        result.stages.push(StageMetrics {
            stage: PipelineStage::Loading,
            component: "Loader".to_string(),
            index: None,
            shape_in: None,
            shape_out: Some(TableShape { rows: 3, columns: 1 }),
            duration_ms: 0,
        });
        result.stages.push(StageMetrics {
            stage: PipelineStage::Writing,
            component: "Writer".to_string(),
            index: None,
            shape_in: Some(TableShape { rows: 1, columns: 1 }),
            shape_out: None,
            duration_ms: 0,
        });

        assert_eq!(result.input_shape().map(|s| s.rows), Some(3));
        assert_eq!(result.output_shape().map(|s| s.rows), Some(1));
        assert_eq!(result.processor_metrics().count(), 0);
    }
}
