//! Per-stage timing and logging.
//!
//! Every stage of a run goes through a [`StageTimer`]: it logs the start
//! event with the incoming shape, then either the finish event with the
//! outgoing shape and elapsed time, or the failure.

use crate::pipeline::progress::PipelineStage;
use crate::types::{StageMetrics, TableShape};
use std::time::Instant;
use tracing::{error, info};

pub(crate) struct StageTimer {
    stage: PipelineStage,
    component: String,
    index: Option<usize>,
    shape_in: Option<TableShape>,
    started: Instant,
}

impl StageTimer {
    /// Log the stage start and begin timing.
    pub(crate) fn start(
        stage: PipelineStage,
        component: &str,
        index: Option<usize>,
        shape_in: Option<TableShape>,
    ) -> Self {
        match (index, shape_in) {
            (Some(index), Some(shape)) => info!(
                stage = stage.display_name(),
                component,
                index,
                rows_in = shape.rows,
                columns_in = shape.columns,
                "Stage started"
            ),
            (None, Some(shape)) => info!(
                stage = stage.display_name(),
                component,
                rows_in = shape.rows,
                columns_in = shape.columns,
                "Stage started"
            ),
            _ => info!(stage = stage.display_name(), component, "Stage started"),
        }

        Self {
            stage,
            component: component.to_string(),
            index,
            shape_in,
            started: Instant::now(),
        }
    }

    pub(crate) fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Log the stage end and produce its metrics.
    pub(crate) fn finish(self, shape_out: Option<TableShape>) -> StageMetrics {
        let duration_ms = self.elapsed_ms();

        match shape_out {
            Some(shape) => info!(
                stage = self.stage.display_name(),
                component = %self.component,
                rows_out = shape.rows,
                columns_out = shape.columns,
                elapsed_ms = duration_ms,
                "Stage finished"
            ),
            None => info!(
                stage = self.stage.display_name(),
                component = %self.component,
                elapsed_ms = duration_ms,
                "Stage finished"
            ),
        }

        StageMetrics {
            stage: self.stage,
            component: self.component,
            index: self.index,
            shape_in: self.shape_in,
            shape_out,
            duration_ms,
        }
    }

    /// Log a stage failure.
    pub(crate) fn fail(self, cause: &anyhow::Error) {
        error!(
            stage = self.stage.display_name(),
            component = %self.component,
            elapsed_ms = self.elapsed_ms(),
            "Stage failed: {:#}",
            cause
        );
    }
}
