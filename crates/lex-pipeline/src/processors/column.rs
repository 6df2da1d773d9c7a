//! Column add, drop and rename.

use crate::components::{FromParams, Processor};
use crate::params::{ParamError, Params};
use crate::types::Table;
use crate::utils::{Scalar, has_column};
use polars::prelude::*;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// The structural change a [`ColumnProcessor`] makes.
#[derive(Debug, Clone)]
pub enum ColumnOperation {
    /// Add (or overwrite) a column holding one value in every row, or nulls
    /// when no value is given. An empty column name does nothing.
    Add { column: String, value: Option<Scalar> },
    /// Add (or overwrite) a column computed from an expression.
    Derive { column: String, expr: Expr },
    /// Remove columns; names that do not exist are ignored.
    Drop { columns: Vec<String> },
    /// Rename columns; names that do not exist are ignored.
    Rename { mapping: BTreeMap<String, String> },
}

/// Adds, drops or renames columns.
#[derive(Debug, Clone)]
pub struct ColumnProcessor {
    operation: ColumnOperation,
}

impl ColumnProcessor {
    pub fn new(operation: ColumnOperation) -> Self {
        Self { operation }
    }

    pub fn operation(&self) -> &ColumnOperation {
        &self.operation
    }

    fn add(input: Table, column: &str, value: Option<&Scalar>) -> anyhow::Result<Table> {
        let height = input.height();
        let series = match value {
            Some(value) => value.repeat(column, height),
            None => Series::full_null(column.into(), height, &DataType::Null),
        };
        let mut output = input;
        output.with_column(series)?;
        Ok(output)
    }

    fn drop(input: Table, columns: &[String]) -> anyhow::Result<Table> {
        let kept: Vec<PlSmallStr> = input
            .get_column_names()
            .into_iter()
            .filter(|name| !columns.iter().any(|c| c == name.as_str()))
            .cloned()
            .collect();

        let dropped = input.width() - kept.len();
        if dropped == 0 {
            debug!(?columns, "No columns to drop");
            return Ok(input);
        }
        info!(dropped, "Dropped columns");
        Ok(input.select(kept)?)
    }

    fn rename(mut input: Table, mapping: &BTreeMap<String, String>) -> anyhow::Result<Table> {
        for (old, new) in mapping {
            if has_column(&input, old) {
                input.rename(old, new.as_str().into())?;
                info!(from = %old, to = %new, "Renamed column");
            } else {
                debug!(column = %old, "Column to rename not found");
            }
        }
        Ok(input)
    }
}

impl Processor for ColumnProcessor {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        Self::DESCRIPTION
    }

    fn process(&self, input: Table) -> anyhow::Result<Table> {
        match &self.operation {
            ColumnOperation::Add { column, .. } | ColumnOperation::Derive { column, .. }
                if column.is_empty() =>
            {
                debug!("Empty column name, nothing to add");
                Ok(input)
            }
            ColumnOperation::Add { column, value } => Self::add(input, column, value.as_ref()),
            ColumnOperation::Derive { column, expr } => Ok(input
                .lazy()
                .with_column(expr.clone().alias(column.as_str()))
                .collect()?),
            ColumnOperation::Drop { columns } => Self::drop(input, columns),
            ColumnOperation::Rename { mapping } => Self::rename(input, mapping),
        }
    }
}

impl FromParams for ColumnProcessor {
    const NAME: &'static str = "ColumnProcessor";
    const DESCRIPTION: &'static str = "Adds, drops or renames columns";

    fn from_params(params: &Params) -> anyhow::Result<Self> {
        let operation = match params.required_str("operation")? {
            "add" => {
                let column = params.required_str("column")?.to_string();
                let value = match params.get("value") {
                    None | Some(Value::Null) => None,
                    Some(value) => Some(Scalar::from_json("value", value)?),
                };
                ColumnOperation::Add { column, value }
            }
            "drop" => ColumnOperation::Drop {
                columns: params
                    .string_list("columns")?
                    .ok_or_else(|| ParamError::Missing {
                        key: "columns".to_string(),
                    })?,
            },
            "rename" => ColumnOperation::Rename {
                mapping: params
                    .string_map("mapping")?
                    .ok_or_else(|| ParamError::Missing {
                        key: "mapping".to_string(),
                    })?,
            },
            other => {
                return Err(ParamError::invalid_value(
                    "operation",
                    format!("unknown operation '{other}' (expected add, drop or rename)"),
                )
                .into());
            }
        };
        Ok(Self::new(operation))
    }
}
