//! Per-column value transformation.

use crate::components::{FromParams, Processor};
use crate::params::{ParamError, Params};
use crate::types::Table;
use crate::utils::{Scalar, has_column, is_numeric_dtype, is_string_dtype, parse_dtype};
use polars::prelude::*;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Expression builder applied to the source column.
pub type TransformFn = Arc<dyn Fn(Expr) -> Expr + Send + Sync>;

/// What a [`TransformProcessor`] does to its column.
#[derive(Clone)]
pub enum Transform {
    /// Arithmetic operands keep the column's integer type when they are
    /// integers themselves; `Divide` always yields floats.
    Multiply(Scalar),
    Add(Scalar),
    Subtract(Scalar),
    Divide(Scalar),
    /// Replace nulls with a value.
    FillNull(Scalar),
    /// Convert to another dtype; values that cannot be converted become null.
    Cast(DataType),
    Upper,
    Lower,
    /// Arbitrary expression over the column.
    Custom(TransformFn),
}

impl Transform {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(Expr) -> Expr + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }

    fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            Self::Multiply(_) | Self::Add(_) | Self::Subtract(_) | Self::Divide(_)
        )
    }

    fn is_text(&self) -> bool {
        matches!(self, Self::Upper | Self::Lower)
    }

    fn expr(&self, column: Expr) -> Expr {
        match self {
            Self::Multiply(v) => column * v.lit(),
            Self::Add(v) => column + v.lit(),
            Self::Subtract(v) => column - v.lit(),
            Self::Divide(v) => column / v.lit(),
            Self::FillNull(value) => column.fill_null(value.lit()),
            Self::Cast(dtype) => column.cast(dtype.clone()),
            Self::Upper => column.str().to_uppercase(),
            Self::Lower => column.str().to_lowercase(),
            Self::Custom(f) => f(column),
        }
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Multiply(v) => write!(f, "Multiply({v:?})"),
            Self::Add(v) => write!(f, "Add({v:?})"),
            Self::Subtract(v) => write!(f, "Subtract({v:?})"),
            Self::Divide(v) => write!(f, "Divide({v:?})"),
            Self::FillNull(value) => write!(f, "FillNull({value:?})"),
            Self::Cast(dtype) => write!(f, "Cast({dtype})"),
            Self::Upper => f.write_str("Upper"),
            Self::Lower => f.write_str("Lower"),
            Self::Custom(_) => f.write_str("Custom"),
        }
    }
}

/// Applies a [`Transform`] to one column, in place or into `target_column`.
///
/// A table without the source column passes through unchanged.
#[derive(Debug, Clone)]
pub struct TransformProcessor {
    column: String,
    transform: Transform,
    target_column: Option<String>,
}

impl TransformProcessor {
    pub fn new(column: impl Into<String>, transform: Transform) -> Self {
        Self {
            column: column.into(),
            transform,
            target_column: None,
        }
    }

    /// Write the result to this column instead of overwriting the source.
    pub fn target_column(mut self, target: impl Into<String>) -> Self {
        self.target_column = Some(target.into());
        self
    }

    fn output_column(&self) -> &str {
        self.target_column.as_deref().unwrap_or(&self.column)
    }
}

impl Processor for TransformProcessor {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        Self::DESCRIPTION
    }

    fn process(&self, input: Table) -> anyhow::Result<Table> {
        if !has_column(&input, &self.column) {
            warn!(column = %self.column, "Transform column not found, passing table through");
            return Ok(input);
        }

        let dtype = input.column(&self.column)?.dtype().clone();
        if self.transform.is_arithmetic() && !is_numeric_dtype(&dtype) {
            anyhow::bail!(
                "cannot apply {:?} to column '{}' of type {}",
                self.transform,
                self.column,
                dtype
            );
        }
        if self.transform.is_text() && !is_string_dtype(&dtype) {
            anyhow::bail!(
                "cannot apply {:?} to column '{}' of type {}",
                self.transform,
                self.column,
                dtype
            );
        }

        let output = input
            .lazy()
            .with_column(
                self.transform
                    .expr(col(self.column.as_str()))
                    .alias(self.output_column()),
            )
            .collect()?;

        debug!(
            column = %self.column,
            target = self.output_column(),
            transform = ?self.transform,
            "Transformed column"
        );
        Ok(output)
    }
}

impl FromParams for TransformProcessor {
    const NAME: &'static str = "TransformProcessor";
    const DESCRIPTION: &'static str = "Transforms the values of one column";

    fn from_params(params: &Params) -> anyhow::Result<Self> {
        let column = params.required_str("column")?;
        let operation = params.required_str("operation")?.to_ascii_lowercase();

        let number = || -> Result<Scalar, ParamError> {
            let value = params.get("value").ok_or_else(|| ParamError::Missing {
                key: "value".to_string(),
            })?;
            let scalar = Scalar::from_json("value", value)?;
            match scalar {
                Scalar::Int(_) | Scalar::Float(_) => Ok(scalar),
                _ => Err(ParamError::invalid_value("value", "expected a number")),
            }
        };

        let transform = match operation.as_str() {
            "multiply" => Transform::Multiply(number()?),
            "add" => Transform::Add(number()?),
            "subtract" => Transform::Subtract(number()?),
            "divide" => {
                let divisor = number()?;
                if divisor.as_f64() == Some(0.0) {
                    return Err(ParamError::invalid_value("value", "division by zero").into());
                }
                Transform::Divide(divisor)
            }
            "fill_null" => {
                let value = params.get("value").ok_or_else(|| ParamError::Missing {
                    key: "value".to_string(),
                })?;
                Transform::FillNull(Scalar::from_json("value", value)?)
            }
            "cast" => {
                let name = params.required_str("dtype")?;
                let dtype = parse_dtype(name).ok_or_else(|| {
                    ParamError::invalid_value("dtype", format!("unknown dtype '{name}'"))
                })?;
                Transform::Cast(dtype)
            }
            "upper" => Transform::Upper,
            "lower" => Transform::Lower,
            other => {
                return Err(ParamError::invalid_value(
                    "operation",
                    format!("unknown operation '{other}'"),
                )
                .into());
            }
        };

        let mut processor = Self::new(column, transform);
        if let Some(target) = params.str("target_column")? {
            processor = processor.target_column(target);
        }
        Ok(processor)
    }
}
