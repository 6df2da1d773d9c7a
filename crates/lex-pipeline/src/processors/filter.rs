//! Row filtering by a condition on one column.

use crate::components::{FromParams, Processor};
use crate::params::{ParamError, Params};
use crate::types::Table;
use crate::utils::{Scalar, has_column};
use polars::prelude::*;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Comparison operators accepted in `{"op": ..., "value": ...}` conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl Comparison {
    fn apply(self, column: Expr, value: Expr) -> Expr {
        match self {
            Self::Eq => column.eq(value),
            Self::Ne => column.neq(value),
            Self::Gt => column.gt(value),
            Self::Ge => column.gt_eq(value),
            Self::Lt => column.lt(value),
            Self::Le => column.lt_eq(value),
        }
    }
}

/// Predicate builder for a column expression.
pub type PredicateFn = Arc<dyn Fn(Expr) -> Expr + Send + Sync>;

/// Which rows a [`FilterProcessor`] keeps.
#[derive(Clone)]
pub enum Condition {
    /// Compare the column with a value.
    Compare(Comparison, Scalar),
    /// Keep rows whose value is one of these.
    In(Vec<Scalar>),
    /// Keep rows whose value is none of these.
    NotIn(Vec<Scalar>),
    IsNull,
    NotNull,
    /// Arbitrary predicate over the column expression.
    Custom(PredicateFn),
}

impl Condition {
    /// Keep rows equal to `value`.
    pub fn equals(value: impl Into<Scalar>) -> Self {
        Self::Compare(Comparison::Eq, value.into())
    }

    /// Keep rows for which `predicate(col(column))` is true.
    pub fn custom<F>(predicate: F) -> Self
    where
        F: Fn(Expr) -> Expr + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(predicate))
    }

    fn predicate(&self, column: Expr) -> Expr {
        match self {
            Self::Compare(op, value) => op.apply(column, value.lit()),
            Self::In(values) => any_equal(column, values),
            Self::NotIn(values) => any_equal(column, values).not(),
            Self::IsNull => column.is_null(),
            Self::NotNull => column.is_not_null(),
            Self::Custom(predicate) => predicate(column),
        }
    }

    /// Parse the `condition` parameter.
    ///
    /// A scalar means equality, a list means membership, and an object
    /// selects an operator: `{"op": "ge", "value": 18}`.
    pub fn from_json(value: &Value) -> Result<Self, ParamError> {
        const KEY: &str = "condition";
        match value {
            Value::Object(map) => {
                let op = match map.get("op") {
                    Some(Value::String(op)) => op.to_ascii_lowercase(),
                    Some(_) => return Err(ParamError::invalid_value(KEY, "'op' must be a string")),
                    None => "eq".to_string(),
                };
                let operand = || {
                    map.get("value")
                        .ok_or_else(|| ParamError::invalid_value(KEY, format!("'{op}' needs a 'value'")))
                };
                let compare = |cmp: Comparison| -> Result<Self, ParamError> {
                    Ok(Self::Compare(cmp, Scalar::from_json(KEY, operand()?)?))
                };

                match op.as_str() {
                    "eq" | "==" => compare(Comparison::Eq),
                    "ne" | "!=" => compare(Comparison::Ne),
                    "gt" | ">" => compare(Comparison::Gt),
                    "ge" | ">=" => compare(Comparison::Ge),
                    "lt" | "<" => compare(Comparison::Lt),
                    "le" | "<=" => compare(Comparison::Le),
                    "in" => Ok(Self::In(scalar_list(operand()?)?)),
                    "not_in" => Ok(Self::NotIn(scalar_list(operand()?)?)),
                    "is_null" => Ok(Self::IsNull),
                    "not_null" => Ok(Self::NotNull),
                    other => Err(ParamError::invalid_value(
                        KEY,
                        format!("unknown operator '{other}'"),
                    )),
                }
            }
            Value::Array(_) => Ok(Self::In(scalar_list(value)?)),
            scalar => Ok(Self::equals(Scalar::from_json(KEY, scalar)?)),
        }
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compare(op, value) => write!(f, "{op:?} {value:?}"),
            Self::In(values) => write!(f, "In {values:?}"),
            Self::NotIn(values) => write!(f, "NotIn {values:?}"),
            Self::IsNull => f.write_str("IsNull"),
            Self::NotNull => f.write_str("NotNull"),
            Self::Custom(_) => f.write_str("Custom"),
        }
    }
}

fn any_equal(column: Expr, values: &[Scalar]) -> Expr {
    values
        .iter()
        .map(|value| column.clone().eq(value.lit()))
        .reduce(|acc, next| acc.or(next))
        .unwrap_or_else(|| lit(false))
}

fn scalar_list(value: &Value) -> Result<Vec<Scalar>, ParamError> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| Scalar::from_json("condition", item))
            .collect(),
        _ => Err(ParamError::invalid_value("condition", "expected a list of values")),
    }
}

/// Keeps the rows whose `column` satisfies a [`Condition`].
///
/// A table without the column passes through unchanged.
#[derive(Debug, Clone)]
pub struct FilterProcessor {
    column: String,
    condition: Condition,
}

impl FilterProcessor {
    pub fn new(column: impl Into<String>, condition: Condition) -> Self {
        Self {
            column: column.into(),
            condition,
        }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn condition(&self) -> &Condition {
        &self.condition
    }
}

impl Processor for FilterProcessor {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        Self::DESCRIPTION
    }

    fn process(&self, input: Table) -> anyhow::Result<Table> {
        if !has_column(&input, &self.column) {
            warn!(column = %self.column, "Filter column not found, passing table through");
            return Ok(input);
        }

        let rows_before = input.height();
        let output = input
            .lazy()
            .filter(self.condition.predicate(col(self.column.as_str())))
            .collect()?;

        debug!(
            column = %self.column,
            condition = ?self.condition,
            rows_before,
            rows_after = output.height(),
            "Filtered rows"
        );
        Ok(output)
    }
}

impl FromParams for FilterProcessor {
    const NAME: &'static str = "FilterProcessor";
    const DESCRIPTION: &'static str = "Keeps rows whose column satisfies a condition";

    fn from_params(params: &Params) -> anyhow::Result<Self> {
        let column = params.required_str("column")?;
        let condition = match params.get("condition") {
            None | Some(Value::Null) => {
                return Err(ParamError::Missing {
                    key: "condition".to_string(),
                }
                .into());
            }
            Some(value) => Condition::from_json(value)?,
        };
        Ok(Self::new(column, condition))
    }
}
