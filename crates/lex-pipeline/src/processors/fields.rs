//! Output schema shaping.

use crate::components::{FromParams, Processor};
use crate::params::{ParamError, Params};
use crate::types::Table;
use crate::utils::{Scalar, has_column};
use polars::prelude::*;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Selects and orders columns to match a target list.
///
/// Columns not in the list are dropped. Target columns missing from the
/// table are created and filled with their default value (empty string
/// unless configured).
#[derive(Debug, Clone)]
pub struct FieldsOrganizer {
    target_columns: Vec<String>,
    default_values: BTreeMap<String, Scalar>,
}

impl FieldsOrganizer {
    pub fn new(target_columns: Vec<String>) -> Self {
        Self {
            target_columns,
            default_values: BTreeMap::new(),
        }
    }

    /// Value used to fill `column` when it has to be created.
    pub fn default_value(mut self, column: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.default_values.insert(column.into(), value.into());
        self
    }

    pub fn target_columns(&self) -> &[String] {
        &self.target_columns
    }
}

impl Processor for FieldsOrganizer {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        Self::DESCRIPTION
    }

    fn process(&self, input: Table) -> anyhow::Result<Table> {
        let height = input.height();
        let mut table = input;
        let empty = Scalar::Str(String::new());

        for column in &self.target_columns {
            if has_column(&table, column) {
                continue;
            }
            let value = self.default_values.get(column).unwrap_or(&empty);
            debug!(column = %column, default = ?value, "Creating missing column");
            table.with_column(value.repeat(column, height))?;
        }

        let ordered: Vec<PlSmallStr> = self
            .target_columns
            .iter()
            .map(|c| PlSmallStr::from(c.as_str()))
            .collect();
        let output = table.select(ordered)?;

        info!(columns = output.width(), "Organized fields");
        Ok(output)
    }
}

impl FromParams for FieldsOrganizer {
    const NAME: &'static str = "FieldsOrganizer";
    const DESCRIPTION: &'static str = "Selects and orders columns, creating missing ones";

    fn from_params(params: &Params) -> anyhow::Result<Self> {
        let target_columns = match params.get("target_columns") {
            Some(serde_json::Value::Array(_)) => params.string_list("target_columns")?.unwrap_or_default(),
            Some(_) => {
                return Err(ParamError::invalid_value("target_columns", "must be a list").into());
            }
            None => {
                return Err(ParamError::Missing {
                    key: "target_columns".to_string(),
                }
                .into());
            }
        };
        if target_columns.is_empty() {
            return Err(ParamError::invalid_value("target_columns", "must not be empty").into());
        }

        let mut organizer = Self::new(target_columns);
        if let Some(defaults) = params.object("default_values")? {
            for (column, value) in defaults {
                organizer = organizer.default_value(column.as_str(), Scalar::from_json("default_values", value)?);
            }
        }
        Ok(organizer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn names(table: &Table) -> Vec<String> {
        table
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn test_selects_reorders_and_fills() {
        let df = df!("b" => [1i64, 2], "a" => ["x", "y"], "extra" => [true, false]).unwrap();
        let organizer = FieldsOrganizer::new(vec!["a".into(), "b".into(), "c".into(), "d".into()])
            .default_value("d", 0i64);

        let result = organizer.process(df).unwrap();

        assert_eq!(names(&result), vec!["a", "b", "c", "d"]);
        assert_eq!(result.column("c").unwrap().str().unwrap().get(1), Some(""));
        assert_eq!(result.column("d").unwrap().i64().unwrap().get(0), Some(0));
    }

    #[test]
    fn test_empty_table_gets_target_schema() {
        let result = FieldsOrganizer::new(vec!["id".into(), "name".into()])
            .process(DataFrame::empty())
            .unwrap();
        assert_eq!(result.shape(), (0, 2));
    }

    #[test]
    fn test_from_params() {
        let params = Params::from_value(json!({
            "target_columns": ["id", "status"],
            "default_values": {"status": "new"}
        }))
        .unwrap();
        let df = df!("id" => [1i64]).unwrap();

        let result = FieldsOrganizer::from_params(&params).unwrap().process(df).unwrap();
        assert_eq!(result.column("status").unwrap().str().unwrap().get(0), Some("new"));
    }

    #[test]
    fn test_target_columns_must_be_non_empty_list() {
        for value in [json!({}), json!({"target_columns": []}), json!({"target_columns": "id"})] {
            let params = Params::from_value(value).unwrap();
            assert!(FieldsOrganizer::from_params(&params).is_err());
        }
    }
}
