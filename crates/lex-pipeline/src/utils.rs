//! Shared utilities for the built-in components.
//!
//! Helpers for turning parameter values into polars literals and dtypes,
//! matching file names against wildcard patterns and stamping output names.

use crate::params::ParamError;
use chrono::Local;
use encoding_rs::Encoding;
use polars::prelude::*;
use regex::Regex;
use serde_json::Value;

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Check if a DataType holds text.
#[inline]
pub fn is_string_dtype(dtype: &DataType) -> bool {
    matches!(dtype, DataType::String)
}

/// Parse a dtype name as used in configuration documents.
///
/// Accepts `int`/`int64`/`i64`, `int32`/`i32`, `float`/`float64`/`f64`,
/// `float32`/`f32`, `str`/`string`, `bool`/`boolean` (case-insensitive).
pub fn parse_dtype(name: &str) -> Option<DataType> {
    let dtype = match name.trim().to_ascii_lowercase().as_str() {
        "int" | "int64" | "i64" | "integer" => DataType::Int64,
        "int32" | "i32" => DataType::Int32,
        "float" | "float64" | "f64" | "double" => DataType::Float64,
        "float32" | "f32" => DataType::Float32,
        "str" | "string" | "text" => DataType::String,
        "bool" | "boolean" => DataType::Boolean,
        _ => return None,
    };
    Some(dtype)
}

/// Whether `table` has a column called `name`.
#[inline]
pub fn has_column(table: &DataFrame, name: &str) -> bool {
    table.get_column_index(name).is_some()
}

// =============================================================================
// Scalar Values
// =============================================================================

/// A single cell value supplied through parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Scalar {
    /// Convert a JSON scalar. `null`, arrays and objects are rejected.
    pub fn from_json(key: &str, value: &Value) -> Result<Self, ParamError> {
        match value {
            Value::Bool(b) => Ok(Self::Bool(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Self::Int(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(Self::Float(f))
                } else {
                    Err(ParamError::invalid_value(key, format!("unsupported number {n}")))
                }
            }
            Value::String(s) => Ok(Self::Str(s.clone())),
            Value::Null => Err(ParamError::invalid_value(key, "null is not a value")),
            Value::Array(_) | Value::Object(_) => Err(ParamError::invalid_value(
                key,
                "expected a string, number or boolean",
            )),
        }
    }

    /// Numeric value, if this scalar is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// The value as a polars literal expression.
    pub fn lit(&self) -> Expr {
        match self {
            Self::Bool(b) => lit(*b),
            Self::Int(i) => lit(*i),
            Self::Float(f) => lit(*f),
            Self::Str(s) => lit(s.clone()),
        }
    }

    /// A series holding this value `len` times.
    pub fn repeat(&self, name: &str, len: usize) -> Series {
        match self {
            Self::Bool(b) => Series::new(name.into(), vec![*b; len]),
            Self::Int(i) => Series::new(name.into(), vec![*i; len]),
            Self::Float(f) => Series::new(name.into(), vec![*f; len]),
            Self::Str(s) => Series::new(name.into(), vec![s.as_str(); len]),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

// =============================================================================
// File Name Utilities
// =============================================================================

/// Compile a shell-style wildcard (`*`, `?`) into an anchored regex.
pub fn wildcard_to_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let mut source = String::with_capacity(pattern.len() + 8);
    source.push('^');
    for c in pattern.chars() {
        match c {
            '*' => source.push_str(".*"),
            '?' => source.push('.'),
            other => source.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    source.push('$');
    Regex::new(&source)
}

/// Resolve a text encoding label (`utf-8`, `latin1`, `gbk`, `shift_jis`, ...).
///
/// Labels follow the WHATWG Encoding Standard, so `latin1` and `iso-8859-1`
/// resolve to windows-1252.
pub fn text_encoding(key: &str, label: &str) -> Result<&'static Encoding, ParamError> {
    Encoding::for_label(label.trim().as_bytes()).ok_or_else(|| {
        ParamError::invalid_value(key, format!("unsupported encoding '{label}'"))
    })
}

/// Local time formatted as `YYYYMMDD_HHMMSS`, used in generated file names.
pub fn timestamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Insert `_suffix` before the extension of `filename`.
///
/// `out.csv` becomes `out_<suffix>.csv`; a name without an extension just
/// gets the suffix appended.
pub fn with_suffix(filename: &str, suffix: &str) -> String {
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}_{suffix}.{ext}"),
        _ => format!("{filename}_{suffix}"),
    }
}
