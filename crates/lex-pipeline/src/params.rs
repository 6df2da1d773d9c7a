//! Parameter bags handed to component constructors.
//!
//! A [`Params`] value is a JSON object. Configuration documents supply it
//! verbatim; code can build one with [`Params::with`]. Each component pulls
//! the keys it understands and reports a [`ParamError`] for anything missing
//! or malformed.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Errors raised while extracting constructor parameters.
#[derive(Debug, thiserror::Error)]
pub enum ParamError {
    #[error("missing required parameter '{key}'")]
    Missing { key: String },

    #[error("parameter '{key}' must be {expected}")]
    InvalidType { key: String, expected: &'static str },

    #[error("invalid value for parameter '{key}': {reason}")]
    InvalidValue { key: String, reason: String },
}

impl ParamError {
    fn invalid_type(key: &str, expected: &'static str) -> Self {
        Self::InvalidType {
            key: key.to_string(),
            expected,
        }
    }

    /// Build an [`InvalidValue`](Self::InvalidValue) error.
    pub fn invalid_value(key: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

/// Keyword parameters for a component constructor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(Map<String, Value>);

impl Params {
    /// Create an empty parameter bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter, replacing any previous value for `key`.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Convert an arbitrary JSON value; only objects (or `null`) are accepted.
    pub fn from_value(value: Value) -> Result<Self, ParamError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::new()),
            _ => Err(ParamError::invalid_type("params", "an object")),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Raw access to a parameter value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Iterate over parameter names.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Optional string parameter. `null` is treated as absent.
    pub fn str(&self, key: &str) -> Result<Option<&str>, ParamError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(_) => Err(ParamError::invalid_type(key, "a string")),
        }
    }

    /// Required string parameter.
    pub fn required_str(&self, key: &str) -> Result<&str, ParamError> {
        self.str(key)?.ok_or_else(|| ParamError::Missing {
            key: key.to_string(),
        })
    }

    /// String parameter with a default.
    pub fn str_or<'a>(&'a self, key: &str, default: &'a str) -> Result<&'a str, ParamError> {
        Ok(self.str(key)?.unwrap_or(default))
    }

    /// Boolean parameter with a default.
    pub fn bool_or(&self, key: &str, default: bool) -> Result<bool, ParamError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(default),
            Some(Value::Bool(b)) => Ok(*b),
            Some(_) => Err(ParamError::invalid_type(key, "a boolean")),
        }
    }

    /// Single-byte character parameter (separators, quote characters).
    pub fn u8_char_or(&self, key: &str, default: u8) -> Result<u8, ParamError> {
        match self.str(key)? {
            None => Ok(default),
            Some(s) if s.len() == 1 && s.is_ascii() => Ok(s.as_bytes()[0]),
            Some(s) if s == "\\t" => Ok(b'\t'),
            Some(s) => Err(ParamError::invalid_value(
                key,
                format!("expected a single ASCII character, got '{s}'"),
            )),
        }
    }

    /// A list of strings. A bare string is accepted as a one-element list.
    pub fn string_list(&self, key: &str) -> Result<Option<Vec<String>>, ParamError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(vec![s.clone()])),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.clone()),
                    _ => Err(ParamError::invalid_type(key, "a list of strings")),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Some),
            Some(_) => Err(ParamError::invalid_type(key, "a string or a list of strings")),
        }
    }

    /// A string-to-string mapping, in key order.
    pub fn string_map(&self, key: &str) -> Result<Option<BTreeMap<String, String>>, ParamError> {
        match self.object(key)? {
            None => Ok(None),
            Some(map) => map
                .iter()
                .map(|(k, v)| match v {
                    Value::String(s) => Ok((k.clone(), s.clone())),
                    _ => Err(ParamError::invalid_type(key, "a mapping of strings to strings")),
                })
                .collect::<Result<BTreeMap<_, _>, _>>()
                .map(Some),
        }
    }

    /// A nested object parameter.
    pub fn object(&self, key: &str) -> Result<Option<&Map<String, Value>>, ParamError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Object(map)) => Ok(Some(map)),
            Some(_) => Err(ParamError::invalid_type(key, "an object")),
        }
    }

    /// Deserialize the whole bag into a typed settings struct.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, ParamError> {
        serde_json::from_value(Value::Object(self.0.clone()))
            .map_err(|e| ParamError::invalid_value("params", e.to_string()))
    }
}

impl From<Map<String, Value>> for Params {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl From<Params> for Value {
    fn from(params: Params) -> Self {
        Value::Object(params.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Params {
        Params::from_value(value).unwrap()
    }

    #[derive(Debug, serde::Deserialize, PartialEq)]
    struct SamplerSettings {
        column: String,
        #[serde(default)]
        fraction: Option<f64>,
    }

    #[test]
    fn test_deserialize_typed_settings() {
        let p = params(json!({"column": "age", "fraction": 0.5}));
        let settings: SamplerSettings = p.deserialize().unwrap();
        assert_eq!(
            settings,
            SamplerSettings {
                column: "age".to_string(),
                fraction: Some(0.5),
            }
        );

        let err = params(json!({"fraction": "half"}))
            .deserialize::<SamplerSettings>()
            .unwrap_err();
        assert!(matches!(err, ParamError::InvalidValue { .. }));
    }

    #[test]
    fn test_keys_and_value_conversion() {
        let p = Params::new().with("separator", ";").with("column", "age");
        let mut keys: Vec<&str> = p.keys().collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["column", "separator"]);

        let value: Value = p.into();
        assert_eq!(value, json!({"column": "age", "separator": ";"}));
    }

    #[test]
    fn test_required_str() {
        let p = params(json!({"column": "age"}));
        assert_eq!(p.required_str("column").unwrap(), "age");
        assert!(matches!(
            p.required_str("missing"),
            Err(ParamError::Missing { .. })
        ));
    }

    #[test]
    fn test_wrong_type_is_reported() {
        let p = params(json!({"column": 5, "flag": "yes"}));
        assert!(matches!(
            p.str("column"),
            Err(ParamError::InvalidType { .. })
        ));
        assert!(p.bool_or("flag", false).is_err());
    }

    #[test]
    fn test_string_list_accepts_single_string() {
        let p = params(json!({"one": "a", "many": ["a", "b"], "bad": [1]}));
        assert_eq!(p.string_list("one").unwrap(), Some(vec!["a".to_string()]));
        assert_eq!(
            p.string_list("many").unwrap(),
            Some(vec!["a".to_string(), "b".to_string()])
        );
        assert!(p.string_list("bad").is_err());
        assert_eq!(p.string_list("absent").unwrap(), None);
    }

    #[test]
    fn test_separator_parsing() {
        let p = params(json!({"sep": ";", "tab": "\\t", "long": "ab"}));
        assert_eq!(p.u8_char_or("sep", b',').unwrap(), b';');
        assert_eq!(p.u8_char_or("tab", b',').unwrap(), b'\t');
        assert_eq!(p.u8_char_or("absent", b',').unwrap(), b',');
        assert!(p.u8_char_or("long", b',').is_err());
    }

    #[test]
    fn test_from_value_rejects_non_objects() {
        assert!(Params::from_value(json!([1, 2])).is_err());
        assert!(Params::from_value(Value::Null).unwrap().is_empty());
    }

    #[test]
    fn test_builder_with() {
        let p = Params::new().with("input_dir", "data").with("has_header", true);
        assert_eq!(p.len(), 2);
        assert_eq!(p.str("input_dir").unwrap(), Some("data"));
        assert!(p.bool_or("has_header", false).unwrap());
    }
}
