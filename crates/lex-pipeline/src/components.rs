//! Component contracts: loaders, processors and writers.
//!
//! Every pipeline stage is one of three capabilities. Implementations carry
//! a name and a description (used for logs and diagnostics only) and one
//! domain operation. Component failures are reported as [`anyhow::Error`];
//! the pipeline wraps them with the stage that raised them.
//!
//! # Implementing a Component
//!
//! ```rust,ignore
//! use lex_pipeline::{Params, Processor, FromParams, Table};
//!
//! struct Passthrough;
//!
//! impl Processor for Passthrough {
//!     fn name(&self) -> &str { "Passthrough" }
//!     fn process(&self, table: Table) -> anyhow::Result<Table> { Ok(table) }
//! }
//!
//! impl FromParams for Passthrough {
//!     const NAME: &'static str = "Passthrough";
//!     const DESCRIPTION: &'static str = "Returns its input unchanged";
//!     fn from_params(_params: &Params) -> anyhow::Result<Self> { Ok(Self) }
//! }
//!
//! registry.register_processor_type::<Passthrough>()?;
//! ```

use crate::params::Params;
use crate::types::Table;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The three component categories the registry knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Loader,
    Processor,
    Writer,
}

impl ComponentKind {
    pub const ALL: [ComponentKind; 3] = [Self::Loader, Self::Processor, Self::Writer];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Loader => "loader",
            Self::Processor => "processor",
            Self::Writer => "writer",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Produces the table a pipeline starts from.
pub trait Loader: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    /// Load a table. Must return a valid (possibly empty) table or fail.
    fn load(&self) -> anyhow::Result<Table>;
}

/// Transforms one table into another.
///
/// Processors receive the previous stage's output by value and must not
/// assume it is non-empty.
pub trait Processor: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    fn process(&self, input: Table) -> anyhow::Result<Table>;
}

/// Persists or emits the final table.
pub trait Writer: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    fn write(&self, input: &Table) -> anyhow::Result<()>;
}

/// Construction from a keyword parameter bag.
///
/// Types implementing this (plus one of the component traits) can be
/// registered with a single `register_*_type::<T>()` call.
pub trait FromParams: Sized {
    /// Name the component is registered under.
    const NAME: &'static str;

    /// One-line description shown in component listings.
    const DESCRIPTION: &'static str;

    fn from_params(params: &Params) -> anyhow::Result<Self>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_kind_display() {
        assert_eq!(ComponentKind::Loader.to_string(), "loader");
        assert_eq!(ComponentKind::Writer.as_str(), "writer");
    }

    #[test]
    fn test_component_kind_json_values() {
        for (kind, expected) in [
            (ComponentKind::Loader, "\"loader\""),
            (ComponentKind::Processor, "\"processor\""),
            (ComponentKind::Writer, "\"writer\""),
        ] {
            assert_eq!(serde_json::to_string(&kind).unwrap(), expected);
        }
    }
}
