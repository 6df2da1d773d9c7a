//! Built-in writers.

mod csv;

pub use csv::CsvWriter;

use crate::components::FromParams;
use crate::registry::ComponentRegistry;

/// Register the built-in writers that are not registered yet.
pub(crate) fn discover(registry: &ComponentRegistry) -> usize {
    [CsvWriter::NAME, "CSVWriter"]
        .into_iter()
        .filter(|name| registry.discover_writer::<CsvWriter>(name))
        .count()
}
