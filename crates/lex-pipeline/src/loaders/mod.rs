//! Built-in loaders.

mod csv;

pub use csv::{CsvLoader, SOURCE_COLUMN};

use crate::components::FromParams;
use crate::registry::ComponentRegistry;

/// Register the built-in loaders that are not registered yet.
pub(crate) fn discover(registry: &ComponentRegistry) -> usize {
    [CsvLoader::NAME, "CSVLoader"]
        .into_iter()
        .filter(|name| registry.discover_loader::<CsvLoader>(name))
        .count()
}
