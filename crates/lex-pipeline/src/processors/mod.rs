//! Built-in processors.
//!
//! - [`FilterProcessor`]: keep rows matching a condition on one column
//! - [`TransformProcessor`]: rewrite the values of one column
//! - [`ColumnProcessor`]: add, drop or rename columns
//! - [`FieldsOrganizer`]: select and order columns, creating missing ones

mod column;
mod fields;
mod filter;
mod transform;

pub use column::{ColumnOperation, ColumnProcessor};
pub use fields::FieldsOrganizer;
pub use filter::{Comparison, Condition, FilterProcessor, PredicateFn};
pub use transform::{Transform, TransformFn, TransformProcessor};

use crate::components::FromParams;
use crate::registry::ComponentRegistry;

/// Register the built-in processors that are not registered yet.
pub(crate) fn discover(registry: &ComponentRegistry) -> usize {
    [
        registry.discover_processor::<FilterProcessor>(FilterProcessor::NAME),
        registry.discover_processor::<TransformProcessor>(TransformProcessor::NAME),
        registry.discover_processor::<ColumnProcessor>(ColumnProcessor::NAME),
        registry.discover_processor::<FieldsOrganizer>(FieldsOrganizer::NAME),
    ]
    .into_iter()
    .filter(|added| *added)
    .count()
}
