//! Priorities of items created in replay tables.
use crate::Step;
use std::collections::BTreeMap;

/// Name of the table used when no priority function is given.
pub const DEFAULT_PRIORITY_TABLE: &str = "priority_table";

/// Computes the priority of an item from the steps of its window.
///
/// The last step of the slice carries the arrival observations and zeros elsewhere.
pub type PriorityFn = Box<dyn Fn(&[&Step]) -> f64 + Send>;

/// Priority function per table. `None` stands for a constant priority of 1.
pub type PriorityFnMapping = BTreeMap<String, Option<PriorityFn>>;

/// A single table with constant priority.
pub fn default_priority_fns() -> PriorityFnMapping {
    let mut fns = PriorityFnMapping::new();
    fns.insert(DEFAULT_PRIORITY_TABLE.to_string(), None);
    fns
}

/// Applies the priority functions to `steps`.
pub fn calculate_priorities(
    priority_fns: &PriorityFnMapping,
    steps: &[&Step],
) -> BTreeMap<String, f64> {
    priority_fns
        .iter()
        .map(|(table, f)| {
            let priority = match f {
                Some(f) => f(steps),
                None => 1.0,
            };
            (table.clone(), priority)
        })
        .collect()
}
