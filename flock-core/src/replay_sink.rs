//! In-memory replay sink.
use crate::{error::FlockError, ReplaySink, Transition};
use anyhow::Result;
use std::collections::BTreeMap;

/// An item of a replay table.
#[derive(Clone, Debug, PartialEq)]
pub struct ReplayItemRef {
    /// Index of the first transition referenced by the item.
    pub index: usize,

    /// Number of transitions referenced by the item.
    pub num_timesteps: usize,

    /// Sampling priority.
    pub priority: f64,
}

/// A [`ReplaySink`] keeping transitions and prioritized items in memory.
///
/// It is used where the consumer lives in the same process, and in tests.
#[derive(Debug, Default)]
pub struct MemoryReplaySink {
    transitions: Vec<Transition>,
    tables: BTreeMap<String, Vec<ReplayItemRef>>,
}

impl MemoryReplaySink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// All appended transitions in order of arrival.
    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// Number of appended transitions.
    pub fn num_transitions(&self) -> usize {
        self.transitions.len()
    }

    /// Items of `table`; empty if the table has never been written.
    pub fn items(&self, table: &str) -> &[ReplayItemRef] {
        self.tables.get(table).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Number of items in `table`.
    pub fn len(&self, table: &str) -> usize {
        self.items(table).len()
    }

    /// Names of the tables written so far.
    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(|k| k.as_str())
    }

    /// Transitions referenced by `item`.
    pub fn resolve(&self, item: &ReplayItemRef) -> &[Transition] {
        &self.transitions[item.index..item.index + item.num_timesteps]
    }
}

impl ReplaySink for MemoryReplaySink {
    fn append(&mut self, transition: Transition) -> Result<()> {
        self.transitions.push(transition);
        Ok(())
    }

    fn create_item(&mut self, table: &str, num_timesteps: usize, priority: f64) -> Result<()> {
        let appended = self.transitions.len();
        if num_timesteps == 0 || num_timesteps > appended {
            return Err(FlockError::InvalidItem {
                table: table.to_string(),
                num_timesteps,
                appended,
            }
            .into());
        }
        self.tables
            .entry(table.to_string())
            .or_insert_with(Vec::new)
            .push(ReplayItemRef {
                index: appended - num_timesteps,
                num_timesteps,
                priority,
            });
        Ok(())
    }
}
