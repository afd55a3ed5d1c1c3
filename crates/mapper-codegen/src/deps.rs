//! Declaring-module tracking for incremental rebuilds.

use std::collections::BTreeSet;

use crate::types::ModuleId;

/// The modules a generated unit was derived from.
///
/// Kept sorted so generated output and rerun directives are stable.
pub type DependencySet = BTreeSet<ModuleId>;

/// Accumulates the declaring modules touched while generating one unit.
#[derive(Debug, Default)]
pub struct DependencyCollector {
    modules: DependencySet,
}

impl DependencyCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, module: &ModuleId) {
        self.modules.insert(module.clone());
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Hand over the collected set.
    pub fn finish(self) -> DependencySet {
        self.modules
    }
}
