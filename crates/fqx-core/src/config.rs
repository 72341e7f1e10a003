//! Planner configuration.

use crate::cardinality::CardinalityComparator;
use serde::{Deserialize, Serialize};

/// Configuration knobs for one `Planner`.
///
/// The cardinality fields feed the `CardinalityComparator` used by join
/// ordering. `max_search_states` bounds the component search for queries with
/// very many overlapping fragments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlannerConfig {
    /// Reliable estimates at or above this value count as large.
    pub large_cardinality: u64,
    pub relative_closeness: f64,
    pub absolute_closeness: u64,
    /// Upper bound on the number of search states expanded per `plan()` call.
    pub max_search_states: usize,
    /// Dry-run join ordering on every candidate component before accepting it.
    pub validate_components: bool,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        let comparator = CardinalityComparator::default();
        Self {
            large_cardinality: comparator.large_cardinality,
            relative_closeness: comparator.relative_closeness,
            absolute_closeness: comparator.absolute_closeness,
            max_search_states: 1_000_000,
            validate_components: true,
        }
    }
}

impl PlannerConfig {
    pub fn comparator(&self) -> CardinalityComparator {
        CardinalityComparator {
            large_cardinality: self.large_cardinality,
            relative_closeness: self.relative_closeness,
            absolute_closeness: self.absolute_closeness,
        }
    }
}
