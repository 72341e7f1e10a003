//! # Planner
//!
//! The public entry point. `Planner::plan` takes a query and the fragments
//! matched against it and returns a plan tree:
//!
//! ```text
//! fragments ─ group_nodes ─ JoinGraph ─ find_components
//!                                         │
//!                  0 ─ Empty              │ 1 ─ join order
//!                                         │
//!                  many ─ remove alternatives ─ shared subsets ─ replace
//!                         ─ join order per component ─ Union
//! ```
//!
//! A `Planner` holds no per-query state and may be shared between threads.
//! Every call builds and owns its own join graph.

use crate::bits::Bits;
use crate::cardinality::CardinalityOracle;
use crate::config::PlannerConfig;
use crate::dedup::group_nodes;
use crate::error::{PlanError, PlanResult};
use crate::fragment::Fragment;
use crate::join_graph::JoinGraph;
use crate::join_order::JoinOrderPlanner;
use crate::plan::PlanTree;
use crate::query::Query;
use crate::reducer::{find_common_subsets, remove_alternative_components, replace_shared};
use crate::search::find_components;
use tracing::{debug, info};

#[derive(Debug, Clone, Default)]
pub struct Planner {
    config: PlannerConfig,
    oracle: CardinalityOracle,
}

impl Planner {
    pub fn new(config: PlannerConfig, oracle: CardinalityOracle) -> Self {
        Self { config, oracle }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn join_order(&self) -> JoinOrderPlanner {
        JoinOrderPlanner::new(self.oracle.clone(), self.config.comparator())
    }

    /// Plan `query` over `fragments`.
    ///
    /// Returns `Ok(PlanTree::Empty)` when the fragments cannot answer the
    /// query. Errors are reserved for contract violations such as fragments
    /// built against another query.
    pub fn plan(&self, query: &Query, fragments: Vec<Fragment>) -> PlanResult<PlanTree> {
        if query.is_empty() || fragments.is_empty() {
            debug!("Nothing to plan: {} triples, {} fragments", query.triples().len(), fragments.len());
            return Ok(PlanTree::Empty);
        }
        let mut covered = Bits::new();
        for fragment in &fragments {
            if fragment.universe() != query.universe() {
                return Err(PlanError::ForeignUniverse {
                    fragment: fragment.name().to_string(),
                    expected: query.universe(),
                    found: fragment.universe(),
                });
            }
            covered.union_with(&fragment.props().triples);
        }
        let missing = query.all_triples().difference(&covered);
        if !missing.is_empty() {
            info!("No fragment matches {}", query.describe_triples(&missing));
            return Ok(PlanTree::Empty);
        }
        if !query.is_join_connected() {
            debug!("Query is not join-connected");
        }

        let nodes = group_nodes(fragments);
        let mut graph = JoinGraph::build(nodes);
        let join_order = self.join_order();
        let components: Vec<Bits> = find_components(query, &graph, &join_order, &self.config)
            .into_iter()
            .collect();

        let plan = match components.as_slice() {
            [] => {
                debug!("No component answers the query");
                PlanTree::Empty
            }
            [only] => join_order.plan(&graph, only)?,
            _ => {
                let components = remove_alternative_components(components, &graph);
                let shared = find_common_subsets(&components, &graph);
                let components = if shared.is_empty() {
                    components
                } else {
                    replace_shared(components, &shared, &mut graph, &join_order)?
                };
                let branches = components
                    .iter()
                    .map(|component| join_order.plan(&graph, component))
                    .collect::<PlanResult<Vec<_>>>()?;
                debug!("Planned {} alternative component(s)", branches.len());
                PlanTree::union(branches)
            }
        };
        debug_assert!(plan.is_empty() || plan.props().triples == query.all_triples());
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::Source;
    use crate::query::Triple;

    fn query() -> Query {
        Query::new(vec![
            Triple::parse("?x", "<knows>", "?y"),
            Triple::parse("?y", "<name>", "?n"),
        ])
    }

    #[test]
    fn test_empty_inputs() {
        let planner = Planner::default();
        assert!(planner.plan(&Query::new(vec![]), vec![]).unwrap().is_empty());
        assert!(planner.plan(&query(), vec![]).unwrap().is_empty());
    }

    #[test]
    fn test_uncovered_triple() {
        let q = query();
        let only_first = Fragment::builder(&q, "f", Source::sparql("s")).triple(0).build().unwrap();
        assert!(Planner::default().plan(&q, vec![only_first]).unwrap().is_empty());
    }

    #[test]
    fn test_foreign_universe() {
        let q = query();
        let other = query();
        let stranger = Fragment::builder(&other, "f", Source::sparql("s")).triples([0, 1]).build().unwrap();
        assert!(matches!(
            Planner::default().plan(&q, vec![stranger]),
            Err(PlanError::ForeignUniverse { .. })
        ));
    }

    #[test]
    fn test_single_fragment() {
        let q = query();
        let all = Fragment::builder(&q, "all", Source::sparql("s")).triples([0, 1]).build().unwrap();
        let plan = Planner::default().plan(&q, vec![all]).unwrap();
        assert!(matches!(plan, PlanTree::Leaf(ref f) if f.name() == "all"));
    }
}
