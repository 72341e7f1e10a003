//! # Component Search
//!
//! A *component* is a set of join-graph nodes that together answer the whole
//! query: their triples cover every query triple, they are join-connected, and
//! every required input of a member is produced by another member. Each
//! component becomes one branch of the final union.
//!
//! ## How It Works
//!
//! The search is a depth-first walk over *states* `(nodes, vars, triples)`,
//! started once from every node:
//!
//! 1. A state whose triples equal the query's triples is *final*. It is
//!    validated and, if valid, recorded.
//! 2. Any other state is expanded by adding one neighbor of one of its members.
//!    Each neighbor is tried once per expansion, however many members it is
//!    adjacent to.
//!
//! ## Pruning
//!
//! `State::add_node` refuses a successor when the new node
//!
//! - is already a member,
//! - matches a subset or a superset of the triples matched so far,
//! - would make an existing member redundant (its triples covered by the other
//!   members plus the new node),
//! - requires an input that no node of the graph produces.
//!
//! A required input produced somewhere in the graph but not yet by the state
//! is not a reason to refuse: the producer may only be reachable through the
//! node that needs it. Whether every input is bound is checked once the state
//! is final. The redundancy rule still depends on the order nodes are added
//! in, which is why every node is tried as a start.
//!
//! ## Termination
//!
//! The reachable finals of a state depend only on its node set, so node sets
//! already expanded are remembered and skipped. `max_search_states` is a
//! safety valve for pathological inputs.

use crate::bits::Bits;
use crate::config::PlannerConfig;
use crate::join_graph::JoinGraph;
use crate::join_order::JoinOrderPlanner;
use crate::query::Query;
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, trace, warn};

/// One partial component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct State {
    /// Member node indices.
    pub nodes: Bits,
    /// Variables produced by the members.
    pub vars: Bits,
    /// Query triples matched by the members.
    pub triples: Bits,
}

impl State {
    pub fn initial(graph: &JoinGraph, node: u32) -> State {
        let props = graph.props(node);
        State {
            nodes: Bits::single(node),
            vars: props.result_vars.clone(),
            triples: props.triples.clone(),
        }
    }

    /// The successor state with `node` added, or `None` when the pruning rules
    /// reject it.
    pub fn add_node(&self, graph: &JoinGraph, node: u32) -> Option<State> {
        if self.nodes.contains(node) {
            return None;
        }
        let props = graph.props(node);
        if props.triples.is_subset(&self.triples) || props.triples.is_superset(&self.triples) {
            return None;
        }
        if !props.required_inputs.is_subset(graph.produced_vars()) {
            return None;
        }
        // Each existing member must still match a triple nobody else does.
        for member in self.nodes.iter() {
            let mut others = props.triples.clone();
            for other in self.nodes.iter().filter(|&o| o != member) {
                others.union_with(&graph.props(other).triples);
            }
            if graph.props(member).triples.is_subset(&others) {
                return None;
            }
        }

        let mut next = self.clone();
        next.nodes.insert(node);
        next.vars.union_with(&props.result_vars);
        next.triples.union_with(&props.triples);
        Some(next)
    }
}

/// Finds every valid component of `query` over the nodes of `graph`.
pub struct ComponentSearch<'a> {
    query: &'a Query,
    graph: &'a JoinGraph,
    join_order: &'a JoinOrderPlanner,
    config: &'a PlannerConfig,
    /// Number of states expanded so far.
    pub states: usize,
}

impl<'a> ComponentSearch<'a> {
    pub fn new(
        query: &'a Query,
        graph: &'a JoinGraph,
        join_order: &'a JoinOrderPlanner,
        config: &'a PlannerConfig,
    ) -> Self {
        Self {
            query,
            graph,
            join_order,
            config,
            states: 0,
        }
    }

    pub fn run(&mut self) -> BTreeSet<Bits> {
        let all_triples = self.query.all_triples();
        let mut components = BTreeSet::new();
        let mut seen: HashSet<Bits> = HashSet::new();
        debug!(
            "Starting component search over {} nodes for {} triples",
            self.graph.len(),
            all_triples.len()
        );

        for start in 0..self.graph.len() as u32 {
            let mut stack = vec![State::initial(self.graph, start)];
            while let Some(state) = stack.pop() {
                // Step 1: skip node sets already expanded from an earlier start.
                if !seen.insert(state.nodes.clone()) {
                    continue;
                }
                self.states += 1;
                if self.states > self.config.max_search_states {
                    warn!(
                        "Component search stopped after {} states; {} component(s) found so far",
                        self.config.max_search_states,
                        components.len()
                    );
                    return components;
                }

                // Step 2: a state covering every triple is final.
                if state.triples == all_triples {
                    if self.is_valid(&state) {
                        trace!("component {}", state.nodes);
                        components.insert(state.nodes);
                    } else {
                        trace!("rejected final state {}", state.nodes);
                    }
                    continue;
                }

                // Step 3: expand by one neighbor, each neighbor once per step.
                let mut visited = Bits::new();
                for member in state.nodes.iter() {
                    for &next in self.graph.neighbors(member) {
                        if !visited.insert(next) {
                            continue;
                        }
                        if let Some(successor) = state.add_node(self.graph, next) {
                            if !seen.contains(&successor.nodes) {
                                stack.push(successor);
                            }
                        }
                    }
                }
            }
        }

        debug!(
            "Component search complete: {} component(s), {} states",
            components.len(),
            self.states
        );
        components
    }

    fn is_valid(&self, state: &State) -> bool {
        if state.nodes.is_empty() {
            return false;
        }
        // Every required input is produced by another member.
        for member in state.nodes.iter() {
            let required = &self.graph.props(member).required_inputs;
            if required.is_empty() {
                continue;
            }
            let mut produced = Bits::new();
            for other in state.nodes.iter().filter(|&o| o != member) {
                produced.union_with(&self.graph.props(other).result_vars);
            }
            if !required.is_subset(&produced) {
                return false;
            }
        }
        if !self.config.validate_components {
            return true;
        }
        // The join orderer must be able to bind every input too.
        match self.join_order.plan(self.graph, &state.nodes) {
            Ok(tree) => !tree.is_empty() && !tree.props().has_required_inputs(),
            Err(err) => {
                trace!("dry run for {} failed: {}", state.nodes, err);
                false
            }
        }
    }
}

/// Run a `ComponentSearch` to completion.
pub fn find_components(
    query: &Query,
    graph: &JoinGraph,
    join_order: &JoinOrderPlanner,
    config: &PlannerConfig,
) -> BTreeSet<Bits> {
    ComponentSearch::new(query, graph, join_order, config).run()
}
