//! # Join Order Planning
//!
//! Turns one join-connected set of graph nodes into a join tree. The planner
//! is greedy rather than exhaustive: components are small, but there can be
//! many of them, and the estimates it works from are rough anyway.
//!
//! ## Algorithm
//!
//! 1. A single node is returned as is.
//! 2. **Seed**: among all joinable pairs, pick the one with the smallest
//!    `OrderKey`. The node that is better on its own becomes the left child.
//! 3. **Grow**: repeatedly join the remaining node whose key against the
//!    current root is smallest. Only the root is considered as a join partner,
//!    which makes the result left-deep above the seed.
//!
//! ## Order keys
//!
//! `OrderKey = (cardinality, pending required inputs, is web API)`, compared
//! lexicographically. Cardinalities use `CardinalityComparator`. A join that
//! leaves required inputs unbound is penalised with
//! `Cardinality::with_pending_inputs`, since the unbound side will be queried
//! once per incoming binding. Remaining ties go to the lowest node index, which
//! keeps the result deterministic.

use crate::bits::Bits;
use crate::cardinality::{Cardinality, CardinalityComparator, CardinalityOracle};
use crate::error::{PlanError, PlanResult};
use crate::fragment::NodeProps;
use crate::join_graph::{JoinGraph, JoinInfo};
use crate::plan::PlanTree;
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderKey {
    /// Estimated size, penalised when inputs stay unbound.
    pub cardinality: Cardinality,
    /// Required inputs still unbound.
    pub pending_inputs: usize,
    /// Web API calls sort after endpoint queries.
    pub web_api: bool,
}

#[derive(Debug, Clone, Default)]
pub struct JoinOrderPlanner {
    oracle: CardinalityOracle,
    comparator: CardinalityComparator,
}

impl JoinOrderPlanner {
    pub fn new(oracle: CardinalityOracle, comparator: CardinalityComparator) -> Self {
        Self { oracle, comparator }
    }

    pub fn oracle(&self) -> &CardinalityOracle {
        &self.oracle
    }

    pub fn compare_keys(&self, a: &OrderKey, b: &OrderKey) -> Ordering {
        self.comparator
            .compare(&a.cardinality, &b.cardinality)
            .then(a.pending_inputs.cmp(&b.pending_inputs))
            .then(a.web_api.cmp(&b.web_api))
    }

    fn node_key(&self, cardinality: Cardinality, props: &NodeProps) -> OrderKey {
        OrderKey {
            cardinality,
            pending_inputs: props.required_inputs.len(),
            web_api: props.web_api,
        }
    }

    fn join_key(&self, info: &JoinInfo, estimate: Cardinality, web_api: bool) -> OrderKey {
        let cardinality = if info.has_pending_required() {
            estimate.with_pending_inputs()
        } else {
            estimate
        };
        OrderKey {
            cardinality,
            pending_inputs: info.pending_required.len(),
            web_api,
        }
    }

    /// Build a join tree over `subset`. The subset must be non-empty and
    /// join-connected in `graph`.
    pub fn plan(&self, graph: &JoinGraph, subset: &Bits) -> PlanResult<PlanTree> {
        let members: Vec<u32> = subset.iter().collect();
        match members.as_slice() {
            [] => return Err(PlanError::EmptySubset),
            [only] => return Ok(graph.node(*only).clone()),
            _ => {}
        }
        let not_connected = || PlanError::NotJoinConnected {
            subset: subset.clone(),
        };

        // Step 1: estimate every member once.
        let cards: HashMap<u32, Cardinality> = members
            .iter()
            .map(|&m| (m, self.oracle.estimate_tree(graph.node(m))))
            .collect();

        // Step 2: seed with the cheapest joinable pair. Only a strictly smaller
        // key replaces the current best, so ties keep the lowest indices.
        let mut seed: Option<(OrderKey, Cardinality, u32, u32)> = None;
        for (i, &a) in members.iter().enumerate() {
            for &b in &members[i + 1..] {
                let Some(info) = graph.join_info(a, b) else {
                    continue;
                };
                let estimate = self.oracle.join(info, cards[&a], cards[&b]);
                let web_api = graph.props(a).web_api || graph.props(b).web_api;
                let key = self.join_key(info, estimate, web_api);
                let better = seed
                    .as_ref()
                    .map_or(true, |(best, ..)| self.compare_keys(&key, best) == Ordering::Less);
                if better {
                    seed = Some((key, estimate, a, b));
                }
            }
        }
        let (seed_key, mut root_card, a, b) = seed.ok_or_else(not_connected)?;

        // The side that is cheaper on its own goes left.
        let key_a = self.node_key(cards[&a], graph.props(a));
        let key_b = self.node_key(cards[&b], graph.props(b));
        let (left, right) = if self.compare_keys(&key_b, &key_a) == Ordering::Less {
            (b, a)
        } else {
            (a, b)
        };
        let info = graph.join_info(a, b).ok_or_else(not_connected)?;
        let mut root = PlanTree::join(graph.node(left).clone(), graph.node(right).clone(), info);
        trace!("seed join {} + {} with key {:?}", left, right, seed_key);

        // Step 3: grow the tree one node at a time against the current root.
        let mut remaining: Vec<u32> = members.into_iter().filter(|&m| m != a && m != b).collect();
        while !remaining.is_empty() {
            let mut best: Option<(OrderKey, Cardinality, usize, JoinInfo)> = None;
            for (pos, &r) in remaining.iter().enumerate() {
                let props = graph.props(r);
                // The root is a composite, so there is no cached edge to it.
                let info = JoinInfo::between(root.props(), props);
                if info.join_vars.is_empty() {
                    continue;
                }
                let estimate = self.oracle.join(&info, root_card, cards[&r]);
                let key = self.join_key(&info, estimate, props.web_api);
                let better = best
                    .as_ref()
                    .map_or(true, |(k, ..)| self.compare_keys(&key, k) == Ordering::Less);
                if better {
                    best = Some((key, estimate, pos, info));
                }
            }
            // Nothing left joins the root: the subset was not connected.
            let (key, estimate, pos, info) = best.ok_or_else(not_connected)?;
            let next = remaining.remove(pos);
            trace!("join {} onto root with key {:?}", next, key);
            root = PlanTree::join(root, graph.node(next).clone(), &info);
            root_card = estimate;
        }
        Ok(root)
    }
}
