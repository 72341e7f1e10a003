//! # Join Graph
//!
//! Nodes are the deduplicated fragments of one `plan()` call (plus composite
//! sub-plans added by the reducer); an edge connects two nodes when they can be
//! joined. Each edge carries the `JoinInfo` describing the join.
//!
//! ## Joinability
//!
//! Two nodes join on the variables they share, except those both sides
//! require as input: neither side can bind such a variable for the other. A
//! join is also rejected when one side's triples contain the other's: the
//! smaller side adds no information.
//!
//! ## Caching
//!
//! Edges are computed once and owned by the graph. Nodes appended with
//! `add_node` have no edges until `notify_added_nodes` is called; the reducer
//! calls it once after inserting all composites.

use crate::bits::Bits;
use crate::fragment::NodeProps;
use crate::plan::PlanTree;
use std::collections::{HashMap, VecDeque};
use tracing::trace;

/// How two nodes join, and which inputs stay unbound afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinInfo {
    pub join_vars: Bits,
    /// Required inputs of either side not produced by the other.
    pub pending_required: Bits,
    /// Optional inputs of either side not produced by the other.
    pub pending_optional: Bits,
    pub valid: bool,
}

impl JoinInfo {
    pub fn between(a: &NodeProps, b: &NodeProps) -> JoinInfo {
        let both_required = a.required_inputs.intersection(&b.required_inputs);
        let join_vars = a
            .public_vars()
            .intersection(&b.public_vars())
            .difference(&both_required);

        let pending_required = a
            .required_inputs
            .difference(&b.result_vars)
            .union(&b.required_inputs.difference(&a.result_vars));
        let pending_optional = a
            .optional_inputs
            .difference(&b.result_vars)
            .union(&b.optional_inputs.difference(&a.result_vars));

        let subsumed = a.triples.is_superset(&b.triples) || b.triples.is_superset(&a.triples);
        let valid = !join_vars.is_empty() && !subsumed;

        JoinInfo {
            join_vars,
            pending_required,
            pending_optional,
            valid,
        }
    }

    pub fn has_pending_required(&self) -> bool {
        !self.pending_required.is_empty()
    }
}

fn edge_key(a: u32, b: u32) -> (u32, u32) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[derive(Debug, Default)]
pub struct JoinGraph {
    nodes: Vec<PlanTree>,
    edges: HashMap<(u32, u32), JoinInfo>,
    adjacency: Vec<Vec<u32>>,
    /// Union of the result variables of every node.
    produced: Bits,
    /// Nodes at or after this index have no edges yet.
    pending_from: usize,
}

impl JoinGraph {
    pub fn build(nodes: Vec<PlanTree>) -> Self {
        let mut graph = JoinGraph::default();
        for node in nodes {
            graph.add_node(node);
        }
        graph.notify_added_nodes();
        graph
    }

    /// Append a node without computing its edges.
    pub fn add_node(&mut self, node: PlanTree) -> u32 {
        self.produced.union_with(&node.props().result_vars);
        self.nodes.push(node);
        self.adjacency.push(Vec::new());
        (self.nodes.len() - 1) as u32
    }

    /// Compute the edges of every node appended since the last call.
    pub fn notify_added_nodes(&mut self) {
        let start = self.pending_from;
        for i in start..self.nodes.len() {
            for j in 0..i {
                let info = JoinInfo::between(self.nodes[j].props(), self.nodes[i].props());
                if info.valid {
                    trace!("edge {} -- {} on {}", j, i, info.join_vars);
                    self.adjacency[i].push(j as u32);
                    self.adjacency[j].push(i as u32);
                    self.edges.insert(edge_key(j as u32, i as u32), info);
                }
            }
        }
        for list in &mut self.adjacency {
            list.sort_unstable();
        }
        self.pending_from = self.nodes.len();
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, index: u32) -> &PlanTree {
        &self.nodes[index as usize]
    }

    pub fn nodes(&self) -> &[PlanTree] {
        &self.nodes
    }

    pub fn props(&self, index: u32) -> &NodeProps {
        self.nodes[index as usize].props()
    }

    /// Variables produced by at least one node.
    pub fn produced_vars(&self) -> &Bits {
        &self.produced
    }

    /// The edge between `a` and `b`, if they can be joined.
    pub fn join_info(&self, a: u32, b: u32) -> Option<&JoinInfo> {
        self.edges.get(&edge_key(a, b))
    }

    /// Neighbors of `index` in ascending order.
    pub fn neighbors(&self, index: u32) -> &[u32] {
        debug_assert!(
            (index as usize) < self.pending_from,
            "edges of node {index} requested before notify_added_nodes"
        );
        &self.adjacency[index as usize]
    }

    pub fn for_each_neighbor(&self, index: u32, mut visitor: impl FnMut(u32, &JoinInfo)) {
        for &other in self.neighbors(index) {
            if let Some(info) = self.join_info(index, other) {
                visitor(other, info);
            }
        }
    }

    /// True when the nodes of `subset` form one connected piece of the graph.
    /// The empty set is not connected.
    pub fn is_connected(&self, subset: &Bits) -> bool {
        match subset.first() {
            Some(start) => self.reach_within(subset, start).len() == subset.len(),
            None => false,
        }
    }

    /// Splits `subset` into its connected pieces, ordered by smallest member.
    pub fn connected_pieces(&self, subset: &Bits) -> Vec<Bits> {
        let mut rest = subset.clone();
        let mut pieces = Vec::new();
        while let Some(start) = rest.first() {
            let piece = self.reach_within(subset, start);
            rest.difference_with(&piece);
            pieces.push(piece);
        }
        pieces
    }

    /// Nodes of `subset` reachable from `start` without leaving `subset`.
    fn reach_within(&self, subset: &Bits, start: u32) -> Bits {
        let mut reached = Bits::single(start);
        let mut queue = VecDeque::from([start]);
        while let Some(current) = queue.pop_front() {
            for &next in self.neighbors(current) {
                if subset.contains(next) && reached.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        reached
    }
}
