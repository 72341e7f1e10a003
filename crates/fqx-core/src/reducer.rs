//! # Component Reduction
//!
//! Runs between the component search and join ordering when more than one
//! component was found.
//!
//! 1. `remove_alternative_components` drops components that are only
//!    alternative spellings of another one: the same number of fragments, each
//!    matching the same triples as a fragment of the other.
//! 2. `find_common_subsets` finds join-connected groups of nodes shared by
//!    several components.
//! 3. `replace_shared` plans every shared group once and swaps it into the
//!    components as a single composite node, so the final union evaluates it
//!    once.

use crate::bits::Bits;
use crate::dedup::{compare_trees, TreeRelation};
use crate::error::PlanResult;
use crate::join_graph::JoinGraph;
use crate::join_order::JoinOrderPlanner;
use tracing::{debug, trace};

/// Pairs each node of `a` with an unused node of `b` matching the same
/// triples. `None` when some node has no partner.
fn map_by_triples(graph: &JoinGraph, a: &Bits, b: &Bits) -> Option<Vec<(u32, u32)>> {
    let mut used = Bits::new();
    let mut pairs = Vec::with_capacity(a.len());
    for x in a.iter() {
        let triples = &graph.props(x).triples;
        let partner = b
            .iter()
            .find(|&y| !used.contains(y) && &graph.props(y).triples == triples)?;
        used.insert(partner);
        pairs.push((x, partner));
    }
    Some(pairs)
}

pub fn remove_alternative_components(mut components: Vec<Bits>, graph: &JoinGraph) -> Vec<Bits> {
    components.sort();
    components.dedup();
    let n = components.len();
    let mut removed = vec![false; n];

    // Step 1: a strict superset of another component adds nothing.
    for i in 0..n {
        for j in 0..n {
            if i != j && components[j].is_subset(&components[i]) && components[j] != components[i] {
                trace!("component {} contains {}", components[i], components[j]);
                removed[i] = true;
            }
        }
    }

    // Step 2: of two same-sized components whose fragments pair up by triples,
    // keep the one whose fragments dominate more often.
    for i in 0..n {
        for j in i + 1..n {
            if removed[i] || removed[j] || components[i].len() != components[j].len() {
                continue;
            }
            let Some(pairs) = map_by_triples(graph, &components[i], &components[j]) else {
                continue;
            };
            let (mut score_i, mut score_j) = (0usize, 0usize);
            for (x, y) in pairs {
                match compare_trees(graph.node(x), graph.node(y)) {
                    TreeRelation::LeftDominates => score_i += 1,
                    TreeRelation::RightDominates => score_j += 1,
                    TreeRelation::Equivalent | TreeRelation::Distinct => {}
                }
            }
            let drop = if score_j > score_i { i } else { j };
            trace!(
                "components {} and {} are alternatives, dropping {}",
                components[i],
                components[j],
                components[drop]
            );
            removed[drop] = true;
        }
    }

    let before = components.len();
    let kept: Vec<Bits> = components
        .into_iter()
        .zip(removed)
        .filter_map(|(c, gone)| (!gone).then_some(c))
        .collect();
    debug!("Kept {} of {} components after removing alternatives", kept.len(), before);
    kept
}

/// How an overlap between an accepted subset and a new candidate is settled.
/// `None` drops the subset.
fn resolve_overlap(graph: &JoinGraph, accepted: &Bits, candidate: &Bits) -> (Option<Bits>, Option<Bits>) {
    let keeps_shape = |bits: &Bits| bits.len() > 1 && graph.is_connected(bits);
    let accepted_is_larger = accepted.len() >= candidate.len();
    let (large, small) = if accepted_is_larger {
        (accepted, candidate)
    } else {
        (candidate, accepted)
    };

    // Prefer trimming the smaller side; fall back to trimming the larger one,
    // and drop the smaller side when neither trimmed set stays joinable.
    let small_rest = small.difference(large);
    let (large, small) = if keeps_shape(&small_rest) {
        (Some(large.clone()), Some(small_rest))
    } else {
        let large_rest = large.difference(small);
        if keeps_shape(&large_rest) {
            (Some(large_rest), Some(small.clone()))
        } else {
            (Some(large.clone()), None)
        }
    };
    if accepted_is_larger {
        (large, small)
    } else {
        (small, large)
    }
}

/// Adds `candidate` to `accepted`, settling overlaps with subsets accepted
/// earlier so that all of them stay disjoint.
fn accept_candidate(graph: &JoinGraph, accepted: &mut Vec<Bits>, mut candidate: Bits) {
    let mut k = 0;
    while k < accepted.len() {
        if !accepted[k].intersects(&candidate) {
            k += 1;
            continue;
        }
        let (old, new) = resolve_overlap(graph, &accepted[k], &candidate);
        // The accepted subset is either trimmed in place or dropped.
        match old {
            Some(bits) => {
                accepted[k] = bits;
                k += 1;
            }
            None => {
                accepted.remove(k);
            }
        }
        // A trimmed candidate still has to be checked against the rest.
        match new {
            Some(bits) => candidate = bits,
            None => return,
        }
    }
    accepted.push(candidate);
}

/// Node sets shared by at least two components, pairwise disjoint, each
/// join-connected with two or more nodes.
pub fn find_common_subsets(components: &[Bits], graph: &JoinGraph) -> Vec<Bits> {
    let mut accepted: Vec<Bits> = Vec::new();
    for (i, a) in components.iter().enumerate() {
        for b in &components[i + 1..] {
            // An intersection may fall apart into several pieces; each piece
            // with a join in it is shared work of its own.
            for piece in graph.connected_pieces(&a.intersection(b)) {
                if piece.len() < 2 || accepted.contains(&piece) {
                    continue;
                }
                trace!("candidate shared subset {}", piece);
                accept_candidate(graph, &mut accepted, piece);
            }
        }
    }

    debug_assert!(accepted.iter().all(|s| s.len() >= 2));
    debug_assert!(accepted
        .iter()
        .enumerate()
        .all(|(i, s)| accepted[i + 1..].iter().all(|t| !s.intersects(t))));
    debug!("Found {} shared subset(s)", accepted.len());
    accepted
}

/// Plans each shared subset once, adds it to the graph as a composite node and
/// rewrites the components that contain it.
pub fn replace_shared(
    mut components: Vec<Bits>,
    shared: &[Bits],
    graph: &mut JoinGraph,
    join_order: &JoinOrderPlanner,
) -> PlanResult<Vec<Bits>> {
    for subset in shared {
        let tree = join_order.plan(graph, subset)?;
        let index = graph.add_node(tree);
        trace!("shared subset {} planned as node {}", subset, index);
        for component in components.iter_mut() {
            if subset.is_subset(component) {
                component.difference_with(subset);
                component.insert(index);
            }
        }
    }
    graph.notify_added_nodes();

    let mut unique: Vec<Bits> = Vec::with_capacity(components.len());
    for component in components {
        if !unique.contains(&component) {
            unique.push(component);
        }
    }
    Ok(unique)
}
