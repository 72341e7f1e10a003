//! # Fragment Deduplication
//!
//! Matching often yields several fragments that answer exactly the same part
//! of the query: the same triples with the same required inputs, from one
//! source or from several mirrors. Searching over all of them would multiply
//! the number of components without producing different plans, so they are
//! collapsed before the search:
//!
//! 1. Group fragments by signature `(matched triples, required inputs)`.
//! 2. Inside a group, compare fragments pairwise with `compare_trees` and drop
//!    the ones dominated by (or equivalent to) another.
//! 3. A group with several survivors becomes one `Union` node.
//!
//! The output order follows the first appearance of each signature, so node
//! indices are deterministic for a given input order.

use crate::bits::Bits;
use crate::fragment::{Fragment, NodeProps};
use crate::plan::PlanTree;
use indexmap::IndexMap;
use tracing::{debug, trace};

/// Outcome of comparing two plan trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TreeRelation {
    /// The trees are not interchangeable.
    Distinct,
    /// The left tree produces everything the right one does with no more inputs.
    LeftDominates,
    RightDominates,
    Equivalent,
}

impl TreeRelation {
    pub fn flip(self) -> Self {
        match self {
            TreeRelation::LeftDominates => TreeRelation::RightDominates,
            TreeRelation::RightDominates => TreeRelation::LeftDominates,
            other => other,
        }
    }
}

/// Compare two trees for interchangeability.
pub fn compare_trees(a: &PlanTree, b: &PlanTree) -> TreeRelation {
    match (a, b) {
        (PlanTree::Empty, PlanTree::Empty) => TreeRelation::Equivalent,
        (PlanTree::Leaf(x), PlanTree::Leaf(y)) => compare_fragments(x, y),
        (PlanTree::Union(x), PlanTree::Union(y)) => compare_alternatives(&x.children, &y.children),
        (PlanTree::Join(x), PlanTree::Join(y)) => {
            let straight = compare_trees(&x.left, &y.left) == TreeRelation::Equivalent
                && compare_trees(&x.right, &y.right) == TreeRelation::Equivalent;
            let crossed = compare_trees(&x.left, &y.right) == TreeRelation::Equivalent
                && compare_trees(&x.right, &y.left) == TreeRelation::Equivalent;
            if straight || crossed {
                TreeRelation::Equivalent
            } else {
                TreeRelation::Distinct
            }
        }
        _ => TreeRelation::Distinct,
    }
}

fn compare_fragments(a: &Fragment, b: &Fragment) -> TreeRelation {
    if a.source() != b.source() || a.props().triples != b.props().triples {
        return TreeRelation::Distinct;
    }
    let (pa, pb) = (a.props(), b.props());
    if pa == pb {
        return TreeRelation::Equivalent;
    }
    if covers(pa, pb) {
        TreeRelation::LeftDominates
    } else if covers(pb, pa) {
        TreeRelation::RightDominates
    } else {
        TreeRelation::Distinct
    }
}

/// `a` produces at least what `b` does and needs no input `b` does not need.
fn covers(a: &NodeProps, b: &NodeProps) -> bool {
    a.result_vars.is_superset(&b.result_vars)
        && a.required_inputs.is_subset(&b.required_inputs)
        && a.optional_inputs.is_subset(&b.optional_inputs)
}

fn compare_alternatives(left: &[PlanTree], right: &[PlanTree]) -> TreeRelation {
    let each_has = |xs: &[PlanTree], ys: &[PlanTree], accept: &dyn Fn(TreeRelation) -> bool| {
        ys.iter()
            .all(|y| xs.iter().any(|x| accept(compare_trees(x, y))))
    };
    let equivalent = |r: TreeRelation| r == TreeRelation::Equivalent;
    let at_least = |r: TreeRelation| matches!(r, TreeRelation::Equivalent | TreeRelation::LeftDominates);

    if each_has(left, right, &equivalent) && each_has(right, left, &equivalent) {
        TreeRelation::Equivalent
    } else if each_has(left, right, &at_least) {
        TreeRelation::LeftDominates
    } else if each_has(right, left, &at_least) {
        TreeRelation::RightDominates
    } else {
        TreeRelation::Distinct
    }
}

/// Collapse structurally equivalent fragments. See the module docs.
pub fn group_nodes(fragments: Vec<Fragment>) -> Vec<PlanTree> {
    let input = fragments.len();
    let mut groups: IndexMap<(Bits, Bits), Vec<PlanTree>> = IndexMap::new();
    for fragment in fragments {
        let signature = (
            fragment.props().triples.clone(),
            fragment.props().required_inputs.clone(),
        );
        groups.entry(signature).or_default().push(PlanTree::leaf(fragment));
    }

    let mut nodes = Vec::with_capacity(groups.len());
    for ((triples, inputs), members) in groups {
        let survivors = drop_dominated(members);
        trace!(
            "signature triples={} inputs={}: {} survivor(s)",
            triples,
            inputs,
            survivors.len()
        );
        nodes.push(PlanTree::union(survivors));
    }
    debug!("Deduplicated {} fragments into {} nodes", input, nodes.len());
    nodes
}

fn drop_dominated(members: Vec<PlanTree>) -> Vec<PlanTree> {
    let mut kept: Vec<PlanTree> = Vec::with_capacity(members.len());
    'members: for candidate in members {
        let mut i = 0;
        while i < kept.len() {
            match compare_trees(&kept[i], &candidate) {
                TreeRelation::Equivalent | TreeRelation::LeftDominates => continue 'members,
                TreeRelation::RightDominates => {
                    kept.remove(i);
                }
                TreeRelation::Distinct => i += 1,
            }
        }
        kept.push(candidate);
    }
    kept
}
