//! # Plan Trees
//!
//! The planner's output and its working currency. A `PlanTree` is a closed
//! variant over four shapes:
//!
//! - `Empty`: the query cannot be answered with the given fragments,
//! - `Leaf`: one fragment,
//! - `Join`: a binary join of two sub-plans on shared variables,
//! - `Union`: alternatives producing the same triples.
//!
//! Inner nodes are reference counted. Cloning a tree clones a pointer, so a
//! sub-plan factored out of several alternative components appears as the same
//! physical node in every branch of the final union (`PlanTree::ptr_eq`).

use crate::bits::Bits;
use crate::fragment::{Fragment, NodeProps};
use crate::join_graph::JoinInfo;
use std::fmt;
use std::sync::{Arc, OnceLock};

#[derive(Debug, Clone)]
pub enum PlanTree {
    Empty,
    Leaf(Arc<Fragment>),
    Join(Arc<JoinNode>),
    Union(Arc<UnionNode>),
}

#[derive(Debug)]
pub struct JoinNode {
    /// Evaluated first; its bindings feed any inputs of `right`.
    pub left: PlanTree,
    pub right: PlanTree,
    /// Variables the two sides are joined on.
    pub join_vars: Bits,
    /// Combined props, with inputs left pending by the join.
    props: NodeProps,
}

impl JoinNode {
    pub fn props(&self) -> &NodeProps {
        &self.props
    }
}

#[derive(Debug)]
pub struct UnionNode {
    /// Alternatives answering the same triples.
    pub children: Vec<PlanTree>,
    props: NodeProps,
}

impl UnionNode {
    pub fn props(&self) -> &NodeProps {
        &self.props
    }
}

fn empty_props() -> &'static NodeProps {
    static EMPTY: OnceLock<NodeProps> = OnceLock::new();
    EMPTY.get_or_init(NodeProps::default)
}

impl PlanTree {
    pub fn leaf(fragment: Fragment) -> Self {
        PlanTree::Leaf(Arc::new(fragment))
    }

    /// Join two sub-plans. `info` must have been computed for this pair
    /// (see `JoinInfo::between`).
    pub fn join(left: PlanTree, right: PlanTree, info: &JoinInfo) -> Self {
        let props = {
            let (l, r) = (left.props(), right.props());
            NodeProps {
                triples: l.triples.union(&r.triples),
                result_vars: l.result_vars.union(&r.result_vars),
                required_inputs: info.pending_required.clone(),
                optional_inputs: info.pending_optional.clone(),
                web_api: l.web_api || r.web_api,
            }
        };
        PlanTree::Join(Arc::new(JoinNode {
            left,
            right,
            join_vars: info.join_vars.clone(),
            props,
        }))
    }

    /// Union of alternatives. Empty children are dropped; a single remaining
    /// child is returned as is.
    pub fn union(children: Vec<PlanTree>) -> Self {
        let mut children: Vec<PlanTree> = children.into_iter().filter(|c| !c.is_empty()).collect();
        match children.len() {
            0 => PlanTree::Empty,
            1 => children.remove(0),
            _ => {
                let mut props = NodeProps::default();
                for child in &children {
                    let p = child.props();
                    props.triples.union_with(&p.triples);
                    props.result_vars.union_with(&p.result_vars);
                    props.required_inputs.union_with(&p.required_inputs);
                    props.optional_inputs.union_with(&p.optional_inputs);
                    props.web_api |= p.web_api;
                }
                PlanTree::Union(Arc::new(UnionNode { children, props }))
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, PlanTree::Empty)
    }

    pub fn props(&self) -> &NodeProps {
        match self {
            PlanTree::Empty => empty_props(),
            PlanTree::Leaf(fragment) => fragment.props(),
            PlanTree::Join(join) => join.props(),
            PlanTree::Union(union) => union.props(),
        }
    }

    /// True when both trees are the same physical node.
    pub fn ptr_eq(&self, other: &PlanTree) -> bool {
        match (self, other) {
            (PlanTree::Empty, PlanTree::Empty) => true,
            (PlanTree::Leaf(a), PlanTree::Leaf(b)) => Arc::ptr_eq(a, b),
            (PlanTree::Join(a), PlanTree::Join(b)) => Arc::ptr_eq(a, b),
            (PlanTree::Union(a), PlanTree::Union(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn children(&self) -> Vec<&PlanTree> {
        match self {
            PlanTree::Empty | PlanTree::Leaf(_) => vec![],
            PlanTree::Join(join) => vec![&join.left, &join.right],
            PlanTree::Union(union) => union.children.iter().collect(),
        }
    }

    /// All fragments below this node, left to right.
    pub fn leaves(&self) -> Vec<&Arc<Fragment>> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a Arc<Fragment>>) {
        match self {
            PlanTree::Empty => {}
            PlanTree::Leaf(fragment) => out.push(fragment),
            _ => {
                for child in self.children() {
                    child.collect_leaves(out);
                }
            }
        }
    }

    /// Pre-order visit of every node, shared nodes once per occurrence.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a PlanTree)) {
        visit(self);
        for child in self.children() {
            child.walk(visit);
        }
    }

    /// Indented multi-line rendering, one node per line.
    pub fn display(&self, indent: usize) -> String {
        let mut out = String::new();
        self.render(indent, &mut out);
        out
    }

    fn render(&self, indent: usize, out: &mut String) {
        let pad = "  ".repeat(indent);
        match self {
            PlanTree::Empty => out.push_str(&format!("{pad}Empty\n")),
            PlanTree::Leaf(fragment) => out.push_str(&format!("{pad}{fragment}\n")),
            PlanTree::Join(join) => {
                out.push_str(&format!("{pad}Join vars={}\n", join.join_vars));
                join.left.render(indent + 1, out);
                join.right.render(indent + 1, out);
            }
            PlanTree::Union(union) => {
                out.push_str(&format!("{pad}Union\n"));
                for child in &union.children {
                    child.render(indent + 1, out);
                }
            }
        }
    }
}

impl fmt::Display for PlanTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display(0))
    }
}

impl From<Fragment> for PlanTree {
    fn from(fragment: Fragment) -> Self {
        PlanTree::leaf(fragment)
    }
}
