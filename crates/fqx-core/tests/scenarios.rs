//! End-to-end planning scenarios.
//!
//! Each test builds a query from triple patterns, matches fragments against
//! it by hand and checks the shape of the plan returned by `Planner::plan`.
//!
//! ## Scenarios
//! - A: one triple, one fragment
//! - B: two triples joined on a shared variable
//! - C: fragments with nothing in common
//! - D: alternative components sharing a sub-plan
//! - E: identical fragments collapsing before the search
//!
//! The remaining tests cover mirrors, bind joins through web APIs, dominated
//! alternatives, cardinality-driven ordering and determinism.

use fqx_core::cardinality::{Cardinality, CardinalityOracle, DefaultJoinEstimator, InMemoryEnsemble};
use fqx_core::dedup::group_nodes;
use fqx_core::{Bits, Fragment, PlanTree, Planner, PlannerConfig, Query, Source, Triple};
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn query(triples: &[(&str, &str, &str)]) -> Query {
    Query::new(triples.iter().map(|(s, p, o)| Triple::parse(s, p, o)).collect::<Vec<_>>())
}

/// `?v0 <p0> ?v1 . ?v1 <p1> ?v2 . ...`
fn chain(n: usize) -> Query {
    Query::new(
        (0..n)
            .map(|i| Triple::parse(&format!("?v{i}"), &format!("<p{i}>"), &format!("?v{}", i + 1)))
            .collect::<Vec<_>>(),
    )
}

fn frag(q: &Query, name: &str, source: &str, triples: &[usize]) -> Fragment {
    Fragment::builder(q, name, Source::sparql(source))
        .triples(triples.iter().copied())
        .build()
        .unwrap()
}

fn leaf_names(tree: &PlanTree) -> Vec<String> {
    let mut names: Vec<String> = tree.leaves().iter().map(|f| f.name().to_string()).collect();
    names.sort();
    names
}

fn branches(tree: &PlanTree) -> Vec<&PlanTree> {
    match tree {
        PlanTree::Union(_) => tree.children(),
        _ => vec![tree],
    }
}

/// The join nodes of `tree` matching exactly `triples`.
fn joins_matching<'a>(tree: &'a PlanTree, triples: &Bits) -> Vec<&'a PlanTree> {
    let mut found = Vec::new();
    tree.walk(&mut |node| {
        if matches!(node, PlanTree::Join(_)) && &node.props().triples == triples {
            found.push(node);
        }
    });
    found
}

// ---------------------------------------------------------------------------
// Scenarios A-E
// ---------------------------------------------------------------------------

#[test]
fn scenario_a_single_fragment() {
    let q = query(&[("?x", "<knows>", "<Bob>")]);
    let plan = Planner::default().plan(&q, vec![frag(&q, "fragment1", "s1", &[0])]).unwrap();
    match &plan {
        PlanTree::Leaf(f) => assert_eq!(f.name(), "fragment1"),
        other => panic!("expected a leaf, got\n{other}"),
    }
}

#[test]
fn scenario_b_two_way_join() {
    let q = query(&[("<Alice>", "<knows>", "?x"), ("?x", "<knows>", "<Bob>")]);
    let plan = Planner::default()
        .plan(&q, vec![frag(&q, "left", "s1", &[0]), frag(&q, "right", "s2", &[1])])
        .unwrap();
    match &plan {
        PlanTree::Join(join) => {
            assert!(matches!(join.left, PlanTree::Leaf(_)));
            assert!(matches!(join.right, PlanTree::Leaf(_)));
            assert_eq!(join.join_vars, Bits::single(q.var_index("x").unwrap()));
        }
        other => panic!("expected a join, got\n{other}"),
    }
    assert_eq!(leaf_names(&plan), vec!["left", "right"]);
}

#[test]
fn scenario_c_nothing_in_common() {
    let q = query(&[("?a", "<p>", "?b"), ("?c", "<q>", "?d")]);
    assert!(!q.is_join_connected());
    let plan = Planner::default()
        .plan(&q, vec![frag(&q, "f0", "s1", &[0]), frag(&q, "f1", "s1", &[1])])
        .unwrap();
    assert!(plan.is_empty());
}

#[test]
fn scenario_d_shared_subplan_is_built_once() {
    let q = chain(5);
    // A and B are the only fragments for t0 and t1; the rest of the chain is
    // covered three different ways
    let fragments = vec![
        frag(&q, "A", "s1", &[0]),
        frag(&q, "B", "s1", &[1]),
        frag(&q, "C", "s1", &[2, 3, 4]),
        frag(&q, "D", "s2", &[2]),
        frag(&q, "E", "s2", &[3]),
        frag(&q, "F", "s2", &[4]),
        frag(&q, "X", "s3", &[2, 3]),
    ];
    let plan = Planner::default().plan(&q, fragments).unwrap();

    let branches = branches(&plan);
    assert_eq!(branches.len(), 3);
    let mut alternatives: Vec<Vec<String>> = branches.iter().map(|b| leaf_names(b)).collect();
    alternatives.sort();
    assert_eq!(
        alternatives,
        vec![
            vec!["A", "B", "C"],
            vec!["A", "B", "D", "E", "F"],
            vec!["A", "B", "F", "X"],
        ]
    );

    let shared_triples: Bits = [0, 1].into_iter().collect();
    let composite = joins_matching(branches[0], &shared_triples);
    assert_eq!(composite.len(), 1);
    for branch in &branches[1..] {
        let found = joins_matching(branch, &shared_triples);
        assert_eq!(found.len(), 1);
        assert!(found[0].ptr_eq(composite[0]));
    }
}

#[test]
fn shared_piece_of_a_split_overlap_is_built_once() {
    let q = chain(5);
    // the two components share A, B and F, but F does not join A or B
    let fragments = vec![
        frag(&q, "A", "s1", &[0]),
        frag(&q, "B", "s1", &[1]),
        frag(&q, "D", "s2", &[2]),
        frag(&q, "E", "s2", &[3]),
        frag(&q, "F", "s2", &[4]),
        frag(&q, "X", "s3", &[2, 3]),
    ];
    let plan = Planner::default().plan(&q, fragments).unwrap();

    let branches = branches(&plan);
    assert_eq!(branches.len(), 2);
    let shared_triples: Bits = [0, 1].into_iter().collect();
    let composite = joins_matching(branches[0], &shared_triples);
    assert_eq!(composite.len(), 1);
    let other = joins_matching(branches[1], &shared_triples);
    assert_eq!(other.len(), 1);
    assert!(other[0].ptr_eq(composite[0]));
}

#[test]
fn scenario_e_identical_fragments_collapse() {
    let q = query(&[("?x", "<knows>", "?y"), ("?y", "<name>", "?n")]);
    let twins = vec![frag(&q, "twin", "s1", &[0]), frag(&q, "twin", "s1", &[0])];
    let nodes = group_nodes(twins.clone());
    assert_eq!(nodes.len(), 1);
    assert!(matches!(nodes[0], PlanTree::Leaf(_)));

    let mut fragments = twins;
    fragments.push(frag(&q, "names", "s1", &[1]));
    let plan = Planner::default().plan(&q, fragments).unwrap();
    assert_eq!(leaf_names(&plan), vec!["names", "twin"]);
}

// ---------------------------------------------------------------------------
// Other shapes
// ---------------------------------------------------------------------------

#[test]
fn mirrors_become_a_union_inside_the_join() {
    let q = query(&[("?x", "<knows>", "?y"), ("?y", "<name>", "?n")]);
    let plan = Planner::default()
        .plan(
            &q,
            vec![
                frag(&q, "knows@a", "a", &[0]),
                frag(&q, "knows@b", "b", &[0]),
                frag(&q, "names", "a", &[1]),
            ],
        )
        .unwrap();
    let PlanTree::Join(join) = &plan else {
        panic!("expected a join, got\n{plan}");
    };
    let union = [&join.left, &join.right]
        .into_iter()
        .find(|side| matches!(side, PlanTree::Union(_)))
        .expect("one side should be a union of mirrors");
    assert_eq!(leaf_names(union), vec!["knows@a", "knows@b"]);
}

#[test]
fn web_api_is_bound_by_its_producer() {
    let q = query(&[("?film", "<title>", "?t"), ("?film", "<rating>", "?r")]);
    let api = Fragment::builder(&q, "ratings", Source::web_api("ratings-api"))
        .triple(1)
        .required_inputs(["?film"])
        .build()
        .unwrap();
    let plan = Planner::default()
        .plan(&q, vec![api, frag(&q, "films", "s1", &[0])])
        .unwrap();
    let PlanTree::Join(join) = &plan else {
        panic!("expected a join, got\n{plan}");
    };
    assert_eq!(join.left.leaves()[0].name(), "films");
    assert_eq!(join.right.leaves()[0].name(), "ratings");
    assert!(!plan.props().has_required_inputs());
    assert!(plan.props().web_api);
}

#[test]
fn lookups_bound_from_both_ends_of_the_chain() {
    // p binds ?x for l1, r binds ?w for l2; l1 and l2 only meet on ?v
    let q = query(&[
        ("?x", "<p>", "?a"),
        ("?x", "<q>", "?v"),
        ("?v", "<r>", "?w"),
        ("?w", "<s>", "?b"),
    ]);
    let lookup = |name: &str, triple: usize, input: &str| {
        Fragment::builder(&q, name, Source::web_api("api"))
            .triple(triple)
            .required_inputs([input])
            .build()
            .unwrap()
    };
    let fragments = vec![
        frag(&q, "p", "s1", &[0]),
        lookup("l1", 1, "x"),
        lookup("l2", 2, "w"),
        frag(&q, "r", "s2", &[3]),
    ];
    let plan = Planner::default().plan(&q, fragments).unwrap();
    assert_eq!(leaf_names(&plan), vec!["l1", "l2", "p", "r"]);
    assert_eq!(plan.props().triples, q.all_triples());
    assert!(!plan.props().has_required_inputs());
}

#[test]
fn unsatisfiable_input_plans_to_empty() {
    let q = query(&[("?film", "<title>", "?t"), ("?film", "<rating>", "?r")]);
    let api = Fragment::builder(&q, "ratings", Source::web_api("ratings-api"))
        .triple(1)
        .required_inputs(["film"])
        .build()
        .unwrap();
    let titles = Fragment::builder(&q, "titles", Source::web_api("titles-api"))
        .triple(0)
        .required_inputs(["film"])
        .build()
        .unwrap();
    assert!(Planner::default().plan(&q, vec![api, titles]).unwrap().is_empty());
}

#[test]
fn dominated_alternative_is_dropped() {
    let q = chain(2);
    // "lookup" answers t0 like "first" but needs ?v1 bound and returns less
    let lookup = Fragment::builder(&q, "lookup", Source::sparql("b"))
        .triple(0)
        .required_inputs(["v1"])
        .build()
        .unwrap();
    let plan = Planner::default()
        .plan(
            &q,
            vec![lookup, frag(&q, "second", "b", &[1]), frag(&q, "first", "b", &[0])],
        )
        .unwrap();
    assert!(matches!(plan, PlanTree::Join(_)), "expected a single join, got\n{plan}");
    assert_eq!(leaf_names(&plan), vec!["first", "second"]);
}

#[test]
fn missing_triple_plans_to_empty() {
    let q = chain(3);
    let plan = Planner::default()
        .plan(&q, vec![frag(&q, "a", "s", &[0]), frag(&q, "c", "s", &[2])])
        .unwrap();
    assert!(plan.is_empty());
}

#[test]
fn cardinalities_drive_the_join_order() {
    let q = query(&[
        ("?p", "<name>", "?n"),
        ("?p", "<email>", "?e"),
        ("?p", "<country>", "<Iceland>"),
    ]);
    let ensemble = InMemoryEnsemble::new()
        .with("names", Cardinality::exact(1_000_000))
        .with("emails", Cardinality::exact(800_000))
        .with("icelanders", Cardinality::exact(300));
    let planner = Planner::new(
        PlannerConfig::default(),
        CardinalityOracle::new(Arc::new(ensemble), Arc::new(DefaultJoinEstimator)),
    );
    let plan = planner
        .plan(
            &q,
            vec![
                frag(&q, "names", "s", &[0]),
                frag(&q, "emails", "s", &[1]),
                frag(&q, "icelanders", "s", &[2]),
            ],
        )
        .unwrap();
    assert_eq!(plan.leaves()[0].name(), "icelanders");
}

#[test]
fn planning_is_deterministic() {
    let q = chain(4);
    let fragments = || {
        vec![
            frag(&q, "a", "s1", &[0]),
            frag(&q, "b", "s1", &[1]),
            frag(&q, "cd", "s1", &[2, 3]),
            frag(&q, "c", "s2", &[2]),
            frag(&q, "d", "s2", &[3]),
            frag(&q, "bc", "s3", &[1, 2]),
        ]
    };
    let planner = Planner::default();
    let first = planner.plan(&q, fragments()).unwrap().to_string();
    for _ in 0..10 {
        assert_eq!(planner.plan(&q, fragments()).unwrap().to_string(), first);
    }
}
