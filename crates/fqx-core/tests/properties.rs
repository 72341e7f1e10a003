//! Property tests over randomly fragmented chain queries.
//!
//! A chain query `?v0 <p0> ?v1 . ?v1 <p1> ?v2 ...` is cut into random
//! contiguous segments served by two SPARQL sources, plus optional web API
//! lookups that need their subject bound. The properties checked:
//!
//! - a plan is empty or covers every triple, and so does each union branch,
//! - when every triple has a fragment on its own, the plan is not empty,
//! - no branch leaves a required input unbound,
//! - a chain of plain fragments and lookups is planned exactly when every
//!   lookup's input is produced by its neighbor,
//! - a lookup whose input nobody else can produce never appears in a plan,
//! - planning the same input twice gives the same plan,
//! - the cardinality comparator is antisymmetric.

use fqx_core::{
    Cardinality, CardinalityComparator, Fragment, PlanTree, Planner, Query, Reliability, Source, Triple,
};
use proptest::prelude::*;
use std::cmp::Ordering;

const MAX_TRIPLES: usize = 6;

#[derive(Debug, Clone)]
struct Segment {
    start: usize,
    len: usize,
    source: u8,
}

#[derive(Debug, Clone)]
struct Case {
    triples: usize,
    segments: Vec<Segment>,
    /// Triples with a web API lookup requiring the triple's subject.
    lookups: Vec<usize>,
    singletons: bool,
}

fn case_strategy() -> impl Strategy<Value = Case> {
    (1usize..=MAX_TRIPLES).prop_flat_map(|triples| {
        let segment = (0..triples, 1usize..=3, 0u8..2).prop_map(move |(start, len, source)| Segment {
            start,
            len: len.min(triples - start),
            source,
        });
        (
            prop::collection::vec(segment, 0..6),
            prop::collection::vec(0..triples, 0..3),
            any::<bool>(),
        )
            .prop_map(move |(segments, lookups, singletons)| Case {
                triples,
                segments,
                lookups,
                singletons,
            })
    })
}

fn chain(n: usize) -> Query {
    Query::new(
        (0..n)
            .map(|i| Triple::parse(&format!("?v{i}"), &format!("<p{i}>"), &format!("?v{}", i + 1)))
            .collect::<Vec<_>>(),
    )
}

fn fragments(q: &Query, case: &Case) -> Vec<Fragment> {
    let mut out = Vec::new();
    if case.singletons {
        for i in 0..case.triples {
            out.push(
                Fragment::builder(q, format!("single{i}"), Source::sparql("s0"))
                    .triple(i)
                    .build()
                    .unwrap(),
            );
        }
    }
    for (n, seg) in case.segments.iter().enumerate() {
        out.push(
            Fragment::builder(q, format!("seg{n}"), Source::sparql(format!("s{}", seg.source)))
                .triples(seg.start..seg.start + seg.len)
                .build()
                .unwrap(),
        );
    }
    for &i in &case.lookups {
        out.push(
            Fragment::builder(q, format!("lookup{i}"), Source::web_api("api"))
                .triple(i)
                .required_inputs([format!("v{i}").as_str()])
                .build()
                .unwrap(),
        );
    }
    out
}

/// How the single fragment for one chain triple is served.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Link {
    Plain,
    /// Web API lookup that needs the triple's subject bound.
    NeedsSubject,
    /// Web API lookup that needs the triple's object bound.
    NeedsObject,
}

fn links_strategy() -> impl Strategy<Value = Vec<Link>> {
    let link = prop_oneof![Just(Link::Plain), Just(Link::NeedsSubject), Just(Link::NeedsObject)];
    prop::collection::vec(link, 1..=MAX_TRIPLES)
}

fn link_fragments(q: &Query, links: &[Link]) -> Vec<Fragment> {
    links
        .iter()
        .enumerate()
        .map(|(i, link)| {
            let builder = match link {
                Link::Plain => Fragment::builder(q, format!("t{i}"), Source::sparql("s")),
                Link::NeedsSubject => Fragment::builder(q, format!("t{i}"), Source::web_api("api"))
                    .required_inputs([format!("v{i}").as_str()]),
                Link::NeedsObject => Fragment::builder(q, format!("t{i}"), Source::web_api("api"))
                    .required_inputs([format!("v{}", i + 1).as_str()]),
            };
            builder.triple(i).build().unwrap()
        })
        .collect()
}

/// True when every lookup's input is produced by the fragment next to it.
fn links_satisfiable(links: &[Link]) -> bool {
    links.iter().enumerate().all(|(i, link)| match link {
        Link::Plain => true,
        Link::NeedsSubject => i > 0 && links[i - 1] != Link::NeedsObject,
        Link::NeedsObject => i + 1 < links.len() && links[i + 1] != Link::NeedsSubject,
    })
}

fn branches(tree: &PlanTree) -> Vec<&PlanTree> {
    match tree {
        PlanTree::Union(_) => tree.children(),
        _ => vec![tree],
    }
}

fn cardinality_strategy() -> impl Strategy<Value = Cardinality> {
    let reliability = prop_oneof![
        Just(Reliability::Unsupported),
        Just(Reliability::NonEmpty),
        Just(Reliability::Guess),
        Just(Reliability::LowerBound),
        Just(Reliability::Exact),
    ];
    (reliability, 0u64..300_000).prop_map(|(r, v)| Cardinality::new(r, v))
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        failure_persistence: None,
        ..ProptestConfig::default()
    })]

    #[test]
    fn plans_cover_every_triple(case in case_strategy()) {
        let q = chain(case.triples);
        let plan = Planner::default().plan(&q, fragments(&q, &case)).unwrap();
        if case.singletons {
            prop_assert!(!plan.is_empty());
        }
        if !plan.is_empty() {
            prop_assert_eq!(&plan.props().triples, &q.all_triples());
            for branch in branches(&plan) {
                prop_assert_eq!(&branch.props().triples, &q.all_triples());
                prop_assert!(!branch.props().has_required_inputs());
            }
        }
    }

    #[test]
    fn lookup_chains_are_planned_when_satisfiable(links in links_strategy()) {
        let q = chain(links.len());
        let plan = Planner::default().plan(&q, link_fragments(&q, &links)).unwrap();
        prop_assert_eq!(plan.is_empty(), !links_satisfiable(&links));
        if !plan.is_empty() {
            prop_assert_eq!(&plan.props().triples, &q.all_triples());
            prop_assert!(!plan.props().has_required_inputs());
        }
    }

    #[test]
    fn lookup_without_producer_is_never_planned(case in case_strategy()) {
        // ?v0 occurs only in t0, so a lookup on t0 needing ?v0 has no producer
        let q = chain(case.triples);
        let mut frags = fragments(&q, &case);
        frags.push(
            Fragment::builder(&q, "orphan", Source::web_api("api"))
                .triple(0)
                .required_inputs(["v0"])
                .build()
                .unwrap(),
        );
        let plan = Planner::default().plan(&q, frags).unwrap();
        prop_assert!(plan.leaves().iter().all(|f| f.name() != "orphan"));
    }

    #[test]
    fn planning_is_deterministic(case in case_strategy()) {
        let q = chain(case.triples);
        let planner = Planner::default();
        let first = planner.plan(&q, fragments(&q, &case)).unwrap().to_string();
        let second = planner.plan(&q, fragments(&q, &case)).unwrap().to_string();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn comparator_is_antisymmetric(a in cardinality_strategy(), b in cardinality_strategy()) {
        let cmp = CardinalityComparator::default();
        prop_assert_eq!(cmp.compare(&a, &b), cmp.compare(&b, &a).reverse());
        prop_assert_eq!(cmp.compare(&a, &a), Ordering::Equal);
    }
}
