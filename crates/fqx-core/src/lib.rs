//! # fqx-core: Federated Query Decomposition
//!
//! Plans a conjunctive query (a set of triple patterns) over *fragments*: the
//! pieces of the query that individual sources can answer. The result is a
//! `PlanTree` of joins and unions over fragments, or `Empty` when the sources
//! cannot answer the query together.
//!
//! ## Module Overview
//!
//! - **`bits`**: Compact index sets used for triples, variables and graph nodes.
//! - **`universe`**: Per-query index universes (`IndexedSet`, `UniverseId`).
//! - **`query`**: Terms, triple patterns and the `Query` itself.
//! - **`fragment`**: Matched fragments, their sources and `NodeProps`.
//! - **`plan`**: The `PlanTree` output type.
//! - **`cardinality`**: Estimates, the comparison rule and the estimator traits.
//! - **`dedup`**: Collapsing equivalent fragments before the search.
//! - **`join_graph`**: Joinability between nodes, with cached edges.
//! - **`search`**: Depth-first search for covering components.
//! - **`reducer`**: Alternative elimination and shared sub-plan factoring.
//! - **`join_order`**: Greedy join ordering inside one component.
//! - **`planner`**: The `Planner` tying the pipeline together.
//! - **`config`**: `PlannerConfig`.
//! - **`error`**: `PlanError`.

pub mod bits;
pub mod cardinality;
pub mod config;
pub mod dedup;
pub mod error;
pub mod fragment;
pub mod join_graph;
pub mod join_order;
pub mod plan;
pub mod planner;
pub mod query;
pub mod reducer;
pub mod search;
pub mod universe;

pub use bits::Bits;
pub use cardinality::{
    Cardinality, CardinalityComparator, CardinalityEnsemble, CardinalityOracle, DefaultJoinEstimator,
    InMemoryEnsemble, JoinCardinalityEstimator, Reliability,
};
pub use config::PlannerConfig;
pub use error::{PlanError, PlanResult};
pub use fragment::{Fragment, NodeProps, Source, SourceKind};
pub use plan::PlanTree;
pub use planner::Planner;
pub use query::{Query, Term, Triple};
