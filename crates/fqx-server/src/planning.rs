//! # Planning Endpoint
//!
//! JSON protocol for `POST /plan`. The caller has already matched the query
//! against its sources; the request carries the query's triple patterns and
//! the matched fragments, each pointing at the triples it answers by index.
//! Per-fragment cardinality estimates are optional and feed an
//! `InMemoryEnsemble` built for the request.
//!
//! ## Wire Protocol
//!
//! - Request: `PlanRequest`. Terms are written `?x` (variable), `<iri>` or as
//!   a bare literal. Variable names in fragments may omit the leading `?`.
//! - Response: `PlanResponse` with the plan as a tagged tree of `PlanNode`s.
//!   A shared sub-plan is serialized once per branch it occurs in.
//!
//! Fragments referencing unknown triples or variables are rejected with 400.
//! A query the fragments cannot answer is not an error: the response has
//! `empty: true`.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use fqx_core::cardinality::{CardinalityOracle, DefaultJoinEstimator, InMemoryEnsemble};
use fqx_core::{Cardinality, Fragment, PlanTree, Planner, PlannerConfig, Query, Source, Triple};

use crate::state::AppState;

// ---------------------------------------------------------------------------
// JSON wire-protocol types
// ---------------------------------------------------------------------------

/// Request body for `POST /plan`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanRequest {
    /// Triple patterns as `[subject, predicate, object]`.
    pub triples: Vec<[String; 3]>,
    pub fragments: Vec<FragmentInfo>,
}

/// A fragment matched by one source.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FragmentInfo {
    pub name: String,
    /// Name of the source answering the fragment.
    pub source: String,
    /// The source is a web API rather than a SPARQL endpoint.
    #[serde(default)]
    pub web_api: bool,
    /// Indices into `PlanRequest.triples`.
    pub triples: Vec<usize>,
    /// Defaults to every variable of the matched triples.
    #[serde(default)]
    pub result_vars: Option<Vec<String>>,
    #[serde(default)]
    pub required_inputs: Vec<String>,
    #[serde(default)]
    pub optional_inputs: Vec<String>,
    #[serde(default)]
    pub cardinality: Option<Cardinality>,
}

/// Response body for `POST /plan`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanResponse {
    pub empty: bool,
    pub tree: PlanNode,
}

/// A node of the returned plan.
#[derive(Debug, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PlanNode {
    Empty,
    Fragment {
        name: String,
        source: String,
        #[serde(rename = "webApi")]
        web_api: bool,
        triples: Vec<u32>,
    },
    Join {
        #[serde(rename = "joinVars")]
        join_vars: Vec<String>,
        left: Box<PlanNode>,
        right: Box<PlanNode>,
    },
    Union {
        children: Vec<PlanNode>,
    },
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

/// POST /plan
pub async fn plan_query(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PlanRequest>,
) -> Result<Json<PlanResponse>, (StatusCode, String)> {
    run_planner(&state.config.planner, &req).map(Json)
}

/// Build the query and fragments from `req` and plan them.
pub fn run_planner(config: &PlannerConfig, req: &PlanRequest) -> Result<PlanResponse, (StatusCode, String)> {
    let query = build_query(req);
    let (fragments, ensemble) = build_fragments(&query, &req.fragments)?;
    debug!(
        "Planning {} triples over {} fragments",
        query.triples().len(),
        fragments.len()
    );

    let oracle = CardinalityOracle::new(Arc::new(ensemble), Arc::new(DefaultJoinEstimator));
    let planner = Planner::new(config.clone(), oracle);
    let tree = planner.plan(&query, fragments).map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Planning failed: {}", e),
        )
    })?;

    Ok(PlanResponse {
        empty: tree.is_empty(),
        tree: to_node(&query, &tree),
    })
}

// ---------------------------------------------------------------------------
// Request conversion
// ---------------------------------------------------------------------------

fn build_query(req: &PlanRequest) -> Query {
    Query::new(
        req.triples
            .iter()
            .map(|[s, p, o]| Triple::parse(s, p, o))
            .collect::<Vec<_>>(),
    )
}

fn build_fragments(
    query: &Query,
    infos: &[FragmentInfo],
) -> Result<(Vec<Fragment>, InMemoryEnsemble), (StatusCode, String)> {
    let mut fragments = Vec::with_capacity(infos.len());
    let mut ensemble = InMemoryEnsemble::new();

    for info in infos {
        let source = if info.web_api {
            Source::web_api(&info.source)
        } else {
            Source::sparql(&info.source)
        };
        let mut builder = Fragment::builder(query, &info.name, source)
            .triples(info.triples.iter().copied())
            .required_inputs(info.required_inputs.iter().map(String::as_str))
            .optional_inputs(info.optional_inputs.iter().map(String::as_str));
        if let Some(vars) = &info.result_vars {
            builder = builder.result_vars(vars.iter().map(String::as_str));
        }
        let fragment = builder.build().map_err(|e| {
            (
                StatusCode::BAD_REQUEST,
                format!("Invalid fragment '{}': {}", info.name, e),
            )
        })?;

        if let Some(c) = info.cardinality {
            ensemble.insert(&info.name, Cardinality::new(c.reliability, c.value));
        }
        fragments.push(fragment);
    }
    Ok((fragments, ensemble))
}

// ---------------------------------------------------------------------------
// Response conversion
// ---------------------------------------------------------------------------

fn to_node(query: &Query, tree: &PlanTree) -> PlanNode {
    match tree {
        PlanTree::Empty => PlanNode::Empty,
        PlanTree::Leaf(fragment) => PlanNode::Fragment {
            name: fragment.name().to_string(),
            source: fragment.source().name.clone(),
            web_api: fragment.is_web_api(),
            triples: fragment.props().triples.iter().collect(),
        },
        PlanTree::Join(join) => PlanNode::Join {
            join_vars: query.vars().items_of(&join.join_vars).cloned().collect(),
            left: Box::new(to_node(query, &join.left)),
            right: Box::new(to_node(query, &join.right)),
        },
        PlanTree::Union(union) => PlanNode::Union {
            children: union.children.iter().map(|c| to_node(query, c)).collect(),
        },
    }
}
