//! # Fragments
//!
//! A fragment is a piece of the query that one data source can answer on its
//! own. The matching stage (outside this crate) decides which triples each
//! source matches; the planner only sees the result as bitsets over the
//! query's universes:
//!
//! - `triples`: the query triples the fragment answers,
//! - `result_vars`: variables the fragment produces,
//! - `required_inputs`: variables that must be bound before the source can be
//!   queried (e.g. path parameters of a web API),
//! - `optional_inputs`: variables the source accepts as bindings if available.
//!
//! A variable is either produced or required, never both: required inputs are
//! removed from the result variables when a fragment is built.

use crate::bits::Bits;
use crate::error::{PlanError, PlanResult};
use crate::query::Query;
use crate::universe::UniverseId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Capability marker of a source. Only used as a join-order tie-break.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceKind {
    #[default]
    Sparql,
    /// A remote web API, typically slow and rate limited.
    WebApi,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Source {
    pub name: String,
    pub kind: SourceKind,
}

impl Source {
    pub fn sparql(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: SourceKind::Sparql,
        }
    }

    pub fn web_api(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: SourceKind::WebApi,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// The planning-relevant properties shared by fragments and every plan node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NodeProps {
    pub triples: Bits,
    pub result_vars: Bits,
    pub required_inputs: Bits,
    pub optional_inputs: Bits,
    /// True if some source below this node is a web API.
    pub web_api: bool,
}

impl NodeProps {
    /// Every variable the node mentions: produced, required or accepted.
    pub fn public_vars(&self) -> Bits {
        self.result_vars
            .union(&self.required_inputs)
            .union(&self.optional_inputs)
    }

    pub fn has_required_inputs(&self) -> bool {
        !self.required_inputs.is_empty()
    }
}

/// A sub-query bound to one source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fragment {
    name: String,
    source: Source,
    universe: UniverseId,
    props: NodeProps,
}

impl Fragment {
    /// Start building a fragment over `query`'s universes.
    pub fn builder<'q>(query: &'q Query, name: impl Into<String>, source: Source) -> FragmentBuilder<'q> {
        FragmentBuilder {
            query,
            name: name.into(),
            source,
            triples: Bits::new(),
            result_vars: None,
            required_inputs: Bits::new(),
            optional_inputs: Bits::new(),
            error: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn universe(&self) -> UniverseId {
        self.universe
    }

    pub fn props(&self) -> &NodeProps {
        &self.props
    }

    pub fn is_web_api(&self) -> bool {
        self.source.kind == SourceKind::WebApi
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{} triples={}", self.name, self.source, self.props.triples)?;
        if !self.props.required_inputs.is_empty() {
            write!(f, " in={}", self.props.required_inputs)?;
        }
        Ok(())
    }
}

/// Builder for `Fragment`; see `Fragment::builder`.
///
/// Result variables default to every variable of the matched triples that is
/// not a required input.
pub struct FragmentBuilder<'q> {
    query: &'q Query,
    name: String,
    source: Source,
    triples: Bits,
    result_vars: Option<Bits>,
    required_inputs: Bits,
    optional_inputs: Bits,
    error: Option<PlanError>,
}

impl<'q> FragmentBuilder<'q> {
    /// Mark the query triple at `index` as matched.
    pub fn triple(mut self, index: usize) -> Self {
        if index < self.query.triples().len() {
            self.triples.insert(index as u32);
        } else {
            self.error.get_or_insert(PlanError::UnknownTriple(index));
        }
        self
    }

    pub fn triples(self, indices: impl IntoIterator<Item = usize>) -> Self {
        indices.into_iter().fold(self, |b, i| b.triple(i))
    }

    pub fn result_vars<'a>(mut self, names: impl IntoIterator<Item = &'a str>) -> Self {
        let vars = self.resolve_vars(names);
        self.result_vars = Some(vars);
        self
    }

    pub fn required_inputs<'a>(mut self, names: impl IntoIterator<Item = &'a str>) -> Self {
        let vars = self.resolve_vars(names);
        self.required_inputs.union_with(&vars);
        self
    }

    pub fn optional_inputs<'a>(mut self, names: impl IntoIterator<Item = &'a str>) -> Self {
        let vars = self.resolve_vars(names);
        self.optional_inputs.union_with(&vars);
        self
    }

    fn resolve_vars<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) -> Bits {
        let mut bits = Bits::new();
        for name in names {
            let name = name.trim_start_matches('?');
            match self.query.var_index(name) {
                Some(index) => {
                    bits.insert(index);
                }
                None => {
                    self.error
                        .get_or_insert_with(|| PlanError::UnknownVariable(name.to_string()));
                }
            }
        }
        bits
    }

    pub fn build(self) -> PlanResult<Fragment> {
        if let Some(error) = self.error {
            return Err(error);
        }
        let mut result_vars = self
            .result_vars
            .unwrap_or_else(|| self.query.vars_of(&self.triples));
        result_vars.difference_with(&self.required_inputs);
        let optional_inputs = self.optional_inputs.difference(&self.required_inputs);

        Ok(Fragment {
            name: self.name,
            universe: self.query.universe(),
            props: NodeProps {
                triples: self.triples,
                result_vars,
                required_inputs: self.required_inputs,
                optional_inputs,
                web_api: self.source.kind == SourceKind::WebApi,
            },
            source: self.source,
        })
    }
}
