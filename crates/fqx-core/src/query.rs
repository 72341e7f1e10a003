//! # Conjunctive Queries
//!
//! A `Query` is a basic graph pattern: a set of triple patterns whose variables
//! are joined. Building a query fixes its two universes (triples and variable
//! names) and precomputes whether the triples are join-connected.

use crate::bits::Bits;
use crate::universe::{IndexedSet, UniverseId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A position in a triple pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Term {
    /// Variable, stored without the leading `?`.
    Var(String),
    Iri(String),
    Literal(String),
}

impl Term {
    pub fn var(name: impl Into<String>) -> Self {
        Term::Var(name.into())
    }

    pub fn iri(iri: impl Into<String>) -> Self {
        Term::Iri(iri.into())
    }

    pub fn literal(text: impl Into<String>) -> Self {
        Term::Literal(text.into())
    }

    pub fn as_var(&self) -> Option<&str> {
        match self {
            Term::Var(name) => Some(name),
            _ => None,
        }
    }

    /// Parse the compact notation used by tests and the HTTP service:
    /// `?x` is a variable, `<...>` an IRI, anything else a literal.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        if let Some(name) = text.strip_prefix('?') {
            Term::Var(name.to_string())
        } else if let Some(iri) = text.strip_prefix('<').and_then(|t| t.strip_suffix('>')) {
            Term::Iri(iri.to_string())
        } else {
            Term::Literal(text.to_string())
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Var(name) => write!(f, "?{name}"),
            Term::Iri(iri) => write!(f, "<{iri}>"),
            Term::Literal(text) => write!(f, "\"{text}\""),
        }
    }
}

/// A triple pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Triple {
    pub subject: Term,
    pub predicate: Term,
    pub object: Term,
}

impl Triple {
    pub fn new(subject: Term, predicate: Term, object: Term) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }

    /// Shorthand over `Term::parse`: `Triple::parse("?x", "<knows>", "Bob")`.
    pub fn parse(subject: &str, predicate: &str, object: &str) -> Self {
        Self::new(Term::parse(subject), Term::parse(predicate), Term::parse(object))
    }

    pub fn terms(&self) -> [&Term; 3] {
        [&self.subject, &self.predicate, &self.object]
    }

    pub fn var_names(&self) -> impl Iterator<Item = &str> {
        self.terms().into_iter().filter_map(Term::as_var)
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.subject, self.predicate, self.object)
    }
}

/// A conjunctive query together with its triple and variable universes.
///
/// Both universes share the query's `UniverseId`. Cloning a query is cheap and
/// keeps the same identity.
#[derive(Debug, Clone)]
pub struct Query {
    triples: Arc<IndexedSet<Triple>>,
    vars: Arc<IndexedSet<String>>,
    join_connected: bool,
}

impl Query {
    pub fn new(triples: impl IntoIterator<Item = Triple>) -> Self {
        let id = UniverseId::fresh();
        let triples = IndexedSet::from_items(id, triples);
        let mut vars = IndexedSet::new(id);
        for triple in triples.iter() {
            for name in triple.var_names() {
                vars.intern(name.to_string());
            }
        }
        let join_connected = triples_join_connected(&triples, &vars);
        Self {
            triples: Arc::new(triples),
            vars: Arc::new(vars),
            join_connected,
        }
    }

    pub fn universe(&self) -> UniverseId {
        self.triples.id()
    }

    pub fn triples(&self) -> &IndexedSet<Triple> {
        &self.triples
    }

    pub fn vars(&self) -> &IndexedSet<String> {
        &self.vars
    }

    /// Every triple of the query.
    pub fn all_triples(&self) -> Bits {
        self.triples.full()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    /// True when every triple reaches every other through shared variables.
    pub fn is_join_connected(&self) -> bool {
        self.join_connected
    }

    pub fn var_index(&self, name: &str) -> Option<u32> {
        self.vars.index_of(&name.to_string())
    }

    /// Variables mentioned by the given triples.
    pub fn vars_of(&self, triples: &Bits) -> Bits {
        self.triples
            .items_of(triples)
            .flat_map(|t| t.var_names())
            .filter_map(|name| self.var_index(name))
            .collect()
    }

    /// Human-readable listing of the given triples, used in log messages.
    pub fn describe_triples(&self, triples: &Bits) -> String {
        self.triples
            .items_of(triples)
            .map(|t| format!("{{{t}}}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn triples_join_connected(triples: &IndexedSet<Triple>, vars: &IndexedSet<String>) -> bool {
    if triples.len() <= 1 {
        return true;
    }
    let var_sets: Vec<Bits> = triples
        .iter()
        .map(|t| {
            t.var_names()
                .filter_map(|n| vars.index_of(&n.to_string()))
                .collect()
        })
        .collect();

    let mut reached = Bits::single(0);
    let mut frontier_vars = var_sets[0].clone();
    loop {
        let mut grew = false;
        for (i, set) in var_sets.iter().enumerate() {
            let i = i as u32;
            if !reached.contains(i) && set.intersects(&frontier_vars) {
                reached.insert(i);
                frontier_vars.union_with(set);
                grew = true;
            }
        }
        if !grew {
            break;
        }
    }
    reached.len() == triples.len()
}
