//! # Cardinality Estimates
//!
//! The join order planner ranks candidate joins by their estimated result size.
//! Estimates come from two external collaborators, both behind traits so that
//! deployments can plug in their own:
//!
//! - a `CardinalityEnsemble`, which estimates the result size of one fragment,
//! - a `JoinCardinalityEstimator`, which combines two estimates across a join.
//!
//! Every estimate carries a `Reliability` grade. The ordering rule in
//! `CardinalityComparator` uses it to avoid false precision: two guesses that
//! are close to each other are treated as a tie and the more reliable one wins,
//! while an unknown estimate is preferred over one known to be huge.
//!
//! ## Defaults
//!
//! - `InMemoryEnsemble`: per-fragment estimates keyed by fragment name, filled
//!   programmatically (tests, the HTTP service). Unknown fragments are
//!   `Unsupported`.
//! - `DefaultJoinEstimator`: the containment formula for equi-joins,
//!   `|L ⋈ R| = |L| * |R| / max(|L|, |R|)`.

use crate::fragment::Fragment;
use crate::join_graph::JoinInfo;
use crate::plan::PlanTree;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Confidence grade of a `Cardinality`, from least to most reliable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Reliability {
    /// No estimate could be made.
    Unsupported,
    /// The result is known to be non-empty; the value is a floor of 1.
    NonEmpty,
    Guess,
    /// The true value is at least `value`.
    LowerBound,
    Exact,
}

impl Reliability {
    /// `LowerBound` and `Exact` are backed by real counts.
    pub fn is_reliable(self) -> bool {
        self >= Reliability::LowerBound
    }
}

impl fmt::Display for Reliability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Reliability::Unsupported => "UNSUPPORTED",
            Reliability::NonEmpty => "NON_EMPTY",
            Reliability::Guess => "GUESS",
            Reliability::LowerBound => "LOWER_BOUND",
            Reliability::Exact => "EXACT",
        };
        f.write_str(name)
    }
}

/// An estimated row count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cardinality {
    pub reliability: Reliability,
    pub value: u64,
}

impl Cardinality {
    pub const UNSUPPORTED: Cardinality = Cardinality {
        reliability: Reliability::Unsupported,
        value: 0,
    };

    pub fn new(reliability: Reliability, value: u64) -> Self {
        match reliability {
            Reliability::Unsupported => Self::UNSUPPORTED,
            Reliability::NonEmpty => Self {
                reliability,
                value: value.max(1),
            },
            _ => Self { reliability, value },
        }
    }

    pub fn exact(value: u64) -> Self {
        Self::new(Reliability::Exact, value)
    }

    pub fn lower_bound(value: u64) -> Self {
        Self::new(Reliability::LowerBound, value)
    }

    pub fn guess(value: u64) -> Self {
        Self::new(Reliability::Guess, value)
    }

    pub fn non_empty() -> Self {
        Self::new(Reliability::NonEmpty, 1)
    }

    pub fn is_unsupported(&self) -> bool {
        self.reliability == Reliability::Unsupported
    }

    /// Penalty for a join that leaves required inputs unbound: the pending side
    /// is evaluated once per incoming binding, so the estimate is doubled and
    /// at best a lower bound.
    pub fn with_pending_inputs(self) -> Self {
        if self.is_unsupported() {
            return self;
        }
        Self::new(
            self.reliability.min(Reliability::LowerBound),
            self.value.saturating_mul(2).max(1),
        )
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unsupported() {
            write!(f, "{}", self.reliability)
        } else {
            write!(f, "{}({})", self.reliability, self.value)
        }
    }
}

/// Ordering rule for cardinalities. `Less` means "cheaper, join first".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CardinalityComparator {
    /// Reliable estimates at or above this value count as large.
    pub large_cardinality: u64,
    /// Guesses whose difference is within this fraction of the larger one tie.
    pub relative_closeness: f64,
    /// Guesses whose difference is at most this many rows tie.
    pub absolute_closeness: u64,
}

impl Default for CardinalityComparator {
    fn default() -> Self {
        Self {
            large_cardinality: 100_000,
            relative_closeness: 0.2,
            absolute_closeness: 16,
        }
    }
}

impl CardinalityComparator {
    pub fn compare(&self, a: &Cardinality, b: &Cardinality) -> Ordering {
        match (a.is_unsupported(), b.is_unsupported()) {
            (true, true) => Ordering::Equal,
            (true, false) => {
                if self.is_reliably_large(b) {
                    Ordering::Less
                } else {
                    Ordering::Greater
                }
            }
            (false, true) => {
                if self.is_reliably_large(a) {
                    Ordering::Greater
                } else {
                    Ordering::Less
                }
            }
            (false, false) => {
                let both_reliable = a.reliability.is_reliable() && b.reliability.is_reliable();
                if !both_reliable && self.is_close(a.value, b.value) {
                    // more reliable sorts first
                    b.reliability.cmp(&a.reliability)
                } else {
                    a.value
                        .cmp(&b.value)
                        .then_with(|| b.reliability.cmp(&a.reliability))
                }
            }
        }
    }

    fn is_reliably_large(&self, c: &Cardinality) -> bool {
        c.reliability.is_reliable() && c.value >= self.large_cardinality
    }

    fn is_close(&self, a: u64, b: u64) -> bool {
        let diff = a.abs_diff(b);
        diff <= self.absolute_closeness
            || (diff as f64) <= self.relative_closeness * (a.max(b) as f64)
    }
}

/// Estimates the result size of a single fragment.
pub trait CardinalityEnsemble: Send + Sync {
    fn estimate(&self, fragment: &Fragment) -> Cardinality;
}

/// Estimates the result size of joining two estimated inputs.
pub trait JoinCardinalityEstimator: Send + Sync {
    fn estimate(&self, info: &JoinInfo, left: Cardinality, right: Cardinality) -> Cardinality;
}

/// Per-fragment estimates keyed by fragment name.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEnsemble {
    pub estimates: HashMap<String, Cardinality>,
}

impl InMemoryEnsemble {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, fragment: impl Into<String>, cardinality: Cardinality) {
        self.estimates.insert(fragment.into(), cardinality);
    }

    pub fn with(mut self, fragment: impl Into<String>, cardinality: Cardinality) -> Self {
        self.insert(fragment, cardinality);
        self
    }
}

impl CardinalityEnsemble for InMemoryEnsemble {
    fn estimate(&self, fragment: &Fragment) -> Cardinality {
        self.estimates
            .get(fragment.name())
            .copied()
            .unwrap_or(Cardinality::UNSUPPORTED)
    }
}

/// Equi-join estimate under the containment assumption: the smaller input's
/// join values are all found in the larger one.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultJoinEstimator;

impl JoinCardinalityEstimator for DefaultJoinEstimator {
    fn estimate(&self, info: &JoinInfo, left: Cardinality, right: Cardinality) -> Cardinality {
        if left.is_unsupported() || right.is_unsupported() {
            return Cardinality::UNSUPPORTED;
        }
        let (l, r) = (left.value as f64, right.value as f64);
        let rows = if info.join_vars.is_empty() {
            // cartesian product
            l * r
        } else {
            l * r / l.max(r).max(1.0)
        };
        let reliability = left
            .reliability
            .min(right.reliability)
            .min(Reliability::Guess);
        Cardinality::new(reliability, rows.round().max(0.0) as u64)
    }
}

/// Pairs an ensemble with a join estimator to estimate whole plan trees.
#[derive(Clone)]
pub struct CardinalityOracle {
    pub ensemble: Arc<dyn CardinalityEnsemble>,
    pub join_estimator: Arc<dyn JoinCardinalityEstimator>,
}

impl CardinalityOracle {
    pub fn new(
        ensemble: Arc<dyn CardinalityEnsemble>,
        join_estimator: Arc<dyn JoinCardinalityEstimator>,
    ) -> Self {
        Self {
            ensemble,
            join_estimator,
        }
    }

    /// Estimate a plan bottom-up. Unions add their children's estimates and
    /// keep the weakest reliability.
    pub fn estimate_tree(&self, tree: &PlanTree) -> Cardinality {
        match tree {
            PlanTree::Empty => Cardinality::exact(0),
            PlanTree::Leaf(fragment) => self.ensemble.estimate(fragment),
            PlanTree::Join(join) => {
                let info = JoinInfo::between(join.left.props(), join.right.props());
                self.join(
                    &info,
                    self.estimate_tree(&join.left),
                    self.estimate_tree(&join.right),
                )
            }
            PlanTree::Union(union) => {
                let mut total = Cardinality::exact(0);
                for child in &union.children {
                    let c = self.estimate_tree(child);
                    if c.is_unsupported() {
                        return Cardinality::UNSUPPORTED;
                    }
                    total = Cardinality::new(
                        total.reliability.min(c.reliability),
                        total.value.saturating_add(c.value),
                    );
                }
                total
            }
        }
    }

    pub fn join(&self, info: &JoinInfo, left: Cardinality, right: Cardinality) -> Cardinality {
        self.join_estimator.estimate(info, left, right)
    }
}

impl Default for CardinalityOracle {
    fn default() -> Self {
        Self::new(Arc::new(InMemoryEnsemble::new()), Arc::new(DefaultJoinEstimator))
    }
}

impl fmt::Debug for CardinalityOracle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardinalityOracle").finish_non_exhaustive()
    }
}
