//! Errors raised by the planner.
//!
//! Only contract violations are errors. A query that cannot be answered by the
//! given fragments is not an error: it plans to `PlanTree::Empty`.

use crate::bits::Bits;
use crate::universe::UniverseId;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlanError {
    /// The join order planner was handed no fragments.
    #[error("cannot order joins over an empty fragment subset")]
    EmptySubset,
    /// The join order planner was handed fragments that do not join.
    #[error("fragment subset {subset} is not join-connected")]
    NotJoinConnected { subset: Bits },
    /// A fragment was built against another query's universe.
    #[error("fragment '{fragment}' belongs to universe {found}, expected {expected}")]
    ForeignUniverse {
        fragment: String,
        expected: UniverseId,
        found: UniverseId,
    },
    /// A fragment references a triple position outside the query.
    #[error("triple index {0} is out of range for the query")]
    UnknownTriple(usize),
    /// A fragment references a variable the query does not mention.
    #[error("variable '?{0}' does not occur in the query")]
    UnknownVariable(String),
}

pub type PlanResult<T> = Result<T, PlanError>;
