use planhint_planner::{HintType, PhysicalOperator, PlanError};
use thiserror::Error;

use crate::dialect::Dialect;

/// Result type local to planhint-hints.
pub type Result<T> = std::result::Result<T, HintError>;

#[derive(Debug, Error)]
pub enum HintError {
    #[error("{dialect} has no hint for operator {operator}")]
    UnsupportedOperator {
        dialect: Dialect,
        operator: PhysicalOperator,
    },

    #[error("{dialect} has no optimizer setting for operator {operator}")]
    UnsupportedSetting {
        dialect: Dialect,
        operator: PhysicalOperator,
    },

    #[error("{dialect} cannot express {hint:?}: {detail}")]
    UnsupportedHint {
        dialect: Dialect,
        hint: HintType,
        detail: String,
    },

    #[error("operator assignment does not match the join order: {0}")]
    AssignmentMismatch(String),

    #[error("unknown dialect '{0}'")]
    UnknownDialect(String),

    #[error(transparent)]
    Plan(#[from] PlanError),
}
