use planhint_hints::HintError;
use planhint_planner::PlanError;
use thiserror::Error;

/// Result type local to planhint-tonic.
pub type Result<T> = std::result::Result<T, TonicError>;

#[derive(Debug, Error)]
pub enum TonicError {
    #[error("invalid synopsis configuration: {0}")]
    Config(#[from] planhint_core::Error),

    #[error("plan node cannot be integrated: {0}")]
    MalformedPlanNode(String),

    #[error("feedback requires an ANALYZE plan, got an estimated plan")]
    NotAnalyzePlan,

    #[error("database backend error: {0}")]
    Backend(String),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Hint(#[from] HintError),
}
