use thiserror::Error;

/// Result type local to planhint-planner.
pub type Result<T> = std::result::Result<T, PlanError>;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("join operator assigned to an empty table set")]
    EmptyJoinKey,

    #[error("scan operator must target exactly one table, got {0}")]
    ScanArity(usize),

    #[error("invalid join direction: inner side {inner} is not a proper subset of {tables}")]
    InvalidDirection { inner: String, tables: String },

    #[error("cannot join trees that share tables: {0}")]
    OverlappingTrees(String),

    #[error("malformed execution plan: {0}")]
    MalformedPlan(String),

    #[error("unknown operator or node type '{0}'")]
    UnknownNodeType(String),

    #[error("EXPLAIN document error: {0}")]
    Explain(#[from] serde_json::Error),

    #[error("plan DSL error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("plan DSL error: {0}")]
    Dsl(String),

    #[error(transparent)]
    Core(#[from] planhint_core::Error),
}
