#![forbid(unsafe_code)]
//! planhint-planner: the join-plan model.
//!
//! Design:
//! - Join trees are a tagged union over base tables and binary joins, kept
//!   immutable once built.
//! - Operator choices live in `PhysicalOperatorAssignment`, everything else
//!   the hint layer can express lives in `PlanParameterization`.
//! - `QueryExecutionPlan` is the shape in which a database collaborator hands
//!   us its (estimated or ANALYZE) plans; `explain` reads PostgreSQL's JSON
//!   format into it.
//! - A tiny YAML DSL builds all of the above for tests and tooling.
//!
//! NOTE: No database driver lives here. Plans are consumed, never produced.

pub mod dsl;
pub mod error;
pub mod explain;
pub mod jointree;
pub mod params;
pub mod physops;
pub mod qep;

pub use dsl::yaml::{parse_yaml_plan, ParsedPlan};
pub use error::{PlanError, Result};
pub use explain::parse_postgres_explain;
pub use jointree::{BaseTableNode, ChildSide, IntermediateJoinNode, JoinTree, JoinTreeNode, NodeAnnotation};
pub use params::{HintType, PlanParameterization};
pub use physops::{
    JoinOperator, JoinOperatorAssignment, OperatorSetting, PhysicalOperator,
    PhysicalOperatorAssignment, ScanOperator, ScanOperatorAssignment,
};
pub use qep::QueryExecutionPlan;
