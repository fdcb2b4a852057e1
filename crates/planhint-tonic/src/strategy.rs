//! TONIC: operator selection driven by a QEP-S and execution feedback.

use planhint_core::config::TonicConfig;
use planhint_core::query::SqlQuery;
use planhint_hints::HintProvider;
use planhint_planner::{JoinTree, PhysicalOperatorAssignment, QueryExecutionPlan};
use serde_json::json;

use crate::error::{Result, TonicError};
use crate::qeps::QueryExecutionPlanSynopsis;

/// Chooses physical operators for the joins of a query.
pub trait PhysicalOperatorSelection {
    /// `join_order` may be absent (or empty); strategies then fall back to
    /// whatever order they can obtain on their own.
    fn select_physical_operators(
        &self,
        query: &SqlQuery,
        join_order: Option<&JoinTree>,
    ) -> Result<PhysicalOperatorAssignment>;

    /// JSON description of the strategy and its parameters.
    fn describe(&self) -> serde_json::Value;
}

/// The database a strategy talks to. Implementations map their own failures
/// to `TonicError::Backend`.
pub trait DatabaseBackend {
    /// Estimated plan of the native optimizer.
    fn query_plan(&self, query: &SqlQuery) -> Result<QueryExecutionPlan>;

    /// Plan with measured cardinalities and execution time.
    fn analyze_plan(&self, query: &SqlQuery) -> Result<QueryExecutionPlan>;

    fn hint_provider(&self) -> &dyn HintProvider;
}

pub struct TonicOperatorSelection<B> {
    config: TonicConfig,
    synopsis: QueryExecutionPlanSynopsis,
    backend: B,
}

impl<B: DatabaseBackend> TonicOperatorSelection<B> {
    pub fn new(config: TonicConfig, backend: B) -> Result<Self> {
        Ok(Self {
            synopsis: QueryExecutionPlanSynopsis::from_config(&config)?,
            config,
            backend,
        })
    }

    pub fn config(&self) -> &TonicConfig {
        &self.config
    }

    pub fn synopsis(&self) -> &QueryExecutionPlanSynopsis {
        &self.synopsis
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Integrate the costs of `plan`, or of the backend's plan for `query`
    /// when none is given.
    pub fn integrate_cost(&mut self, query: &SqlQuery, plan: Option<&QueryExecutionPlan>) -> Result<()> {
        match plan {
            Some(plan) => self.synopsis.integrate_costs(query, plan),
            None => {
                let plan = self.backend.query_plan(query)?;
                self.synopsis.integrate_costs(query, &plan)
            }
        }
    }

    /// Learn from an executed plan: force its join order and operators onto
    /// the query, ask the backend for the resulting plan and integrate it.
    pub fn incorporate_feedback(&mut self, query: &SqlQuery, analyze_plan: &QueryExecutionPlan) -> Result<()> {
        if !analyze_plan.is_analyze() {
            return Err(TonicError::NotAnalyzePlan);
        }
        let executed = JoinTree::load_from_query_plan(analyze_plan)?;
        let operators = executed.physical_operators()?;
        let hinted = self
            .backend
            .hint_provider()
            .adapt_query(&query.without_explain(), Some(&executed), Some(&operators))?;
        #[cfg(feature = "tracing")]
        tracing::debug!(join_order = %executed, "incorporating execution feedback");
        let plan = self.backend.query_plan(&hinted)?;
        self.synopsis.integrate_costs(query, &plan)
    }

    /// Execute `query` through the backend and learn from the result.
    pub fn simulate_feedback(&mut self, query: &SqlQuery) -> Result<()> {
        let analyze_plan = self.backend.analyze_plan(query)?;
        self.incorporate_feedback(query, &analyze_plan)
    }

    fn native_join_order(&self, query: &SqlQuery) -> Result<JoinTree> {
        let plan = self.backend.query_plan(query)?;
        Ok(JoinTree::load_from_query_plan(&plan)?.into_logical())
    }
}

impl<B: DatabaseBackend> PhysicalOperatorSelection for TonicOperatorSelection<B> {
    fn select_physical_operators(
        &self,
        query: &SqlQuery,
        join_order: Option<&JoinTree>,
    ) -> Result<PhysicalOperatorAssignment> {
        let assignment = match join_order.filter(|tree| !tree.is_empty()) {
            Some(tree) => self.synopsis.recommend_operators(query, tree)?,
            None => {
                let native = self.native_join_order(query)?;
                self.synopsis.recommend_operators(query, &native)?
            }
        };
        #[cfg(feature = "tracing")]
        tracing::debug!(
            joins = assignment.join_operators().len(),
            "TONIC operator selection"
        );
        Ok(assignment)
    }

    fn describe(&self) -> serde_json::Value {
        json!({
            "name": "tonic",
            "filter_aware": self.config.filter_aware,
            "gamma": self.config.gamma,
        })
    }
}
