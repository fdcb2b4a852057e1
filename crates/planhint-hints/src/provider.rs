//! The caller-facing hint interface.

use planhint_core::config::PlanhintConfig;
use planhint_core::query::SqlQuery;
use planhint_planner::{JoinTree, PhysicalOperatorAssignment, PlanParameterization};

use crate::dialect::{compile_hints, Dialect, HintDialect, HintTarget};
use crate::error::Result;
use crate::mysql::MysqlHintProvider;
use crate::postgres::PostgresHintProvider;

/// Turns plan decisions into a hinted query for one database system.
///
/// Every argument is optional; stages without input are skipped and a call
/// without any input returns the query unchanged.
pub trait HintProvider: Send + Sync {
    fn dialect(&self) -> Dialect;

    fn adapt_query(
        &self,
        query: &SqlQuery,
        join_order: Option<&JoinTree>,
        physical_operators: Option<&PhysicalOperatorAssignment>,
    ) -> Result<SqlQuery> {
        self.generate_hints(query, join_order, physical_operators, None)
    }

    fn generate_hints(
        &self,
        query: &SqlQuery,
        join_order: Option<&JoinTree>,
        physical_operators: Option<&PhysicalOperatorAssignment>,
        plan_parameters: Option<&PlanParameterization>,
    ) -> Result<SqlQuery>;

    /// Whitelist lookup; never fails.
    fn supports_hint(&self, target: HintTarget) -> bool;

    fn format_query(&self, query: &SqlQuery) -> String;
}

impl<D> HintProvider for D
where
    D: HintDialect + Send + Sync,
{
    fn dialect(&self) -> Dialect {
        HintDialect::dialect(self)
    }

    fn generate_hints(
        &self,
        query: &SqlQuery,
        join_order: Option<&JoinTree>,
        physical_operators: Option<&PhysicalOperatorAssignment>,
        plan_parameters: Option<&PlanParameterization>,
    ) -> Result<SqlQuery> {
        compile_hints(self, query, join_order, physical_operators, plan_parameters)
    }

    fn supports_hint(&self, target: HintTarget) -> bool {
        match target {
            HintTarget::Operator(op) => self.operator_hint(op).is_some(),
            HintTarget::Plan(hint) => self.supports_plan_hint(hint),
        }
    }

    fn format_query(&self, query: &SqlQuery) -> String {
        query.render_with(|explain| self.explain_prefix(explain))
    }
}

pub fn hint_provider_for(dialect: Dialect) -> Box<dyn HintProvider> {
    match dialect {
        Dialect::Postgres => Box::new(PostgresHintProvider::new()),
        Dialect::Mysql => Box::new(MysqlHintProvider::new()),
    }
}

/// Provider for the dialect named in `config`.
pub fn hint_provider_from_config(config: &PlanhintConfig) -> Result<Box<dyn HintProvider>> {
    Ok(hint_provider_for(config.dialect.parse()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use planhint_core::table::TableReference;
    use planhint_planner::{JoinOperator, PhysicalOperator};

    #[test]
    fn test_empty_inputs_leave_query_unchanged() {
        let query = SqlQuery::new("*", vec![TableReference::new("r")]);
        for dialect in [Dialect::Postgres, Dialect::Mysql] {
            let provider = hint_provider_for(dialect);
            assert_eq!(provider.adapt_query(&query, None, None).unwrap(), query);
            assert_eq!(
                provider
                    .generate_hints(
                        &query,
                        Some(&JoinTree::empty()),
                        Some(&PhysicalOperatorAssignment::new()),
                        Some(&PlanParameterization::new()),
                    )
                    .unwrap(),
                query
            );
        }
    }

    #[test]
    fn test_provider_from_config() {
        let mut config = PlanhintConfig::default();
        assert_eq!(hint_provider_from_config(&config).unwrap().dialect(), Dialect::Postgres);
        config.dialect = "mysql".into();
        let provider = hint_provider_from_config(&config).unwrap();
        assert!(!provider.supports_hint(HintTarget::Operator(PhysicalOperator::Join(JoinOperator::NestedLoopJoin))));
        config.dialect = "db2".into();
        assert!(hint_provider_from_config(&config).is_err());
    }
}
