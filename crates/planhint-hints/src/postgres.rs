//! PostgreSQL directives in the pg_hint_plan style plus `enable_*` planner
//! settings.

use planhint_core::query::Explain;
use planhint_core::table::{TableReference, TableSet};
use planhint_planner::{HintType, JoinOperator, OperatorSetting, PhysicalOperator, ScanOperator};

use crate::dialect::{Dialect, DirectedJoinOrder, HintDialect};

#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresHintProvider;

impl PostgresHintProvider {
    pub fn new() -> Self {
        Self
    }
}

fn planner_setting(operator: PhysicalOperator) -> Option<&'static str> {
    let name = match operator {
        PhysicalOperator::Scan(ScanOperator::SequentialScan) => "enable_seqscan",
        PhysicalOperator::Scan(ScanOperator::IndexScan) => "enable_indexscan",
        PhysicalOperator::Scan(ScanOperator::IndexOnlyScan) => "enable_indexonlyscan",
        PhysicalOperator::Scan(ScanOperator::BitmapScan) => "enable_bitmapscan",
        PhysicalOperator::Join(JoinOperator::NestedLoopJoin) => "enable_nestloop",
        PhysicalOperator::Join(JoinOperator::HashJoin) => "enable_hashjoin",
        PhysicalOperator::Join(JoinOperator::SortMergeJoin) => "enable_mergejoin",
        PhysicalOperator::Join(_) => return None,
    };
    Some(name)
}

impl HintDialect for PostgresHintProvider {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn table_separator(&self) -> &'static str {
        " "
    }

    fn operator_hint(&self, operator: PhysicalOperator) -> Option<&'static str> {
        let name = match operator {
            PhysicalOperator::Scan(ScanOperator::SequentialScan) => "SeqScan",
            PhysicalOperator::Scan(ScanOperator::IndexScan) => "IndexScan",
            PhysicalOperator::Scan(ScanOperator::IndexOnlyScan) => "IndexOnlyScan",
            PhysicalOperator::Scan(ScanOperator::BitmapScan) => "BitmapScan",
            PhysicalOperator::Join(JoinOperator::NestedLoopJoin) => "NestLoop",
            PhysicalOperator::Join(JoinOperator::HashJoin) => "HashJoin",
            PhysicalOperator::Join(JoinOperator::SortMergeJoin) => "MergeJoin",
            PhysicalOperator::Join(_) => return None,
        };
        Some(name)
    }

    fn setting_statement(&self, operator: PhysicalOperator, setting: OperatorSetting) -> Option<String> {
        let name = planner_setting(operator)?;
        let value = match setting {
            OperatorSetting::Enabled => "'on'",
            OperatorSetting::Disabled => "'off'",
            OperatorSetting::Default => "DEFAULT",
        };
        Some(format!("SET {} = {};", name, value))
    }

    fn join_order_hint(&self, order: &DirectedJoinOrder) -> String {
        format!("Leading({})", order.nested(" "))
    }

    fn join_order_parameter(&self, tables: &[TableReference]) -> String {
        let ids: Vec<&str> = tables.iter().map(TableReference::identifier).collect();
        format!("Leading({})", ids.join(" "))
    }

    /// pg_hint_plan binds index hints to a table.
    fn index_hint(&self, table: Option<&TableReference>, indexes: &[String]) -> Option<String> {
        table.map(|t| format!("IndexScan({} {})", t.identifier(), indexes.join(" ")))
    }

    fn cardinality_hint(&self, tables: &TableSet, rows: u64) -> Option<String> {
        Some(format!("Rows({} #{})", tables.join_identifiers(" "), rows))
    }

    fn supports_plan_hint(&self, _hint: HintType) -> bool {
        true
    }

    fn explain_prefix(&self, explain: &Explain) -> String {
        let mut options = Vec::new();
        if explain.analyze {
            options.push("ANALYZE".to_string());
        }
        if let Some(format) = &explain.format {
            options.push(format!("FORMAT {}", format));
        }
        if options.is_empty() {
            "EXPLAIN".to_string()
        } else {
            format!("EXPLAIN ({})", options.join(", "))
        }
    }
}
