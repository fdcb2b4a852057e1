//! MySQL optimizer hints (`/*+ ... */`) and `optimizer_switch` settings.

use planhint_core::query::Explain;
use planhint_core::table::{TableReference, TableSet};
use planhint_planner::{HintType, JoinOperator, OperatorSetting, PhysicalOperator, ScanOperator};

use crate::dialect::{Dialect, DirectedJoinOrder, HintDialect};

#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlHintProvider;

impl MysqlHintProvider {
    pub fn new() -> Self {
        Self
    }
}

fn optimizer_switch(operator: PhysicalOperator) -> Option<&'static str> {
    match operator {
        PhysicalOperator::Join(JoinOperator::IndexMergeJoin) => Some("index_merge"),
        PhysicalOperator::Join(JoinOperator::BlockNestedLoopJoin) => Some("block_nested_loop"),
        PhysicalOperator::Join(JoinOperator::HashJoin) => Some("hash_join"),
        _ => None,
    }
}

impl HintDialect for MysqlHintProvider {
    fn dialect(&self) -> Dialect {
        Dialect::Mysql
    }

    fn table_separator(&self) -> &'static str {
        ", "
    }

    fn operator_hint(&self, operator: PhysicalOperator) -> Option<&'static str> {
        match operator {
            PhysicalOperator::Join(JoinOperator::BlockNestedLoopJoin) => Some("BNL"),
            PhysicalOperator::Join(JoinOperator::IndexMergeJoin) => Some("INDEX_MERGE"),
            PhysicalOperator::Join(JoinOperator::IndexJoin) => Some("INDEX"),
            PhysicalOperator::Join(JoinOperator::MergeJoin) => Some("MERGE"),
            PhysicalOperator::Join(JoinOperator::HashJoin) => Some("HASH_JOIN"),
            PhysicalOperator::Scan(ScanOperator::IndexScan) => Some("INDEX_SCAN"),
            _ => None,
        }
    }

    fn setting_statement(&self, operator: PhysicalOperator, setting: OperatorSetting) -> Option<String> {
        let key = optimizer_switch(operator)?;
        let value = match setting {
            OperatorSetting::Enabled => "on",
            OperatorSetting::Disabled => "off",
            OperatorSetting::Default => "default",
        };
        Some(format!("SET optimizer_switch='{}={}';", key, value))
    }

    fn join_order_hint(&self, order: &DirectedJoinOrder) -> String {
        let ids: Vec<&str> = order.leaves().into_iter().map(TableReference::identifier).collect();
        format!("JOIN_ORDER({})", ids.join(", "))
    }

    fn join_order_parameter(&self, tables: &[TableReference]) -> String {
        let ids: Vec<&str> = tables.iter().map(TableReference::identifier).collect();
        format!("JOIN_ORDER({})", ids.join(", "))
    }

    fn index_hint(&self, table: Option<&TableReference>, indexes: &[String]) -> Option<String> {
        Some(match table {
            Some(t) => format!("FORCE_INDEX({} {})", t.identifier(), indexes.join(", ")),
            None => format!("FORCE_INDEX({})", indexes.join(", ")),
        })
    }

    fn cardinality_hint(&self, _tables: &TableSet, _rows: u64) -> Option<String> {
        None
    }

    fn supports_plan_hint(&self, hint: HintType) -> bool {
        matches!(hint, HintType::JoinOrderHint | HintType::IndexHint)
    }

    fn explain_prefix(&self, explain: &Explain) -> String {
        match (&explain.format, explain.analyze) {
            (Some(format), _) => format!("EXPLAIN FORMAT = {}", format),
            (None, true) => "EXPLAIN ANALYZE".to_string(),
            (None, false) => "EXPLAIN".to_string(),
        }
    }
}
