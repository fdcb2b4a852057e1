//! PostgreSQL `EXPLAIN (FORMAT JSON)` ingestion.

use planhint_core::table::TableReference;
use serde_json::{Map, Value};

use crate::error::{PlanError, Result};
use crate::physops::PhysicalOperator;
use crate::qep::QueryExecutionPlan;

const SCAN_NODES: &[&str] = &[
    "Seq Scan",
    "Index Scan",
    "Index Only Scan",
    "Bitmap Heap Scan",
    "Tid Scan",
    "Sample Scan",
];

const JOIN_NODES: &[&str] = &["Nested Loop", "Hash Join", "Merge Join"];

/// Parse an EXPLAIN document. Accepts the array PostgreSQL emits as well as
/// its single element.
pub fn parse_postgres_explain(json: &str) -> Result<QueryExecutionPlan> {
    let doc: Value = serde_json::from_str(json)?;
    let top = match &doc {
        Value::Array(items) => items
            .first()
            .ok_or_else(|| PlanError::MalformedPlan("empty EXPLAIN document".into()))?,
        other => other,
    };
    let top = top
        .as_object()
        .ok_or_else(|| PlanError::MalformedPlan("EXPLAIN document is not an object".into()))?;
    let plan = top
        .get("Plan")
        .and_then(Value::as_object)
        .ok_or_else(|| PlanError::MalformedPlan("missing 'Plan' entry".into()))?;

    let mut root = parse_node(plan)?;
    root.execution_time = top.get("Execution Time").and_then(Value::as_f64);
    Ok(root)
}

fn parse_node(node: &Map<String, Value>) -> Result<QueryExecutionPlan> {
    let node_type = node
        .get("Node Type")
        .and_then(Value::as_str)
        .ok_or_else(|| PlanError::MalformedPlan("plan node without 'Node Type'".into()))?
        .to_string();

    let is_scan = SCAN_NODES.contains(&node_type.as_str()) || node.contains_key("Relation Name");
    let is_join = JOIN_NODES.contains(&node_type.as_str());

    let table = if is_scan {
        Some(parse_table(node)?)
    } else {
        None
    };

    let true_cardinality = match (
        node.get("Actual Rows").and_then(Value::as_f64),
        node.get("Actual Loops").and_then(Value::as_f64),
    ) {
        (Some(rows), Some(loops)) => Some(rows * loops),
        (Some(rows), None) => Some(rows),
        _ => None,
    };

    // Bitmap index scans and friends below a scan are folded into it.
    let (children, inner_child) = if is_scan {
        (Vec::new(), None)
    } else {
        let raw = node
            .get("Plans")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let mut children = Vec::with_capacity(raw.len());
        let mut inner_child = None;
        for (idx, child) in raw.iter().enumerate() {
            let child = child
                .as_object()
                .ok_or_else(|| PlanError::MalformedPlan("child plan is not an object".into()))?;
            if child.get("Parent Relationship").and_then(Value::as_str) == Some("Inner") {
                inner_child = Some(idx);
            }
            children.push(parse_node(child)?);
        }
        (children, inner_child)
    };

    Ok(QueryExecutionPlan {
        physical_operator: node_type.parse::<PhysicalOperator>().ok(),
        node_type,
        is_join,
        is_scan,
        table,
        cost: node.get("Total Cost").and_then(Value::as_f64).unwrap_or(f64::NAN),
        estimated_cardinality: node.get("Plan Rows").and_then(Value::as_f64).unwrap_or(f64::NAN),
        true_cardinality,
        execution_time: None,
        children,
        inner_child,
    })
}

fn parse_table(node: &Map<String, Value>) -> Result<TableReference> {
    let name = node
        .get("Relation Name")
        .and_then(Value::as_str)
        .ok_or_else(|| PlanError::MalformedPlan("scan node without 'Relation Name'".into()))?;
    let mut table = match node.get("Alias").and_then(Value::as_str) {
        Some(alias) if alias != name => TableReference::aliased(name, alias),
        _ => TableReference::new(name),
    };
    if let Some(schema) = node.get("Schema").and_then(Value::as_str) {
        table = table.with_schema(schema);
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physops::{JoinOperator, ScanOperator};

    const ANALYZE_PLAN: &str = r#"[
      {
        "Plan": {
          "Node Type": "Hash Join",
          "Total Cost": 120.5,
          "Plan Rows": 80,
          "Actual Rows": 75,
          "Actual Loops": 1,
          "Plans": [
            {
              "Node Type": "Seq Scan",
              "Parent Relationship": "Outer",
              "Relation Name": "title",
              "Alias": "t",
              "Total Cost": 40.0,
              "Plan Rows": 1000,
              "Actual Rows": 990,
              "Actual Loops": 1
            },
            {
              "Node Type": "Hash",
              "Parent Relationship": "Inner",
              "Total Cost": 30.0,
              "Plan Rows": 10,
              "Plans": [
                {
                  "Node Type": "Bitmap Heap Scan",
                  "Parent Relationship": "Outer",
                  "Relation Name": "movie_info",
                  "Alias": "mi",
                  "Total Cost": 29.0,
                  "Plan Rows": 10,
                  "Actual Rows": 4,
                  "Actual Loops": 2,
                  "Plans": [
                    { "Node Type": "Bitmap Index Scan", "Total Cost": 4.0, "Plan Rows": 10 }
                  ]
                }
              ]
            }
          ]
        },
        "Planning Time": 0.3,
        "Execution Time": 12.7
      }
    ]"#;

    #[test]
    fn test_parse_analyze_plan() {
        let plan = parse_postgres_explain(ANALYZE_PLAN).unwrap();
        assert!(plan.is_join);
        assert!(plan.is_analyze());
        assert_eq!(plan.physical_operator, Some(PhysicalOperator::Join(JoinOperator::HashJoin)));
        assert_eq!(plan.execution_time, Some(12.7));
        assert_eq!(plan.inner_child, Some(1));

        let outer = plan.outer_child().unwrap();
        assert_eq!(outer.table, Some(TableReference::aliased("title", "t")));
        assert_eq!(outer.physical_operator, Some(PhysicalOperator::Scan(ScanOperator::SequentialScan)));

        let inner = plan.inner_child().unwrap().unwrap_passthrough();
        assert!(inner.is_scan);
        assert!(inner.children.is_empty());
        assert_eq!(inner.true_cardinality, Some(8.0));
        assert_eq!(inner.physical_operator, Some(PhysicalOperator::Scan(ScanOperator::BitmapScan)));
    }

    #[test]
    fn test_single_object_without_analyze() {
        let plan = parse_postgres_explain(
            r#"{"Plan": {"Node Type": "Seq Scan", "Relation Name": "r", "Alias": "r", "Total Cost": 1.5, "Plan Rows": 3}}"#,
        )
        .unwrap();
        assert!(plan.is_scan);
        assert!(!plan.is_analyze());
        assert_eq!(plan.table, Some(TableReference::new("r")));
        assert_eq!(plan.cost, 1.5);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(parse_postgres_explain("[]"), Err(PlanError::MalformedPlan(_))));
        assert!(matches!(parse_postgres_explain("{"), Err(PlanError::Explain(_))));
        assert!(parse_postgres_explain(r#"{"Plan": {"Total Cost": 1}}"#).is_err());
    }
}
