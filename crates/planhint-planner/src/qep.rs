//! Execution plans as handed over by a database collaborator.
//!
//! Only what the optimizer layers need is modelled: per node whether it is a
//! scan or a join, the scanned table, the chosen operator, cost and
//! cardinality, and the outer/inner distinction of join children. Nodes that
//! are neither (hash builds, sorts, materializations, ...) are pass-through
//! nodes with exactly one child.

use planhint_core::table::{TableReference, TableSet};
use serde::{Deserialize, Serialize};

use crate::error::{PlanError, Result};
use crate::physops::{JoinOperator, PhysicalOperator, ScanOperator};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryExecutionPlan {
    pub node_type: String,
    pub is_join: bool,
    pub is_scan: bool,
    #[serde(default)]
    pub table: Option<TableReference>,
    #[serde(default)]
    pub physical_operator: Option<PhysicalOperator>,
    pub cost: f64,
    pub estimated_cardinality: f64,
    /// Only available for ANALYZE plans.
    #[serde(default)]
    pub true_cardinality: Option<f64>,
    /// Total execution time in milliseconds (root of ANALYZE plans only).
    #[serde(default)]
    pub execution_time: Option<f64>,
    #[serde(default)]
    pub children: Vec<QueryExecutionPlan>,
    /// Index of the inner child in `children`, if the engine reports it.
    #[serde(default)]
    pub inner_child: Option<usize>,
}

impl QueryExecutionPlan {
    pub fn scan(table: TableReference, operator: Option<ScanOperator>, cost: f64, cardinality: f64) -> Self {
        Self {
            node_type: operator
                .map(|op| op.to_string())
                .unwrap_or_else(|| "Scan".to_string()),
            is_join: false,
            is_scan: true,
            table: Some(table),
            physical_operator: operator.map(PhysicalOperator::Scan),
            cost,
            estimated_cardinality: cardinality,
            true_cardinality: None,
            execution_time: None,
            children: Vec::new(),
            inner_child: None,
        }
    }

    /// A join whose first child is the outer and second child the inner input.
    pub fn join(
        operator: Option<JoinOperator>,
        outer: QueryExecutionPlan,
        inner: QueryExecutionPlan,
        cost: f64,
        cardinality: f64,
    ) -> Self {
        Self {
            node_type: operator
                .map(|op| op.to_string())
                .unwrap_or_else(|| "Join".to_string()),
            is_join: true,
            is_scan: false,
            table: None,
            physical_operator: operator.map(PhysicalOperator::Join),
            cost,
            estimated_cardinality: cardinality,
            true_cardinality: None,
            execution_time: None,
            children: vec![outer, inner],
            inner_child: Some(1),
        }
    }

    pub fn passthrough(node_type: impl Into<String>, child: QueryExecutionPlan) -> Self {
        let cost = child.cost;
        let cardinality = child.estimated_cardinality;
        Self {
            node_type: node_type.into(),
            is_join: false,
            is_scan: false,
            table: None,
            physical_operator: None,
            cost,
            estimated_cardinality: cardinality,
            true_cardinality: child.true_cardinality,
            execution_time: None,
            children: vec![child],
            inner_child: None,
        }
    }

    pub fn with_true_cardinality(mut self, rows: f64) -> Self {
        self.true_cardinality = Some(rows);
        self
    }

    pub fn with_execution_time(mut self, millis: f64) -> Self {
        self.execution_time = Some(millis);
        self
    }

    pub fn is_analyze(&self) -> bool {
        self.execution_time.is_some() || self.true_cardinality.is_some()
    }

    /// True cardinality if measured, the estimate otherwise.
    pub fn cardinality(&self) -> f64 {
        self.true_cardinality.unwrap_or(self.estimated_cardinality)
    }

    pub fn inner_child(&self) -> Option<&QueryExecutionPlan> {
        match self.inner_child {
            Some(idx) => self.children.get(idx),
            None => self.children.get(1),
        }
    }

    pub fn outer_child(&self) -> Option<&QueryExecutionPlan> {
        match self.inner_child {
            Some(idx) => self
                .children
                .iter()
                .enumerate()
                .find(|(i, _)| *i != idx)
                .map(|(_, c)| c),
            None => self.children.first(),
        }
    }

    /// Skip pass-through nodes until a scan, a join, or a fan-out is reached.
    pub fn unwrap_passthrough(&self) -> &QueryExecutionPlan {
        let mut cur = self;
        while !cur.is_join && !cur.is_scan && cur.children.len() == 1 {
            cur = &cur.children[0];
        }
        cur
    }

    /// All base tables scanned below (and including) this node.
    pub fn tables(&self) -> TableSet {
        let mut acc = Vec::new();
        collect_tables(self, &mut acc);
        acc.into_iter().collect()
    }

    /// Linearize the joins of this plan: the inner subtree is expanded before
    /// the join itself, scans vanish, pass-through nodes are skipped.
    pub fn join_sequence(&self) -> Result<Vec<&QueryExecutionPlan>> {
        let mut out = Vec::new();
        linearize(self, &mut out)?;
        Ok(out)
    }
}

fn collect_tables<'a>(node: &'a QueryExecutionPlan, acc: &mut Vec<&'a TableReference>) {
    if node.is_scan {
        if let Some(t) = &node.table {
            acc.push(t);
        }
        return;
    }
    for child in &node.children {
        collect_tables(child, acc);
    }
}

fn linearize<'a>(node: &'a QueryExecutionPlan, out: &mut Vec<&'a QueryExecutionPlan>) -> Result<()> {
    if node.is_scan {
        return Ok(());
    }
    if !node.is_join {
        return match node.children.as_slice() {
            [child] => linearize(child, out),
            _ => Err(PlanError::MalformedPlan(format!(
                "non-join node '{}' must have exactly one child, has {}",
                node.node_type,
                node.children.len()
            ))),
        };
    }
    let inner = node.inner_child().ok_or_else(|| {
        PlanError::MalformedPlan(format!("join node '{}' has no inner child", node.node_type))
    })?;
    linearize(inner, out)?;
    out.push(node);
    Ok(())
}
