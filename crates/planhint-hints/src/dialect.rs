//! Dialect-neutral compile pipeline.
//!
//! Stages run in a fixed order and are skipped when their input is absent:
//! 1. join order / join direction
//! 2. operator hints and optimizer settings
//! 3. plan parameters (indexes, explicit join orders, cardinalities)
//! 4. merge of the stage outputs
//! 5. compilation into a `HintClause`
//! 6. splicing into the query
//!
//! A dialect only decides how each piece is spelled (`HintDialect`).

use std::fmt;
use std::str::FromStr;

use planhint_core::query::{Explain, SqlQuery};
use planhint_core::table::{TableReference, TableSet};
use planhint_planner::{
    ChildSide, HintType, IntermediateJoinNode, JoinTree, JoinTreeNode, OperatorSetting,
    PhysicalOperator, PhysicalOperatorAssignment, PlanParameterization,
};
use serde::{Deserialize, Serialize};

use crate::error::{HintError, Result};
use crate::parts::HintParts;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Postgres,
    Mysql,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Postgres => write!(f, "postgres"),
            Dialect::Mysql => write!(f, "mysql"),
        }
    }
}

impl FromStr for Dialect {
    type Err = HintError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Dialect::Postgres),
            "mysql" => Ok(Dialect::Mysql),
            other => Err(HintError::UnknownDialect(other.to_string())),
        }
    }
}

/// Anything `supports_hint` can be asked about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HintTarget {
    Operator(PhysicalOperator),
    Plan(HintType),
}

impl From<PhysicalOperator> for HintTarget {
    fn from(op: PhysicalOperator) -> Self {
        HintTarget::Operator(op)
    }
}

impl From<HintType> for HintTarget {
    fn from(hint: HintType) -> Self {
        HintTarget::Plan(hint)
    }
}

/// A join order with every join's direction fixed: `Join { outer, inner }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectedJoinOrder {
    Leaf(TableReference),
    Join {
        outer: Box<DirectedJoinOrder>,
        inner: Box<DirectedJoinOrder>,
    },
}

impl DirectedJoinOrder {
    /// Direct every join of `tree`. Trees with fewer than two tables carry no
    /// order and yield `None`.
    ///
    /// The inner child of a join comes from the assignment's directional
    /// annotation if there is one, then from the tree's own annotation, and
    /// is otherwise the child with the strictly smaller cardinality bound. A
    /// missing bound counts as -inf on the left and +inf on the right, so ties
    /// make the right child inner.
    pub fn from_tree(
        tree: &JoinTree,
        operators: Option<&PhysicalOperatorAssignment>,
    ) -> Result<Option<Self>> {
        match tree.root() {
            Some(root) if tree.tables().len() >= 2 => Ok(Some(Self::from_node(root, operators)?)),
            _ => Ok(None),
        }
    }

    fn from_node(node: &JoinTreeNode, operators: Option<&PhysicalOperatorAssignment>) -> Result<Self> {
        match node {
            JoinTreeNode::Base(base) => Ok(DirectedJoinOrder::Leaf(base.table.clone())),
            JoinTreeNode::Join(join) => {
                let (outer, inner) = match inner_side(join, operators)? {
                    ChildSide::Left => (&join.right, &join.left),
                    ChildSide::Right => (&join.left, &join.right),
                };
                Ok(DirectedJoinOrder::Join {
                    outer: Box::new(Self::from_node(outer, operators)?),
                    inner: Box::new(Self::from_node(inner, operators)?),
                })
            }
        }
    }

    /// Base tables from the outermost to the innermost input.
    pub fn leaves(&self) -> Vec<&TableReference> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a TableReference>) {
        match self {
            DirectedJoinOrder::Leaf(t) => out.push(t),
            DirectedJoinOrder::Join { outer, inner } => {
                outer.collect_leaves(out);
                inner.collect_leaves(out);
            }
        }
    }

    /// `(outer<sep>inner)`, recursively; leaves render as their identifier.
    pub fn nested(&self, sep: &str) -> String {
        match self {
            DirectedJoinOrder::Leaf(t) => t.identifier().to_string(),
            DirectedJoinOrder::Join { outer, inner } => {
                format!("({}{}{})", outer.nested(sep), sep, inner.nested(sep))
            }
        }
    }
}

fn inner_side(join: &IntermediateJoinNode, operators: Option<&PhysicalOperatorAssignment>) -> Result<ChildSide> {
    let assigned = operators
        .and_then(|ops| ops.get_join_operator(join.tables()))
        .and_then(|a| a.inner.as_ref());
    if let Some(inner) = assigned {
        return if inner == &join.left.tables() {
            Ok(ChildSide::Left)
        } else if inner == &join.right.tables() {
            Ok(ChildSide::Right)
        } else {
            Err(HintError::AssignmentMismatch(format!(
                "inner side {} of join {} is not one of its inputs",
                inner,
                join.tables()
            )))
        };
    }
    if let Some(side) = join.annotation.inner {
        return Ok(side);
    }
    let left = join.left.annotation().bound().unwrap_or(f64::NEG_INFINITY);
    let right = join.right.annotation().bound().unwrap_or(f64::INFINITY);
    Ok(if left < right {
        ChildSide::Left
    } else {
        ChildSide::Right
    })
}

/// How a database system spells optimizer directives.
///
/// Lookup methods return `None` for things the system cannot express; the
/// pipeline turns that into the matching `HintError`.
pub trait HintDialect {
    fn dialect(&self) -> Dialect;

    /// Separator between table identifiers inside a multi-table hint.
    fn table_separator(&self) -> &'static str;

    fn operator_hint(&self, operator: PhysicalOperator) -> Option<&'static str>;

    fn setting_statement(&self, operator: PhysicalOperator, setting: OperatorSetting) -> Option<String>;

    fn join_order_hint(&self, order: &DirectedJoinOrder) -> String;

    fn join_order_parameter(&self, tables: &[TableReference]) -> String;

    fn index_hint(&self, table: Option<&TableReference>, indexes: &[String]) -> Option<String>;

    fn cardinality_hint(&self, tables: &TableSet, rows: u64) -> Option<String>;

    fn supports_plan_hint(&self, hint: HintType) -> bool;

    fn explain_prefix(&self, explain: &Explain) -> String;
}

/// Run the full pipeline for `dialect` and splice the result into `query`.
pub fn compile_hints<D: HintDialect + ?Sized>(
    dialect: &D,
    query: &SqlQuery,
    join_order: Option<&JoinTree>,
    operators: Option<&PhysicalOperatorAssignment>,
    parameters: Option<&PlanParameterization>,
) -> Result<SqlQuery> {
    let join_order = join_order.filter(|tree| !tree.is_empty());
    let operators = operators.filter(|ops| !ops.is_empty());
    let parameters = parameters.filter(|params| !params.is_empty());

    if let Some(ops) = operators {
        ops.validate()?;
    }
    if let (Some(tree), Some(ops)) = (join_order, operators) {
        ops.check_against(tree)
            .map_err(|e| HintError::AssignmentMismatch(e.to_string()))?;
    }

    let mut parts = HintParts::empty();
    if let Some(tree) = join_order {
        parts = parts.merge_with(&join_order_hints(dialect, tree, operators)?);
    }
    if let Some(ops) = operators {
        parts = parts.merge_with(&operator_hints(dialect, ops)?);
    }
    if let Some(params) = parameters {
        parts = parts.merge_with(&parameter_hints(dialect, params)?);
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(
        dialect = %dialect.dialect(),
        settings = parts.settings().len(),
        hints = parts.hints().len(),
        "compiled optimizer hints"
    );

    Ok(match parts.to_hint_clause() {
        Some(clause) => query.with_hint(clause),
        None => query.clone(),
    })
}

fn join_order_hints<D: HintDialect + ?Sized>(
    dialect: &D,
    tree: &JoinTree,
    operators: Option<&PhysicalOperatorAssignment>,
) -> Result<HintParts> {
    match DirectedJoinOrder::from_tree(tree, operators)? {
        Some(order) => Ok(HintParts::new(Vec::new(), vec![dialect.join_order_hint(&order)])),
        None => Ok(HintParts::empty()),
    }
}

fn operator_hints<D: HintDialect + ?Sized>(dialect: &D, operators: &PhysicalOperatorAssignment) -> Result<HintParts> {
    let mut settings = Vec::with_capacity(operators.global_settings().len());
    for (operator, setting) in operators.global_settings() {
        let statement = dialect
            .setting_statement(*operator, *setting)
            .ok_or(HintError::UnsupportedSetting {
                dialect: dialect.dialect(),
                operator: *operator,
            })?;
        settings.push(statement);
    }

    let mut hints = Vec::new();
    for (table, scan) in operators.scan_operators() {
        let name = hint_name(dialect, PhysicalOperator::Scan(scan.operator))?;
        hints.push(format!("{}({})", name, table.identifier()));
    }
    for (tables, join) in operators.join_operators() {
        let name = hint_name(dialect, PhysicalOperator::Join(join.operator))?;
        hints.push(format!(
            "{}({})",
            name,
            tables.join_identifiers(dialect.table_separator())
        ));
    }
    Ok(HintParts::new(settings, hints))
}

fn hint_name<D: HintDialect + ?Sized>(dialect: &D, operator: PhysicalOperator) -> Result<&'static str> {
    dialect
        .operator_hint(operator)
        .ok_or(HintError::UnsupportedOperator {
            dialect: dialect.dialect(),
            operator,
        })
}

fn parameter_hints<D: HintDialect + ?Sized>(dialect: &D, params: &PlanParameterization) -> Result<HintParts> {
    let unsupported = |hint: HintType, detail: String| HintError::UnsupportedHint {
        dialect: dialect.dialect(),
        hint,
        detail,
    };

    let mut hints = Vec::new();
    for (table, indexes) in params.index_hints() {
        if indexes.is_empty() {
            continue;
        }
        let hint = dialect.index_hint(table.as_ref(), indexes).ok_or_else(|| {
            let target = table
                .as_ref()
                .map(|t| t.identifier().to_string())
                .unwrap_or_else(|| "<no table>".to_string());
            unsupported(HintType::IndexHint, format!("indexes {:?} on {}", indexes, target))
        })?;
        hints.push(hint);
    }
    for tables in params.join_order_hints() {
        if !dialect.supports_plan_hint(HintType::JoinOrderHint) {
            return Err(unsupported(HintType::JoinOrderHint, format!("{} tables", tables.len())));
        }
        hints.push(dialect.join_order_parameter(tables));
    }
    for (tables, rows) in params.cardinality_hints() {
        let hint = dialect
            .cardinality_hint(tables, *rows)
            .ok_or_else(|| unsupported(HintType::CardinalityHint, format!("{} rows for {}", rows, tables)))?;
        hints.push(hint);
    }
    Ok(HintParts::new(Vec::new(), hints))
}
