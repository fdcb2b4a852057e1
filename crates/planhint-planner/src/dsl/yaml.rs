//! YAML → join tree / operator assignment / plan parameters.
//!
//! Example:
//! ```yaml
//! join_order:
//!   - { table: "title t", bound: 2500000 }
//!   - [ "movie_info mi", { table: "info_type it", bound: 113 } ]
//! scans:
//!   - { table: t, operator: SeqScan }
//! joins:
//!   - { tables: [mi, it], operator: HashJoin, inner: [it] }
//! settings:
//!   NestLoop: disabled
//! params:
//!   indexes:
//!     - { table: mi, indexes: [movie_info_pkey] }
//!   cardinalities:
//!     - { tables: [t, mi], rows: 1200 }
//! ```
//!
//! A join is a two-element list `[outer, inner]`, or `{ join: [..], bound: n }`
//! to attach a bound. Tables named in the other sections are resolved against
//! the join order by identifier first, so `t` refers to `title t` above.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use planhint_core::table::{TableReference, TableSet};

use crate::error::{PlanError, Result};
use crate::jointree::JoinTree;
use crate::params::PlanParameterization;
use crate::physops::{
    JoinOperatorAssignment, OperatorSetting, PhysicalOperator, PhysicalOperatorAssignment,
    ScanOperatorAssignment,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanDoc {
    #[serde(default)]
    pub join_order: Option<JoinSpec>,
    #[serde(default)]
    pub scans: Vec<ScanDef>,
    #[serde(default)]
    pub joins: Vec<JoinDef>,
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
    #[serde(default)]
    pub params: ParamsDef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JoinSpec {
    Table(String),
    BoundedTable {
        table: String,
        #[serde(default)]
        bound: Option<f64>,
        #[serde(default)]
        operator: Option<String>,
    },
    BoundedJoin {
        join: Vec<JoinSpec>,
        #[serde(default)]
        bound: Option<f64>,
        #[serde(default)]
        operator: Option<String>,
    },
    Join(Vec<JoinSpec>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanDef {
    pub table: String,
    pub operator: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinDef {
    pub tables: Vec<String>,
    pub operator: String,
    #[serde(default)]
    pub inner: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParamsDef {
    #[serde(default)]
    pub indexes: Vec<IndexDef>,
    #[serde(default)]
    pub join_orders: Vec<Vec<String>>,
    #[serde(default)]
    pub cardinalities: Vec<CardinalityDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexDef {
    #[serde(default)]
    pub table: Option<String>,
    pub indexes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardinalityDef {
    pub tables: Vec<String>,
    pub rows: u64,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedPlan {
    pub join_tree: JoinTree,
    pub operators: PhysicalOperatorAssignment,
    pub parameters: PlanParameterization,
}

/// Parse a YAML plan description.
pub fn parse_yaml_plan(yaml_src: &str) -> Result<ParsedPlan> {
    let doc: PlanDoc = serde_yaml::from_str(yaml_src)?;

    let join_tree = match &doc.join_order {
        Some(node) => build_tree(node)?,
        None => JoinTree::empty(),
    };
    let known: BTreeMap<String, TableReference> = join_tree
        .tables()
        .iter()
        .map(|t| (t.identifier().to_string(), t.clone()))
        .collect();
    let resolve = |name: &str| -> Result<TableReference> {
        match known.get(name.trim()) {
            Some(t) => Ok(t.clone()),
            None => Ok(TableReference::parse(name)?),
        }
    };
    let resolve_all = |names: &[String]| -> Result<Vec<TableReference>> {
        names.iter().map(|n| resolve(n)).collect()
    };

    let mut operators = join_tree.physical_operators()?;
    for scan in &doc.scans {
        let op = parse_operator(&scan.operator)?
            .as_scan()
            .ok_or_else(|| PlanError::Dsl(format!("'{}' is not a scan operator", scan.operator)))?;
        operators.set_scan_operator(ScanOperatorAssignment::new(op, vec![resolve(&scan.table)?])?);
    }
    for join in &doc.joins {
        let op = parse_operator(&join.operator)?
            .as_join()
            .ok_or_else(|| PlanError::Dsl(format!("'{}' is not a join operator", join.operator)))?;
        let mut assignment = JoinOperatorAssignment::new(op, resolve_all(&join.tables)?)?;
        if let Some(inner) = &join.inner {
            let inner: TableSet = resolve_all(inner)?.into_iter().collect();
            assignment = assignment.with_inner(inner)?;
        }
        operators.set_join_operator(assignment)?;
    }
    for (name, setting) in &doc.settings {
        operators.set_operator_enabled(parse_operator(name)?, parse_setting(setting)?);
    }

    let mut parameters = PlanParameterization::new();
    for idx in &doc.params.indexes {
        let table = idx.table.as_deref().map(|t| resolve(t)).transpose()?;
        parameters.add_index_hint(table, idx.indexes.iter().cloned());
    }
    for order in &doc.params.join_orders {
        parameters.add_join_order_hint(resolve_all(order)?);
    }
    for card in &doc.params.cardinalities {
        parameters.add_cardinality_hint(resolve_all(&card.tables)?, card.rows)?;
    }

    Ok(ParsedPlan {
        join_tree,
        operators,
        parameters,
    })
}

fn build_tree(node: &JoinSpec) -> Result<JoinTree> {
    let (tree, bound, operator) = match node {
        JoinSpec::Table(name) => (JoinTree::for_base_table(TableReference::parse(name)?), None, None),
        JoinSpec::BoundedTable { table, bound, operator } => (
            JoinTree::for_base_table(TableReference::parse(table)?),
            *bound,
            operator.as_deref(),
        ),
        JoinSpec::BoundedJoin { join, bound, operator } => (build_join(join)?, *bound, operator.as_deref()),
        JoinSpec::Join(children) => (build_join(children)?, None, None),
    };
    let tables = tree.tables();
    let tree = match bound {
        Some(b) => tree.with_upper_bound(&tables, b)?,
        None => tree,
    };
    match operator {
        Some(op) => tree.with_operator(&tables, parse_operator(op)?),
        None => Ok(tree),
    }
}

fn build_join(children: &[JoinSpec]) -> Result<JoinTree> {
    match children {
        [outer, inner] => JoinTree::joining(build_tree(outer)?, build_tree(inner)?),
        other => Err(PlanError::Dsl(format!(
            "a join needs exactly two inputs, got {}",
            other.len()
        ))),
    }
}

fn parse_operator(name: &str) -> Result<PhysicalOperator> {
    name.parse::<PhysicalOperator>()
}

fn parse_setting(s: &str) -> Result<OperatorSetting> {
    match s.trim().to_ascii_lowercase().as_str() {
        "enabled" | "on" | "true" => Ok(OperatorSetting::Enabled),
        "disabled" | "off" | "false" => Ok(OperatorSetting::Disabled),
        "default" => Ok(OperatorSetting::Default),
        other => Err(PlanError::Dsl(format!("unknown operator setting '{}'", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physops::{JoinOperator, ScanOperator};

    const PLAN: &str = r#"
join_order:
  - { table: "title t", bound: 2500000 }
  - [ "movie_info mi", { table: "info_type it", bound: 113 } ]
scans:
  - { table: t, operator: SeqScan }
joins:
  - { tables: [mi, it], operator: HashJoin, inner: [it] }
settings:
  NestLoop: disabled
params:
  indexes:
    - { table: mi, indexes: [movie_info_pkey] }
    - { indexes: [global_idx] }
  join_orders:
    - [t, mi, it]
  cardinalities:
    - { tables: [t, mi], rows: 1200 }
"#;

    #[test]
    fn test_parse_full_document() {
        let parsed = parse_yaml_plan(PLAN).unwrap();
        assert_eq!(parsed.join_tree.to_string(), "(t ⋈ (mi ⋈ it))");
        assert_eq!(parsed.join_tree.subtrees().len(), 2);

        let t = TableReference::aliased("title", "t");
        let mi = TableReference::aliased("movie_info", "mi");
        let it = TableReference::aliased("info_type", "it");
        assert_eq!(
            parsed.operators.get_scan_operator(&t).map(|s| s.operator),
            Some(ScanOperator::SequentialScan)
        );
        let key: TableSet = vec![mi, it.clone()].into_iter().collect();
        let join = parsed.operators.get_join_operator(&key).unwrap();
        assert_eq!(join.operator, JoinOperator::HashJoin);
        assert_eq!(join.inner, Some(TableSet::single(it)));
        assert_eq!(
            parsed.operators.global_settings().get(&PhysicalOperator::Join(JoinOperator::NestedLoopJoin)),
            Some(&OperatorSetting::Disabled)
        );
        assert!(parsed.operators.check_against(&parsed.join_tree).is_ok());

        assert_eq!(parsed.parameters.index_hints().len(), 2);
        assert_eq!(parsed.parameters.join_order_hints()[0].len(), 3);
        assert_eq!(parsed.parameters.cardinality_hints().values().copied().collect::<Vec<_>>(), vec![1200]);
    }

    #[test]
    fn test_bounded_join_and_operator() {
        let parsed = parse_yaml_plan(
            r#"
join_order: { join: [r, s], bound: 10, operator: MergeJoin }
"#,
        )
        .unwrap();
        let root = parsed.join_tree.root().unwrap();
        assert_eq!(root.annotation().bound(), Some(10.0));
        assert_eq!(parsed.operators.join_operators().len(), 1);
    }

    #[test]
    fn test_rejects_bad_documents() {
        assert!(matches!(
            parse_yaml_plan("join_order: [a, b, c]"),
            Err(PlanError::Dsl(_))
        ));
        assert!(matches!(
            parse_yaml_plan("join_order: [a, [b, a]]"),
            Err(PlanError::OverlappingTrees(_))
        ));
        assert!(matches!(
            parse_yaml_plan("scans: [{ table: r, operator: HashJoin }]"),
            Err(PlanError::Dsl(_))
        ));
        assert!(parse_yaml_plan("settings: { HashJoin: maybe }").is_err());
        assert!(parse_yaml_plan("unknown_section: 1").is_err());
    }
}
