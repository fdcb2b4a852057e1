//! Physical operators and the operator assignment of a query.
//!
//! An assignment maps scans (one table) and joins (a set of tables) to the
//! operator that should implement them, plus optimizer-wide switches that
//! enable or disable an operator for the whole query.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use planhint_core::table::{TableReference, TableSet};
use serde::{Deserialize, Serialize};

use crate::error::{PlanError, Result};
use crate::jointree::JoinTree;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ScanOperator {
    SequentialScan,
    IndexScan,
    IndexOnlyScan,
    BitmapScan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum JoinOperator {
    NestedLoopJoin,
    HashJoin,
    SortMergeJoin,
    IndexNestedLoopJoin,
    BlockNestedLoopJoin,
    IndexMergeJoin,
    MergeJoin,
    IndexJoin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PhysicalOperator {
    Scan(ScanOperator),
    Join(JoinOperator),
}

impl PhysicalOperator {
    pub fn as_join(&self) -> Option<JoinOperator> {
        match self {
            PhysicalOperator::Join(op) => Some(*op),
            PhysicalOperator::Scan(_) => None,
        }
    }

    pub fn as_scan(&self) -> Option<ScanOperator> {
        match self {
            PhysicalOperator::Scan(op) => Some(*op),
            PhysicalOperator::Join(_) => None,
        }
    }
}

impl From<ScanOperator> for PhysicalOperator {
    fn from(op: ScanOperator) -> Self {
        PhysicalOperator::Scan(op)
    }
}

impl From<JoinOperator> for PhysicalOperator {
    fn from(op: JoinOperator) -> Self {
        PhysicalOperator::Join(op)
    }
}

impl fmt::Display for ScanOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl fmt::Display for JoinOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl fmt::Display for PhysicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhysicalOperator::Scan(op) => write!(f, "{}", op),
            PhysicalOperator::Join(op) => write!(f, "{}", op),
        }
    }
}

impl FromStr for PhysicalOperator {
    type Err = PlanError;

    /// Accepts the enum names plus the usual engine spellings
    /// (`SeqScan`, `NestLoop`, `MergeJoin` for sort-merge, ...).
    fn from_str(s: &str) -> Result<Self> {
        use JoinOperator::*;
        use ScanOperator::*;
        let op = match s.trim() {
            "SequentialScan" | "SeqScan" | "Seq Scan" => PhysicalOperator::Scan(SequentialScan),
            "IndexScan" | "IdxScan" | "Index Scan" => PhysicalOperator::Scan(IndexScan),
            "IndexOnlyScan" | "Index Only Scan" => PhysicalOperator::Scan(IndexOnlyScan),
            "BitmapScan" | "Bitmap Heap Scan" => PhysicalOperator::Scan(BitmapScan),
            "NestedLoopJoin" | "NestLoop" | "Nested Loop" | "NLJ" => PhysicalOperator::Join(NestedLoopJoin),
            "HashJoin" | "Hash Join" => PhysicalOperator::Join(HashJoin),
            "SortMergeJoin" | "Merge Join" => PhysicalOperator::Join(SortMergeJoin),
            "IndexNestedLoopJoin" => PhysicalOperator::Join(IndexNestedLoopJoin),
            "BlockNestedLoopJoin" | "BNL" => PhysicalOperator::Join(BlockNestedLoopJoin),
            "IndexMergeJoin" => PhysicalOperator::Join(IndexMergeJoin),
            "MergeJoin" => PhysicalOperator::Join(MergeJoin),
            "IndexJoin" => PhysicalOperator::Join(IndexJoin),
            other => return Err(PlanError::UnknownNodeType(other.to_string())),
        };
        Ok(op)
    }
}

/// Optimizer-wide switch for one operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperatorSetting {
    Enabled,
    Disabled,
    /// Leave the engine's default in place.
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScanOperatorAssignment {
    pub operator: ScanOperator,
    pub table: TableReference,
}

impl ScanOperatorAssignment {
    /// A scan needs exactly one table; anything else is a contract violation.
    pub fn new<I>(operator: ScanOperator, tables: I) -> Result<Self>
    where
        I: IntoIterator<Item = TableReference>,
    {
        let tables: TableSet = tables.into_iter().collect();
        match tables.as_single() {
            Some(table) => Ok(Self {
                operator,
                table: table.clone(),
            }),
            None => Err(PlanError::ScanArity(tables.len())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JoinOperatorAssignment {
    pub operator: JoinOperator,
    pub tables: TableSet,
    /// Tables on the inner (build) side, when the direction is fixed.
    #[serde(default)]
    pub inner: Option<TableSet>,
}

impl JoinOperatorAssignment {
    pub fn new<I>(operator: JoinOperator, tables: I) -> Result<Self>
    where
        I: IntoIterator<Item = TableReference>,
    {
        let tables: TableSet = tables.into_iter().collect();
        if tables.is_empty() {
            return Err(PlanError::EmptyJoinKey);
        }
        Ok(Self {
            operator,
            tables,
            inner: None,
        })
    }

    /// Mark `inner` as the inner/build side. It has to be a non-empty proper
    /// subset of the joined tables.
    pub fn with_inner(mut self, inner: TableSet) -> Result<Self> {
        self.inner = Some(inner);
        self.validate()?;
        Ok(self)
    }

    /// The key must be non-empty and a directional annotation must be a
    /// non-empty proper subset of it.
    pub fn validate(&self) -> Result<()> {
        if self.tables.is_empty() {
            return Err(PlanError::EmptyJoinKey);
        }
        match &self.inner {
            Some(inner) if inner.is_empty() || !inner.is_subset(&self.tables) || inner == &self.tables => {
                Err(PlanError::InvalidDirection {
                    inner: inner.to_string(),
                    tables: self.tables.to_string(),
                })
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhysicalOperatorAssignment {
    scan_operators: BTreeMap<TableReference, ScanOperatorAssignment>,
    join_operators: BTreeMap<TableSet, JoinOperatorAssignment>,
    global_settings: BTreeMap<PhysicalOperator, OperatorSetting>,
}

impl PhysicalOperatorAssignment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.scan_operators.is_empty()
            && self.join_operators.is_empty()
            && self.global_settings.is_empty()
    }

    pub fn scan_operators(&self) -> &BTreeMap<TableReference, ScanOperatorAssignment> {
        &self.scan_operators
    }

    pub fn join_operators(&self) -> &BTreeMap<TableSet, JoinOperatorAssignment> {
        &self.join_operators
    }

    pub fn global_settings(&self) -> &BTreeMap<PhysicalOperator, OperatorSetting> {
        &self.global_settings
    }

    pub fn set_scan_operator(&mut self, assignment: ScanOperatorAssignment) {
        self.scan_operators
            .insert(assignment.table.clone(), assignment);
    }

    /// Rejects assignments that fail `JoinOperatorAssignment::validate`.
    pub fn set_join_operator(&mut self, assignment: JoinOperatorAssignment) -> Result<()> {
        assignment.validate()?;
        self.join_operators
            .insert(assignment.tables.clone(), assignment);
        Ok(())
    }

    /// Shorthand for `ScanOperatorAssignment::new` + `set_scan_operator`.
    pub fn add_scan_operator<I>(&mut self, operator: ScanOperator, tables: I) -> Result<()>
    where
        I: IntoIterator<Item = TableReference>,
    {
        self.set_scan_operator(ScanOperatorAssignment::new(operator, tables)?);
        Ok(())
    }

    /// Shorthand for `JoinOperatorAssignment::new` + `set_join_operator`.
    pub fn add_join_operator<I>(&mut self, operator: JoinOperator, tables: I) -> Result<()>
    where
        I: IntoIterator<Item = TableReference>,
    {
        self.set_join_operator(JoinOperatorAssignment::new(operator, tables)?)
    }

    pub fn set_operator_enabled(&mut self, operator: impl Into<PhysicalOperator>, setting: OperatorSetting) {
        self.global_settings.insert(operator.into(), setting);
    }

    pub fn get_scan_operator(&self, table: &TableReference) -> Option<&ScanOperatorAssignment> {
        self.scan_operators.get(table)
    }

    pub fn get_join_operator(&self, tables: &TableSet) -> Option<&JoinOperatorAssignment> {
        self.join_operators.get(tables)
    }

    /// Combine two assignments; entries of `other` win on conflicts.
    pub fn merge_with(&self, other: &PhysicalOperatorAssignment) -> PhysicalOperatorAssignment {
        let mut merged = self.clone();
        for (k, v) in &other.scan_operators {
            merged.scan_operators.insert(k.clone(), v.clone());
        }
        for (k, v) in &other.join_operators {
            merged.join_operators.insert(k.clone(), v.clone());
        }
        for (k, v) in &other.global_settings {
            merged.global_settings.insert(*k, *v);
        }
        merged
    }

    /// Re-check every stored join entry. Deserialized assignments bypass
    /// the setters.
    pub fn validate(&self) -> Result<()> {
        for (key, join) in &self.join_operators {
            join.validate()?;
            if key != &join.tables {
                return Err(PlanError::MalformedPlan(format!(
                    "join operator stored under {} targets {}",
                    key, join.tables
                )));
            }
        }
        Ok(())
    }

    /// Every join key has to name tables that `tree` actually joins together.
    pub fn check_against(&self, tree: &JoinTree) -> Result<()> {
        if tree.is_empty() {
            return Ok(());
        }
        let subtrees = tree.subtrees();
        for tables in self.join_operators.keys() {
            if !subtrees.contains(tables) {
                return Err(PlanError::MalformedPlan(format!(
                    "join operator for {} does not match any join of the join tree",
                    tables
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(name: &str) -> TableReference {
        TableReference::new(name)
    }

    #[test]
    fn test_scan_requires_single_table() {
        assert!(ScanOperatorAssignment::new(ScanOperator::IndexScan, vec![t("r")]).is_ok());
        assert!(matches!(
            ScanOperatorAssignment::new(ScanOperator::IndexScan, vec![t("r"), t("s")]),
            Err(PlanError::ScanArity(2))
        ));
        assert!(matches!(
            ScanOperatorAssignment::new(ScanOperator::IndexScan, Vec::new()),
            Err(PlanError::ScanArity(0))
        ));
    }

    #[test]
    fn test_join_rejects_empty_key() {
        let mut assignment = PhysicalOperatorAssignment::new();
        assert!(matches!(
            assignment.add_join_operator(JoinOperator::HashJoin, Vec::new()),
            Err(PlanError::EmptyJoinKey)
        ));
        assert!(assignment.is_empty());
    }

    #[test]
    fn test_set_join_operator_rejects_invalid_assignments() {
        let mut assignment = PhysicalOperatorAssignment::new();
        let empty = JoinOperatorAssignment {
            operator: JoinOperator::HashJoin,
            tables: TableSet::new(),
            inner: None,
        };
        assert!(matches!(
            assignment.set_join_operator(empty),
            Err(PlanError::EmptyJoinKey)
        ));
        let whole_inner = JoinOperatorAssignment {
            operator: JoinOperator::HashJoin,
            tables: vec![t("r"), t("s")].into_iter().collect(),
            inner: Some(vec![t("r"), t("s")].into_iter().collect()),
        };
        assert!(matches!(
            assignment.set_join_operator(whole_inner),
            Err(PlanError::InvalidDirection { .. })
        ));
        assert!(assignment.is_empty());
        assert!(assignment.validate().is_ok());
    }

    #[test]
    fn test_join_key_is_order_independent() {
        let mut assignment = PhysicalOperatorAssignment::new();
        assignment
            .add_join_operator(JoinOperator::HashJoin, vec![t("s"), t("r")])
            .unwrap();
        let key: TableSet = vec![t("r"), t("s")].into_iter().collect();
        assert_eq!(
            assignment.get_join_operator(&key).map(|a| a.operator),
            Some(JoinOperator::HashJoin)
        );
    }

    #[test]
    fn test_direction_must_be_proper_subset() {
        let join = JoinOperatorAssignment::new(JoinOperator::HashJoin, vec![t("r"), t("s")]).unwrap();
        assert!(join.clone().with_inner(TableSet::single(t("r"))).is_ok());
        assert!(join.clone().with_inner(TableSet::single(t("x"))).is_err());
        assert!(join
            .clone()
            .with_inner(vec![t("r"), t("s")].into_iter().collect())
            .is_err());
    }

    #[test]
    fn test_merge_prefers_other() {
        let mut a = PhysicalOperatorAssignment::new();
        a.add_scan_operator(ScanOperator::SequentialScan, vec![t("r")]).unwrap();
        a.set_operator_enabled(JoinOperator::NestedLoopJoin, OperatorSetting::Disabled);
        let mut b = PhysicalOperatorAssignment::new();
        b.add_scan_operator(ScanOperator::IndexScan, vec![t("r")]).unwrap();

        let merged = a.merge_with(&b);
        assert_eq!(
            merged.get_scan_operator(&t("r")).map(|s| s.operator),
            Some(ScanOperator::IndexScan)
        );
        assert_eq!(merged.global_settings().len(), 1);
    }

    #[test]
    fn test_operator_spellings() {
        assert_eq!(
            "NestLoop".parse::<PhysicalOperator>().unwrap(),
            PhysicalOperator::Join(JoinOperator::NestedLoopJoin)
        );
        assert_eq!(
            "Seq Scan".parse::<PhysicalOperator>().unwrap(),
            PhysicalOperator::Scan(ScanOperator::SequentialScan)
        );
        assert!("Teleport".parse::<PhysicalOperator>().is_err());
    }
}
