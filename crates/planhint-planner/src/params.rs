//! Plan parameters that are not operator choices: forced indexes, explicit
//! join orders and cardinality overrides. All of them are advisory; the hint
//! layer decides how (and whether) a dialect can express them.

use std::collections::BTreeMap;

use planhint_core::table::{TableReference, TableSet};
use serde::{Deserialize, Serialize};

use crate::error::{PlanError, Result};

/// Kinds of plan-level hints a dialect may or may not support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HintType {
    JoinOrderHint,
    JoinDirectionHint,
    CardinalityHint,
    IndexHint,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanParameterization {
    /// `None` keys carry indexes that are not bound to a specific table.
    index_hints: BTreeMap<Option<TableReference>, Vec<String>>,
    join_order_hints: Vec<Vec<TableReference>>,
    cardinality_hints: BTreeMap<TableSet, u64>,
}

impl PlanParameterization {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.index_hints.is_empty()
            && self.join_order_hints.is_empty()
            && self.cardinality_hints.is_empty()
    }

    pub fn index_hints(&self) -> &BTreeMap<Option<TableReference>, Vec<String>> {
        &self.index_hints
    }

    pub fn join_order_hints(&self) -> &[Vec<TableReference>] {
        &self.join_order_hints
    }

    pub fn cardinality_hints(&self) -> &BTreeMap<TableSet, u64> {
        &self.cardinality_hints
    }

    /// Append `indexes` to the list for `table`, skipping names already present.
    pub fn add_index_hint<I, S>(&mut self, table: Option<TableReference>, indexes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entry = self.index_hints.entry(table).or_default();
        for index in indexes {
            let index = index.into();
            if !entry.contains(&index) {
                entry.push(index);
            }
        }
    }

    pub fn add_join_order_hint(&mut self, tables: Vec<TableReference>) {
        if !tables.is_empty() && !self.join_order_hints.contains(&tables) {
            self.join_order_hints.push(tables);
        }
    }

    pub fn add_cardinality_hint<I>(&mut self, tables: I, cardinality: u64) -> Result<()>
    where
        I: IntoIterator<Item = TableReference>,
    {
        let tables: TableSet = tables.into_iter().collect();
        if tables.is_empty() {
            return Err(PlanError::EmptyJoinKey);
        }
        self.cardinality_hints.insert(tables, cardinality);
        Ok(())
    }

    pub fn merge_with(&self, other: &PlanParameterization) -> PlanParameterization {
        let mut merged = self.clone();
        for (table, indexes) in &other.index_hints {
            merged.add_index_hint(table.clone(), indexes.iter().cloned());
        }
        for tables in &other.join_order_hints {
            merged.add_join_order_hint(tables.clone());
        }
        for (tables, card) in &other.cardinality_hints {
            merged.cardinality_hints.insert(tables.clone(), *card);
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_hints_deduplicate() {
        let mut params = PlanParameterization::new();
        let r = TableReference::new("r");
        params.add_index_hint(Some(r.clone()), ["r_pkey", "r_a_idx"]);
        params.add_index_hint(Some(r.clone()), ["r_pkey"]);
        assert_eq!(params.index_hints()[&Some(r)], vec!["r_pkey", "r_a_idx"]);
    }

    #[test]
    fn test_cardinality_rejects_empty_key() {
        let mut params = PlanParameterization::new();
        assert!(params.add_cardinality_hint(Vec::new(), 10).is_err());
        assert!(params.is_empty());
        params
            .add_cardinality_hint(vec![TableReference::new("r"), TableReference::new("s")], 1000)
            .unwrap();
        assert_eq!(params.cardinality_hints().len(), 1);
    }

    #[test]
    fn test_merge_unions_and_overrides() {
        let r = TableReference::new("r");
        let s = TableReference::new("s");
        let mut a = PlanParameterization::new();
        a.add_index_hint(Some(r.clone()), ["r_pkey"]);
        a.add_cardinality_hint(vec![r.clone(), s.clone()], 10).unwrap();
        let mut b = PlanParameterization::new();
        b.add_index_hint(Some(r.clone()), ["r_pkey", "r_b_idx"]);
        b.add_join_order_hint(vec![s.clone(), r.clone()]);
        b.add_cardinality_hint(vec![s.clone(), r.clone()], 99).unwrap();

        let merged = a.merge_with(&b);
        assert_eq!(merged.index_hints()[&Some(r.clone())], vec!["r_pkey", "r_b_idx"]);
        assert_eq!(merged.join_order_hints(), &[vec![s, r]]);
        assert_eq!(merged.cardinality_hints().values().copied().collect::<Vec<_>>(), vec![99]);
    }
}
