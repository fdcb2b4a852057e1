//! Strongly-typed table and column references.
//!
//! Downstream crates (planner, hints, tonic) should *not* use raw strings for
//! tables. Sets of tables are keyed through `TableSet`, whose equality does not
//! depend on insertion order.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A (possibly aliased, possibly schema-qualified) table of a query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableReference {
    pub full_name: String,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
}

impl TableReference {
    pub fn new(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            alias: None,
            schema: None,
        }
    }

    pub fn aliased(full_name: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            alias: Some(alias.into()),
            schema: None,
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Parse `"[schema.]name [alias]"` (an optional `AS` is accepted).
    pub fn parse(src: &str) -> Result<Self> {
        let parts: Vec<&str> = src
            .split_whitespace()
            .filter(|p| !p.eq_ignore_ascii_case("as"))
            .collect();
        let (qualified, alias) = match parts.as_slice() {
            [name] => (*name, None),
            [name, alias] => (*name, Some(alias.to_string())),
            _ => return Err(Error::InvalidIdentifier(src.to_string())),
        };
        let (schema, full_name) = match qualified.split_once('.') {
            Some((schema, name)) => (Some(schema.to_string()), name),
            None => (None, qualified),
        };
        if full_name.is_empty() {
            return Err(Error::InvalidIdentifier(src.to_string()));
        }
        Ok(Self {
            full_name: full_name.to_string(),
            alias,
            schema,
        })
    }

    /// The name under which the table is visible in SQL (alias wins).
    pub fn identifier(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.full_name)
    }
}

impl fmt::Display for TableReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(schema) = &self.schema {
            write!(f, "{}.", schema)?;
        }
        write!(f, "{}", self.full_name)?;
        match &self.alias {
            Some(alias) if alias != &self.full_name => write!(f, " AS {}", alias),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColumnReference {
    pub name: String,
    #[serde(default)]
    pub table: Option<TableReference>,
}

impl ColumnReference {
    pub fn new(name: impl Into<String>, table: Option<TableReference>) -> Self {
        Self {
            name: name.into(),
            table,
        }
    }
}

impl fmt::Display for ColumnReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.table {
            Some(table) => write!(f, "{}.{}", table.identifier(), self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Order-independent set of tables, used as the key of join-level mappings.
///
/// Iteration is in the canonical (sorted) order, which is also the order used
/// when a multi-table key is rendered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableSet(BTreeSet<TableReference>);

impl TableSet {
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    pub fn single(table: TableReference) -> Self {
        let mut set = BTreeSet::new();
        set.insert(table);
        Self(set)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, table: &TableReference) -> bool {
        self.0.contains(table)
    }

    pub fn is_subset(&self, other: &TableSet) -> bool {
        self.0.is_subset(&other.0)
    }

    pub fn is_disjoint(&self, other: &TableSet) -> bool {
        self.0.is_disjoint(&other.0)
    }

    pub fn union(&self, other: &TableSet) -> TableSet {
        Self(self.0.union(&other.0).cloned().collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = &TableReference> {
        self.0.iter()
    }

    /// The only table of a single-table set.
    pub fn as_single(&self) -> Option<&TableReference> {
        if self.0.len() == 1 {
            self.0.iter().next()
        } else {
            None
        }
    }

    /// Render the identifiers in iteration order, joined by `sep`.
    pub fn join_identifiers(&self, sep: &str) -> String {
        self.0
            .iter()
            .map(|t| t.identifier())
            .collect::<Vec<_>>()
            .join(sep)
    }
}

impl FromIterator<TableReference> for TableSet {
    fn from_iter<I: IntoIterator<Item = TableReference>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> FromIterator<&'a TableReference> for TableSet {
    fn from_iter<I: IntoIterator<Item = &'a TableReference>>(iter: I) -> Self {
        Self(iter.into_iter().cloned().collect())
    }
}

impl IntoIterator for TableSet {
    type Item = TableReference;
    type IntoIter = std::collections::btree_set::IntoIter<TableReference>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a TableSet {
    type Item = &'a TableReference;
    type IntoIter = std::collections::btree_set::Iter<'a, TableReference>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for TableSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.join_identifiers(", "))
    }
}
