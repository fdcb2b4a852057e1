//! Structural query model.
//!
//! This is deliberately *not* a SQL AST: clause bodies are kept as text and
//! only the parts the optimizer layers care about are structured (the hint
//! clause, EXPLAIN, the FROM list, and per-table filter predicates).
//! Dialects render queries through `render_with`, so nothing here depends on
//! a particular database system.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::table::{ColumnReference, TableReference, TableSet};

/// Dedicated directive clause, placed in front of the projection.
///
/// - `preparatory_statements` are standalone statements (optimizer settings)
///   that have to run before the query itself.
/// - `query_hints` is the inline hint block (usually a special comment).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HintClause {
    pub preparatory_statements: String,
    pub query_hints: String,
}

impl HintClause {
    pub fn new(preparatory_statements: impl Into<String>, query_hints: impl Into<String>) -> Self {
        Self {
            preparatory_statements: preparatory_statements.into(),
            query_hints: query_hints.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.preparatory_statements.is_empty() && self.query_hints.is_empty()
    }
}

impl fmt::Display for HintClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (
            self.preparatory_statements.is_empty(),
            self.query_hints.is_empty(),
        ) {
            (false, false) => write!(f, "{}\n{}", self.preparatory_statements, self.query_hints),
            (false, true) => write!(f, "{}", self.preparatory_statements),
            (true, false) => write!(f, "{}", self.query_hints),
            (true, true) => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Explain {
    pub analyze: bool,
    #[serde(default)]
    pub format: Option<String>,
}

impl Explain {
    pub fn plan(format: impl Into<String>) -> Self {
        Self {
            analyze: false,
            format: Some(format.into()),
        }
    }

    pub fn analyze(format: impl Into<String>) -> Self {
        Self {
            analyze: true,
            format: Some(format.into()),
        }
    }
}

/// Filter applied to a single base table, kept as an opaque descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FilterPredicate {
    pub text: String,
    #[serde(default)]
    pub columns: Vec<ColumnReference>,
}

impl FilterPredicate {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            columns: Vec::new(),
        }
    }

    pub fn with_columns(mut self, columns: Vec<ColumnReference>) -> Self {
        self.columns = columns;
        self
    }
}

impl fmt::Display for FilterPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlQuery {
    #[serde(default)]
    hint: Option<HintClause>,
    #[serde(default)]
    explain: Option<Explain>,
    select: String,
    from: Vec<TableReference>,
    #[serde(default)]
    where_clause: Option<String>,
    #[serde(default)]
    tail: Option<String>,
    #[serde(default)]
    filters: BTreeMap<TableReference, FilterPredicate>,
}

impl SqlQuery {
    pub fn new(select: impl Into<String>, from: Vec<TableReference>) -> Self {
        Self {
            hint: None,
            explain: None,
            select: select.into(),
            from,
            where_clause: None,
            tail: None,
            filters: BTreeMap::new(),
        }
    }

    pub fn with_where(mut self, where_clause: impl Into<String>) -> Self {
        self.where_clause = Some(where_clause.into());
        self
    }

    /// Trailing clauses (GROUP BY, ORDER BY, LIMIT, ...) kept verbatim.
    pub fn with_tail(mut self, tail: impl Into<String>) -> Self {
        self.tail = Some(tail.into());
        self
    }

    pub fn with_filter(mut self, table: TableReference, predicate: FilterPredicate) -> Self {
        self.filters.insert(table, predicate);
        self
    }

    /// Returns a copy of this query with `hint` as its directive clause.
    /// An existing hint clause is replaced, every other clause is unchanged.
    pub fn with_hint(&self, hint: HintClause) -> Self {
        let mut out = self.clone();
        out.hint = Some(hint);
        out
    }

    pub fn with_explain(&self, explain: Explain) -> Self {
        let mut out = self.clone();
        out.explain = Some(explain);
        out
    }

    pub fn without_explain(&self) -> Self {
        let mut out = self.clone();
        out.explain = None;
        out
    }

    pub fn hint(&self) -> Option<&HintClause> {
        self.hint.as_ref()
    }

    pub fn explain(&self) -> Option<&Explain> {
        self.explain.as_ref()
    }

    pub fn select(&self) -> &str {
        &self.select
    }

    pub fn from_tables(&self) -> &[TableReference] {
        &self.from
    }

    pub fn where_clause(&self) -> Option<&str> {
        self.where_clause.as_deref()
    }

    pub fn tables(&self) -> TableSet {
        self.from.iter().collect()
    }

    pub fn filters_for(&self, table: &TableReference) -> Option<&FilterPredicate> {
        self.filters.get(table)
    }

    /// Render the query, delegating the EXPLAIN prefix to `explain`.
    pub fn render_with<F>(&self, explain: F) -> String
    where
        F: Fn(&Explain) -> String,
    {
        let mut out = String::new();
        if let Some(hint) = self.hint.as_ref().filter(|h| !h.is_empty()) {
            out.push_str(&hint.to_string());
            out.push('\n');
        }
        if let Some(e) = &self.explain {
            out.push_str(&explain(e));
            out.push(' ');
        }
        out.push_str("SELECT ");
        out.push_str(&self.select);
        out.push_str(" FROM ");
        out.push_str(
            &self
                .from
                .iter()
                .map(|t| t.to_string())
                .collect::<Vec<_>>()
                .join(", "),
        );
        if let Some(w) = &self.where_clause {
            out.push_str(" WHERE ");
            out.push_str(w);
        }
        if let Some(tail) = &self.tail {
            out.push(' ');
            out.push_str(tail);
        }
        out.push(';');
        out
    }
}

fn neutral_explain(e: &Explain) -> String {
    let mut options = Vec::new();
    if e.analyze {
        options.push("ANALYZE".to_string());
    }
    if let Some(format) = &e.format {
        options.push(format!("FORMAT {}", format));
    }
    if options.is_empty() {
        "EXPLAIN".to_string()
    } else {
        format!("EXPLAIN ({})", options.join(", "))
    }
}

impl fmt::Display for SqlQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render_with(neutral_explain))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SqlQuery {
        SqlQuery::new(
            "COUNT(*)",
            vec![TableReference::new("r"), TableReference::new("s")],
        )
        .with_where("r.a = s.b")
    }

    #[test]
    fn test_render_without_hint() {
        assert_eq!(sample().to_string(), "SELECT COUNT(*) FROM r, s WHERE r.a = s.b;");
    }

    #[test]
    fn test_with_hint_keeps_other_clauses() {
        let query = sample();
        let hinted = query.with_hint(HintClause::new("SET x = 1;", "/*+\n  HashJoin(r s)\n*/"));
        assert_eq!(hinted.select(), query.select());
        assert_eq!(hinted.where_clause(), query.where_clause());
        assert_eq!(hinted.from_tables(), query.from_tables());
        assert_eq!(
            hinted.to_string(),
            "SET x = 1;\n/*+\n  HashJoin(r s)\n*/\nSELECT COUNT(*) FROM r, s WHERE r.a = s.b;"
        );

        // Replacing, not stacking.
        let rehinted = hinted.with_hint(HintClause::new("", "/*+ SeqScan(r) */"));
        assert_eq!(rehinted.hint().map(|h| h.preparatory_statements.as_str()), Some(""));
    }

    #[test]
    fn test_explain_prefix() {
        let q = sample().with_explain(Explain::analyze("JSON"));
        assert!(q.to_string().starts_with("EXPLAIN (ANALYZE, FORMAT JSON) SELECT"));
        assert_eq!(q.without_explain(), sample());
    }

    #[test]
    fn test_tail_is_rendered_last() {
        let q = sample().with_tail("GROUP BY r.c LIMIT 10");
        assert_eq!(
            q.to_string(),
            "SELECT COUNT(*) FROM r, s WHERE r.a = s.b GROUP BY r.c LIMIT 10;"
        );
    }

    #[test]
    fn test_filters_for() {
        let r = TableReference::new("r");
        let q = sample().with_filter(r.clone(), FilterPredicate::new("r.a < 42"));
        assert_eq!(q.filters_for(&r).map(|p| p.text.as_str()), Some("r.a < 42"));
        assert!(q.filters_for(&TableReference::new("s")).is_none());
    }
}
