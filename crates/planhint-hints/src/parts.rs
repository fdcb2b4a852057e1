//! Intermediate hint fragments collected by the compile stages.

use planhint_core::query::HintClause;

/// Settings (standalone statements) and inline hints of one or more stages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HintParts {
    settings: Vec<String>,
    hints: Vec<String>,
}

impl HintParts {
    pub fn new(settings: Vec<String>, hints: Vec<String>) -> Self {
        Self { settings, hints }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.settings.is_empty() && self.hints.is_empty()
    }

    pub fn settings(&self) -> &[String] {
        &self.settings
    }

    pub fn hints(&self) -> &[String] {
        &self.hints
    }

    /// Append the elements of `other` that are not present in `self` yet.
    /// Both sides keep their order.
    pub fn merge_with(&self, other: &HintParts) -> HintParts {
        let settings = self
            .settings
            .iter()
            .chain(other.settings.iter().filter(|s| !self.settings.contains(s)))
            .cloned()
            .collect();
        let hints = self
            .hints
            .iter()
            .chain(other.hints.iter().filter(|h| !self.hints.contains(h)))
            .cloned()
            .collect();
        HintParts { settings, hints }
    }

    /// Settings one per line; hints inside a `/*+ ... */` block, one per
    /// indented line. `None` when there is nothing to emit.
    pub fn to_hint_clause(&self) -> Option<HintClause> {
        if self.is_empty() {
            return None;
        }
        let settings = self.settings.join("\n");
        let hints = if self.hints.is_empty() {
            String::new()
        } else {
            let mut block = String::from("/*+\n");
            for hint in &self.hints {
                block.push_str("  ");
                block.push_str(hint);
                block.push('\n');
            }
            block.push_str("*/");
            block
        };
        Some(HintClause::new(settings, hints))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(settings: &[&str], hints: &[&str]) -> HintParts {
        HintParts::new(
            settings.iter().map(|s| s.to_string()).collect(),
            hints.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[test]
    fn test_merge_appends_missing_in_order() {
        let a = parts(&["SET a;"], &["X(r)", "Y(s)"]);
        let b = parts(&["SET b;", "SET a;"], &["Y(s)", "Z(t)"]);
        let merged = a.merge_with(&b);
        assert_eq!(merged.settings(), &["SET a;", "SET b;"]);
        assert_eq!(merged.hints(), &["X(r)", "Y(s)", "Z(t)"]);
    }

    #[test]
    fn test_merge_is_idempotent_and_associative() {
        let a = parts(&["SET a;"], &["X(r)"]);
        let b = parts(&["SET b;"], &["X(r)", "Y(s)"]);
        let c = parts(&[], &["Z(t)", "X(r)"]);
        assert_eq!(a.merge_with(&a), a);
        assert_eq!(
            a.merge_with(&b).merge_with(&c),
            a.merge_with(&b.merge_with(&c))
        );
        assert_eq!(HintParts::empty().merge_with(&a), a);
    }

    #[test]
    fn test_hint_clause_layout() {
        assert!(HintParts::empty().to_hint_clause().is_none());

        let clause = parts(&["SET x = 'off';"], &["SeqScan(r)", "HashJoin(r s)"])
            .to_hint_clause()
            .unwrap();
        assert_eq!(clause.preparatory_statements, "SET x = 'off';");
        assert_eq!(clause.query_hints, "/*+\n  SeqScan(r)\n  HashJoin(r s)\n*/");

        let settings_only = parts(&["SET a;", "SET b;"], &[]).to_hint_clause().unwrap();
        assert_eq!(settings_only.preparatory_statements, "SET a;\nSET b;");
        assert!(settings_only.query_hints.is_empty());
    }
}
