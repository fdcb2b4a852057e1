//! Hint compilation across dialects.

use planhint_core::query::{Explain, SqlQuery};
use planhint_core::table::{TableReference, TableSet};
use planhint_hints::{hint_provider_for, Dialect, HintError, HintProvider, HintTarget};
use planhint_planner::{
    HintType, JoinOperator, JoinTree, OperatorSetting, PhysicalOperator, PhysicalOperatorAssignment,
    PlanParameterization, ScanOperator,
};

fn t(name: &str) -> TableReference {
    TableReference::new(name)
}

fn query() -> SqlQuery {
    SqlQuery::new("COUNT(*)", vec![t("R"), t("S")]).with_where("R.a = S.b")
}

/// (R ⋈ S) with R bounded to 100 rows and S to 10 000.
fn bounded_tree() -> JoinTree {
    JoinTree::joining(JoinTree::for_base_table(t("R")), JoinTree::for_base_table(t("S")))
        .unwrap()
        .with_upper_bound(&TableSet::single(t("R")), 100.0)
        .unwrap()
        .with_upper_bound(&TableSet::single(t("S")), 10_000.0)
        .unwrap()
}

#[test]
fn test_postgres_leading_puts_smaller_input_inner() {
    let provider = hint_provider_for(Dialect::Postgres);
    let hinted = provider.adapt_query(&query(), Some(&bounded_tree()), None).unwrap();
    assert_eq!(hinted.hint().unwrap().query_hints, "/*+\n  Leading((S R))\n*/");
}

#[test]
fn test_mysql_hash_join_hint() {
    let mut ops = PhysicalOperatorAssignment::new();
    ops.add_join_operator(JoinOperator::HashJoin, vec![t("R"), t("S")]).unwrap();
    let provider = hint_provider_for(Dialect::Mysql);
    let hinted = provider.adapt_query(&query(), None, Some(&ops)).unwrap();
    assert!(hinted.hint().unwrap().query_hints.contains("HASH_JOIN(R, S)"));
    assert_eq!(
        provider.format_query(&hinted),
        "/*+\n  HASH_JOIN(R, S)\n*/\nSELECT COUNT(*) FROM R, S WHERE R.a = S.b;"
    );
}

#[test]
fn test_supports_hint_is_a_pure_lookup() {
    let mysql = hint_provider_for(Dialect::Mysql);
    let postgres = hint_provider_for(Dialect::Postgres);
    let nlj = HintTarget::Operator(PhysicalOperator::Join(JoinOperator::NestedLoopJoin));
    let bnl = HintTarget::Operator(PhysicalOperator::Join(JoinOperator::BlockNestedLoopJoin));
    assert!(!mysql.supports_hint(nlj));
    assert!(mysql.supports_hint(bnl));
    assert!(postgres.supports_hint(nlj));
    assert!(!postgres.supports_hint(bnl));
    assert!(!mysql.supports_hint(HintTarget::Plan(HintType::CardinalityHint)));
}

#[test]
fn test_nothing_to_emit_returns_query_unchanged() {
    for dialect in [Dialect::Postgres, Dialect::Mysql] {
        let provider = hint_provider_for(dialect);
        let single = JoinTree::for_base_table(t("R"));
        let out = provider
            .generate_hints(&query(), Some(&single), None, Some(&PlanParameterization::new()))
            .unwrap();
        assert_eq!(out, query());
        assert!(out.hint().is_none());
    }
}

#[test]
fn test_postgres_all_stages_in_order() {
    let mut ops = PhysicalOperatorAssignment::new();
    ops.add_join_operator(JoinOperator::HashJoin, vec![t("R"), t("S")]).unwrap();
    ops.add_scan_operator(ScanOperator::SequentialScan, vec![t("R")]).unwrap();
    ops.set_operator_enabled(JoinOperator::NestedLoopJoin, OperatorSetting::Disabled);
    let mut params = PlanParameterization::new();
    params.add_cardinality_hint(vec![t("S"), t("R")], 500).unwrap();

    let provider = hint_provider_for(Dialect::Postgres);
    let hinted = provider
        .generate_hints(&query(), Some(&bounded_tree()), Some(&ops), Some(&params))
        .unwrap();
    assert_eq!(
        provider.format_query(&hinted),
        "SET enable_nestloop = 'off';\n\
         /*+\n  Leading((S R))\n  SeqScan(R)\n  HashJoin(R S)\n  Rows(R S #500)\n*/\n\
         SELECT COUNT(*) FROM R, S WHERE R.a = S.b;"
    );

    // Hinting twice replaces the clause instead of stacking it.
    let again = provider
        .generate_hints(&hinted, Some(&bounded_tree()), Some(&ops), Some(&params))
        .unwrap();
    assert_eq!(again, hinted);
}

#[test]
fn test_join_key_outside_tree_is_rejected() {
    let mut ops = PhysicalOperatorAssignment::new();
    ops.add_join_operator(JoinOperator::HashJoin, vec![t("R"), t("T")]).unwrap();
    for dialect in [Dialect::Postgres, Dialect::Mysql] {
        let result = hint_provider_for(dialect).adapt_query(&query(), Some(&bounded_tree()), Some(&ops));
        assert!(matches!(result, Err(HintError::AssignmentMismatch(_))));
    }
}

#[test]
fn test_explain_rendering_differs_per_dialect() {
    let q = query().with_explain(Explain::plan("JSON"));
    assert!(hint_provider_for(Dialect::Postgres)
        .format_query(&q)
        .starts_with("EXPLAIN (FORMAT JSON) SELECT"));
    assert!(hint_provider_for(Dialect::Mysql)
        .format_query(&q)
        .starts_with("EXPLAIN FORMAT = JSON SELECT"));
}
