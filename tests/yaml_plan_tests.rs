//! YAML plan descriptions compiled for both dialects.

use planhint_core::query::SqlQuery;
use planhint_core::table::TableReference;
use planhint_hints::{hint_provider_for, Dialect, HintError, HintProvider};
use planhint_planner::{parse_yaml_plan, HintType};

fn query() -> SqlQuery {
    SqlQuery::new(
        "*",
        vec![TableReference::new("R"), TableReference::new("S")],
    )
    .with_where("R.a = S.b")
}

#[test]
fn test_yaml_plan_to_postgres_and_mysql() {
    let yaml = r#"
join_order:
  - { table: R, bound: 100 }
  - { table: S, bound: 10000 }
joins:
  - { tables: [R, S], operator: HashJoin }
"#;
    let plan = parse_yaml_plan(yaml).unwrap();

    let pg = hint_provider_for(Dialect::Postgres)
        .adapt_query(&query(), Some(&plan.join_tree), Some(&plan.operators))
        .unwrap();
    assert_eq!(
        pg.hint().unwrap().query_hints,
        "/*+\n  Leading((S R))\n  HashJoin(R S)\n*/"
    );

    let my = hint_provider_for(Dialect::Mysql)
        .adapt_query(&query(), Some(&plan.join_tree), Some(&plan.operators))
        .unwrap();
    assert_eq!(
        my.hint().unwrap().query_hints,
        "/*+\n  JOIN_ORDER(S, R)\n  HASH_JOIN(R, S)\n*/"
    );
}

#[test]
fn test_yaml_settings_become_preparatory_statements() {
    let yaml = r#"
settings:
  HashJoin: disabled
"#;
    let plan = parse_yaml_plan(yaml).unwrap();
    assert!(plan.join_tree.is_empty());

    let pg = hint_provider_for(Dialect::Postgres)
        .adapt_query(&query(), None, Some(&plan.operators))
        .unwrap();
    let hint = pg.hint().unwrap();
    assert_eq!(hint.preparatory_statements, "SET enable_hashjoin = 'off';");
    assert!(hint.query_hints.is_empty());

    let my = hint_provider_for(Dialect::Mysql)
        .adapt_query(&query(), None, Some(&plan.operators))
        .unwrap();
    assert_eq!(
        my.hint().unwrap().preparatory_statements,
        "SET optimizer_switch='hash_join=off';"
    );
}

#[test]
fn test_yaml_cardinalities_only_work_on_postgres() {
    let yaml = r#"
join_order: [R, S]
params:
  cardinalities:
    - { tables: [R, S], rows: 1200 }
"#;
    let plan = parse_yaml_plan(yaml).unwrap();

    let pg = hint_provider_for(Dialect::Postgres)
        .generate_hints(&query(), None, None, Some(&plan.parameters))
        .unwrap();
    assert_eq!(pg.hint().unwrap().query_hints, "/*+\n  Rows(R S #1200)\n*/");

    let result = hint_provider_for(Dialect::Mysql).generate_hints(&query(), None, None, Some(&plan.parameters));
    assert!(matches!(
        result,
        Err(HintError::UnsupportedHint {
            hint: HintType::CardinalityHint,
            ..
        })
    ));
}
