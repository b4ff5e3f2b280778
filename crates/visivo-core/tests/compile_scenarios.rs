use std::collections::BTreeSet;

use serde_json::{Value, json};
use visivo_core::error::EntityKind;
use visivo_core::models::{BackendKind, ItemContent, Slot};
use visivo_core::syntax::REF_PATTERN;
use visivo_core::{CompileError, Project, Violation, compile_project};

fn compile(document: Value) -> Result<Project, CompileError> {
    compile_project(document)
}

fn inline_trace_names(project: &Project) -> BTreeSet<String> {
    project
        .trace_objs()
        .into_iter()
        .map(|trace| trace.name.clone())
        .collect()
}

#[test]
fn single_sqlite_target_compiles() {
    let project = compile(json!({
        "targets": [{"name": "local", "database": "target/local.db", "type": "sqlite"}]
    }))
    .expect("single target should compile");

    let target = project.find_target("local").expect("local target");
    assert_eq!(target.kind, BackendKind::Sqlite);
    assert_eq!(target.database, "target/local.db");
}

#[test]
fn chart_and_markdown_on_one_item_is_rejected_with_exact_message() {
    let error = compile(json!({
        "dashboards": [{"name": "d", "rows": [{"items": [
            {"chart": "ref(c)", "markdown": "hi"}
        ]}]}]
    }))
    .expect_err("two content fields must fail");

    assert_eq!(
        error.to_string(),
        "only one of the \"markdown\", \"chart\", or \"table\" properties should be set on an item"
    );
    assert_eq!(error.path(), Some("dashboards[0].rows[0].items[0]"));
}

#[test]
fn malformed_chart_reference_names_the_expected_pattern() {
    let error = compile(json!({
        "dashboards": [{"name": "d", "rows": [{"items": [{"chart": "ref(chart"}]}]}]
    }))
    .expect_err("unbalanced reference must fail");

    assert!(matches!(error, CompileError::ReferenceFormat { ref value, .. } if value == "ref(chart"));
    assert!(
        error.to_string().contains(REF_PATTERN),
        "message should carry the pattern: {error}"
    );
    assert_eq!(error.path(), Some("dashboards[0].rows[0].items[0].chart"));
}

#[test]
fn dashboard_chart_with_missing_trace_is_dangling() {
    let error = compile(json!({
        "dashboards": [{"name": "d", "rows": [{"items": [
            {"chart": {"name": "c", "traces": ["ref(missing)"]}}
        ]}]}]
    }))
    .expect_err("dangling trace must fail");

    assert_eq!(
        error.violations(),
        &[Violation::DanglingReference {
            kind: EntityKind::Trace,
            name: "missing".to_string()
        }]
    );
    assert_eq!(
        error.to_string(),
        "trace 'ref(missing)' does not reference a trace"
    );
}

#[test]
fn duplicate_target_names_fail_on_the_repeat() {
    let error = compile(json!({
        "targets": [
            {"name": "local", "database": "a.db", "type": "sqlite"},
            {"name": "local", "database": "b.db", "type": "sqlite"}
        ]
    }))
    .expect_err("duplicate target must fail");

    assert_eq!(
        error.violations(),
        &[Violation::DuplicateName {
            kind: EntityKind::Target,
            name: "local".to_string()
        }]
    );
}

#[test]
fn declared_columns_compile_and_undeclared_columns_fail() {
    let trace = |prop: &str| {
        json!({
            "traces": [{
                "name": "revenue",
                "base_sql": "select * from sales",
                "columns": {"rev": "sum(revenue)"},
                "props": {"type": "bar", "y": prop}
            }]
        })
    };

    compile(trace("column(rev)")).expect("declared column should compile");

    let error = compile(trace("column(cost)")).expect_err("undeclared column must fail");
    assert!(matches!(
        error,
        CompileError::UnknownColumnReference { ref trace, ref column }
            if trace == "revenue" && column == "cost"
    ));
}

#[test]
fn inline_names_do_not_depend_on_where_traces_are_declared() {
    let flat = compile(json!({
        "traces": [
            {"name": "a", "base_sql": "select 1"},
            {"name": "b", "base_sql": "select 2"}
        ],
        "charts": [{"name": "c", "traces": ["ref(a)", "ref(b)"]}],
        "dashboards": [{"name": "d", "rows": [{"items": [{"chart": "ref(c)"}]}]}]
    }))
    .expect("flat project should compile");

    let nested = compile(json!({
        "dashboards": [{"name": "d", "rows": [{"items": [
            {"chart": {"name": "c", "traces": [{"name": "a", "base_sql": "select 1"}]}},
            {"table": {"name": "t", "trace": {"name": "b", "base_sql": "select 2"}}}
        ]}]}]
    }))
    .expect("nested project should compile");

    assert_eq!(inline_trace_names(&flat), inline_trace_names(&nested));
    assert_eq!(
        flat.chart_objs().len(),
        nested.chart_objs().len(),
        "each layout defines exactly one inline chart"
    );
}

#[test]
fn validation_reports_every_violation() {
    let error = compile(json!({
        "defaults": {"target_name": "prod"},
        "alerts": [{"name": "ops", "type": "console"}, {"name": "ops", "type": "console"}],
        "charts": [{"name": "c", "traces": ["ref(nope)"]}],
        "dashboards": [{"name": "d", "rows": [{"items": [{"chart": "ref(gone)"}]}]}]
    }))
    .expect_err("several violations");

    assert_eq!(
        error.violations(),
        &[
            Violation::DefaultNotFound {
                kind: EntityKind::Target,
                name: "prod".to_string()
            },
            Violation::DanglingReference {
                kind: EntityKind::Trace,
                name: "nope".to_string()
            },
            Violation::DanglingReference {
                kind: EntityKind::Chart,
                name: "gone".to_string()
            },
            Violation::DuplicateName {
                kind: EntityKind::Alert,
                name: "ops".to_string()
            },
        ]
    );
}

#[test]
fn reference_slots_resolve_through_the_project() {
    let project = compile(json!({
        "traces": [{"name": "rev", "base_sql": "select 1", "tests": [
            {"not_null": {"column": "y"}},
            {"not_null": {"column": "x"}}
        ]}],
        "charts": [{"name": "c", "traces": ["ref(rev)"]}],
        "dashboards": [{"name": "d", "rows": [{"items": [{"chart": "ref(c)", "width": 3}]}]}]
    }))
    .expect("project should compile");

    let item = &project.dashboards[0].rows[0].items[0];
    assert_eq!(item.width, 3);
    let Some(ItemContent::Chart(slot)) = &item.content else {
        panic!("item should hold a chart slot");
    };
    assert!(slot.is_reference_form());

    let chart = project.resolve_chart(slot).expect("chart c resolves");
    let Slot::Reference(name) = &chart.traces[0] else {
        panic!("chart trace should be a reference");
    };
    assert_eq!(name, "rev");

    let trace = project.resolve_trace(&chart.traces[0]).expect("trace rev resolves");
    let names = trace
        .all_tests()
        .expect("tests are well formed")
        .into_iter()
        .map(|test| test.name)
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["rev-not_null-1", "rev-not_null-2"]);
}

#[test]
fn filter_traces_matches_inline_names_anywhere() {
    let project = compile(json!({
        "traces": [
            {"name": "revenue_daily", "base_sql": "select 1"},
            {"name": "cost_daily", "base_sql": "select 1"}
        ],
        "tables": [{"name": "t", "trace": {"name": "revenue_weekly", "base_sql": "select 1"}}]
    }))
    .expect("project should compile");

    let names = project
        .filter_traces("^revenue")
        .expect("pattern is valid")
        .into_iter()
        .map(|trace| trace.name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["revenue_daily", "revenue_weekly"]);
    assert!(project.filter_traces("(").is_err());
}

#[test]
fn inline_trace_missing_base_sql_names_the_field() {
    let error = compile(json!({
        "charts": [{"name": "c", "traces": [{"name": "t"}]}]
    }))
    .expect_err("inline trace without base_sql must fail");

    assert!(matches!(error, CompileError::Document(_)));
    assert!(error.to_string().contains("base_sql"), "{error}");
}

#[test]
fn chart_item_with_empty_markdown_compiles() {
    let project = compile(json!({
        "charts": [{"name": "c", "traces": []}],
        "dashboards": [{"name": "d", "rows": [{"items": [{"chart": "ref(c)", "markdown": ""}]}]}]
    }))
    .expect("empty markdown is not a second content field");

    let item = &project.dashboards[0].rows[0].items[0];
    assert!(matches!(item.content, Some(ItemContent::Chart(_))));
}
