use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::slot::Named;
use crate::error::CompileError;
use crate::syntax::markers::column_references_in_value;

/// A named query plus the visual encoding of its result.
///
/// `props` values may embed `column(name)` markers pointing into `columns`
/// and `query(sql)` markers holding raw SQL fragments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Trace {
    pub name: String,

    /// Overrides run-level and project default targets for this trace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_name: Option<String>,

    pub base_sql: String,

    /// Column or `query()` expression used to split rows into series.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cohort_on: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order_by: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tests: Vec<Map<String, Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<BTreeMap<String, String>>,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub props: Map<String, Value>,
}

impl Named for Trace {
    fn name(&self) -> &str {
        &self.name
    }
}

/// One assertion declared on a trace, expanded from its single-key mapping.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceTest {
    pub name: String,
    pub kind: String,
    pub kwargs: Value,
}

impl Trace {
    /// Every `column(name)` in `props` must be declared in `columns`.
    ///
    /// Traces without a `columns` block are not checked.
    pub fn check_column_references(&self) -> Result<(), CompileError> {
        let Some(columns) = &self.columns else {
            return Ok(());
        };

        for value in self.props.values() {
            if let Some(column) = column_references_in_value(value)
                .into_iter()
                .find(|name| !columns.contains_key(name))
            {
                return Err(CompileError::UnknownColumnReference {
                    trace: self.name.clone(),
                    column,
                });
            }
        }

        Ok(())
    }

    /// Expands `tests` into named assertions, numbering each type from 1.
    pub fn all_tests(&self) -> Result<Vec<TraceTest>, CompileError> {
        let mut counters = BTreeMap::<&str, usize>::new();
        let mut tests = Vec::with_capacity(self.tests.len());

        for test in &self.tests {
            let mut entries = test.iter();
            let (Some((kind, kwargs)), None) = (entries.next(), entries.next()) else {
                return Err(CompileError::InvalidTestConfiguration {
                    trace: self.name.clone(),
                    detail: format!("must have exactly one type key, found {}", test.len()),
                });
            };

            let counter = counters.entry(kind.as_str()).or_default();
            *counter += 1;
            tests.push(TraceTest {
                name: format!("{}-{}-{}", self.name, kind, counter),
                kind: kind.clone(),
                kwargs: kwargs.clone(),
            });
        }

        Ok(tests)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::Trace;
    use crate::error::CompileError;

    fn trace(value: serde_json::Value) -> Trace {
        serde_json::from_value(value).expect("trace should deserialize")
    }

    #[test]
    fn declared_column_reference_passes() {
        let trace = trace(json!({
            "name": "revenue",
            "base_sql": "select * from sales",
            "columns": {"rev": "sum(revenue)"},
            "props": {"y": "column(rev)"}
        }));
        assert!(trace.check_column_references().is_ok());
    }

    #[test]
    fn undeclared_column_reference_names_identifier() {
        let trace = trace(json!({
            "name": "revenue",
            "base_sql": "select * from sales",
            "columns": {"rev": "sum(revenue)"},
            "props": {"y": "column(cost)"}
        }));
        let error = trace
            .check_column_references()
            .expect_err("cost is not declared");
        assert!(matches!(
            error,
            CompileError::UnknownColumnReference { ref column, .. } if column == "cost"
        ));
    }

    #[test]
    fn tests_are_numbered_per_type() {
        let trace = trace(json!({
            "name": "fib",
            "base_sql": "select 1",
            "tests": [
                {"not_null": {"attributes": ["y"]}},
                {"coordinate_exists": {"coordinates": {"x": 1}}},
                {"not_null": {"attributes": ["x"]}}
            ]
        }));
        let names = trace
            .all_tests()
            .expect("tests should expand")
            .into_iter()
            .map(|test| test.name)
            .collect::<Vec<_>>();
        assert_eq!(
            names,
            vec!["fib-not_null-1", "fib-coordinate_exists-1", "fib-not_null-2"]
        );
    }

    #[test]
    fn test_with_two_type_keys_is_rejected() {
        let trace = trace(json!({
            "name": "fib",
            "base_sql": "select 1",
            "tests": [{"not_null": {}, "coordinate_exists": {}}]
        }));
        let error = trace.all_tests().expect_err("two keys must fail");
        assert!(error.to_string().contains("exactly one type key"));
    }
}
