//! Turns a trace into one executable SQL statement.
//!
//! Query text is never parsed: `query(...)` markers are unwrapped to their raw
//! SQL, `column(name)` markers are replaced by the declared expression, and
//! everything else passes through untouched.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::QueryError;
use crate::models::{BackendKind, Trace};
use crate::syntax::markers::{
    expand_query_markers, substitute_columns, unwrap_query, whole_column,
};

pub const BASE_QUERY_NAME: &str = "base_query";
pub const COHORT_ALIAS: &str = "cohort_on";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    Sqlite,
    Postgresql,
    Mysql,
    Snowflake,
}

impl Dialect {
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Postgresql => "postgresql",
            Self::Mysql => "mysql",
            Self::Snowflake => "snowflake",
        }
    }

    #[must_use]
    pub fn for_backend(kind: &BackendKind) -> Option<Self> {
        match kind {
            BackendKind::Sqlite => Some(Self::Sqlite),
            BackendKind::Postgresql => Some(Self::Postgresql),
            BackendKind::Mysql => Some(Self::Mysql),
            BackendKind::Snowflake => Some(Self::Snowflake),
            BackendKind::Other(_) => None,
        }
    }

    #[must_use]
    pub fn quote_identifier(self, identifier: &str) -> String {
        match self {
            Self::Mysql => format!("`{}`", identifier.replace('`', "``")),
            Self::Sqlite | Self::Postgresql | Self::Snowflake => {
                format!("\"{}\"", identifier.replace('"', "\"\""))
            }
        }
    }
}

impl Display for Dialect {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// One output column: the resolved SQL expression and the result alias it
/// is read back under (`columns.<name>`, `props.<path>` or `cohort_on`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectedExpression {
    pub alias: String,
    pub expression: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssembledQuery {
    pub trace: String,
    pub dialect: Dialect,
    pub sql: String,

    /// Expression the caller partitions rows on after retrieval.
    pub cohort_on: Option<String>,
    pub selected: Vec<SelectedExpression>,
}

pub fn assemble_trace_query(trace: &Trace, dialect: Dialect) -> Result<AssembledQuery, QueryError> {
    let resolver = ExpressionResolver::new(trace);

    let mut selected = Vec::new();
    if let Some(columns) = &trace.columns {
        for (name, expression) in columns {
            selected.push(SelectedExpression {
                alias: format!("columns.{name}"),
                expression: resolver.resolve(expression)?,
            });
        }
    }
    collect_prop_expressions(&resolver, &trace.props, "props", &mut selected)?;

    let cohort_on = trace
        .cohort_on
        .as_deref()
        .map(|expression| resolver.resolve(expression))
        .transpose()?;

    let filters = trace
        .filters
        .iter()
        .map(|filter| resolver.resolve(filter))
        .collect::<Result<Vec<_>, _>>()?;

    let order_by = trace
        .order_by
        .iter()
        .map(|expression| resolver.resolve(expression))
        .collect::<Result<Vec<_>, _>>()?;

    let sql = render_sql(
        dialect,
        &trace.base_sql,
        &selected,
        cohort_on.as_deref(),
        &filters,
        &order_by,
    );

    tracing::debug!(
        trace = %trace.name,
        %dialect,
        selected = selected.len(),
        filters = filters.len(),
        "assembled trace query"
    );

    Ok(AssembledQuery {
        trace: trace.name.clone(),
        dialect,
        sql,
        cohort_on,
        selected,
    })
}

/// Resolves a single marker-bearing expression against a trace's columns.
pub fn resolve_expression(trace: &Trace, text: &str) -> Result<String, QueryError> {
    ExpressionResolver::new(trace).resolve(text)
}

struct ExpressionResolver<'a> {
    trace: &'a str,
    columns: BTreeMap<String, String>,
}

impl<'a> ExpressionResolver<'a> {
    fn new(trace: &'a Trace) -> Self {
        Self {
            trace: &trace.name,
            columns: trace.columns.clone().unwrap_or_default(),
        }
    }

    fn resolve(&self, text: &str) -> Result<String, QueryError> {
        let raw = expand_query_markers(text.trim());
        substitute_columns(&raw, &self.columns).map_err(|column| {
            QueryError::AmbiguousColumnReference {
                trace: self.trace.to_string(),
                column,
            }
        })
    }
}

/// Selects every prop leaf that is wholly a `query(...)` or `column(...)`
/// marker. Other strings (plain values, sliced `column(x)[1:]` forms) are
/// left for the viewer.
fn collect_prop_expressions(
    resolver: &ExpressionResolver<'_>,
    props: &Map<String, Value>,
    prefix: &str,
    selected: &mut Vec<SelectedExpression>,
) -> Result<(), QueryError> {
    let mut keys = props.keys().collect::<Vec<_>>();
    keys.sort();

    for key in keys {
        let path = format!("{prefix}.{key}");
        if let Some(value) = props.get(key) {
            collect_value_expressions(resolver, value, &path, selected)?;
        }
    }
    Ok(())
}

fn collect_value_expressions(
    resolver: &ExpressionResolver<'_>,
    value: &Value,
    path: &str,
    selected: &mut Vec<SelectedExpression>,
) -> Result<(), QueryError> {
    match value {
        Value::String(text) if unwrap_query(text).is_some() || whole_column(text).is_some() => {
            selected.push(SelectedExpression {
                alias: path.to_string(),
                expression: resolver.resolve(text)?,
            });
        }
        Value::Object(map) => collect_prop_expressions(resolver, map, path, selected)?,
        Value::Array(values) => {
            for (index, value) in values.iter().enumerate() {
                collect_value_expressions(resolver, value, &format!("{path}.{index}"), selected)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn render_sql(
    dialect: Dialect,
    base_sql: &str,
    selected: &[SelectedExpression],
    cohort_on: Option<&str>,
    filters: &[String],
    order_by: &[String],
) -> String {
    let base = base_sql.trim().trim_end_matches(';').trim_end();
    let mut lines = vec![format!("WITH {BASE_QUERY_NAME} AS (")];
    lines.extend(base.lines().map(|line| format!("    {line}")));
    lines.push(")".to_string());
    lines.push("SELECT".to_string());

    let mut select_list = selected
        .iter()
        .map(|column| {
            format!(
                "{} AS {}",
                column.expression,
                dialect.quote_identifier(&column.alias)
            )
        })
        .collect::<Vec<_>>();
    if select_list.is_empty() {
        select_list.push("*".to_string());
    }
    if let Some(cohort_on) = cohort_on {
        select_list.push(format!(
            "{cohort_on} AS {}",
            dialect.quote_identifier(COHORT_ALIAS)
        ));
    }
    let last = select_list.len() - 1;
    for (index, entry) in select_list.into_iter().enumerate() {
        let separator = if index == last { "" } else { "," };
        lines.push(format!("    {entry}{separator}"));
    }

    lines.push(format!("FROM {BASE_QUERY_NAME}"));
    if !filters.is_empty() {
        let conditions = filters
            .iter()
            .map(|filter| format!("({filter})"))
            .collect::<Vec<_>>()
            .join(" AND ");
        lines.push(format!("WHERE {conditions}"));
    }
    if !order_by.is_empty() {
        lines.push(format!("ORDER BY {}", order_by.join(", ")));
    }

    lines.join("\n")
}
