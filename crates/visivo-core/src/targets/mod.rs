//! Backend-agnostic query execution.
//!
//! A target's backend kind selects a [`ConnectionStrategy`] from the
//! [`BackendRegistry`]. Every call opens a fresh connection, runs exactly one
//! statement and closes it again; nothing is pooled or shared between calls.

pub mod relational;
pub mod snowflake;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::RunOptions;
use crate::error::ConnectionError;
use crate::models::{BackendKind, Project, Target, Trace};
use crate::query::{Dialect, assemble_trace_query};

pub use relational::RelationalStrategy;
pub use snowflake::SnowflakeStrategy;

pub type Record = Map<String, Value>;

/// Column-named rows returned by one statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Record>,
}

impl QueryRows {
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// An open session against one target.
///
/// `close` must tolerate being called more than once and after the
/// underlying transport has already gone away.
pub trait TargetConnection: Send {
    fn execute(&mut self, sql: &str) -> Result<QueryRows, ConnectionError>;
    fn close(&mut self) -> Result<(), ConnectionError>;
}

pub trait ConnectionStrategy: Send + Sync {
    fn open(&self, target: &Target) -> Result<Box<dyn TargetConnection>, ConnectionError>;
}

/// A connection that lives for exactly one statement and is closed when
/// dropped, whether the statement succeeded or not.
pub struct ScopedConnection {
    target: String,
    connection: Box<dyn TargetConnection>,
}

impl ScopedConnection {
    #[must_use]
    pub fn new(target: &Target, connection: Box<dyn TargetConnection>) -> Self {
        Self {
            target: target.name.clone(),
            connection,
        }
    }

    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn execute(mut self, sql: &str) -> Result<QueryRows, ConnectionError> {
        tracing::debug!(target_name = %self.target, "executing statement");
        self.connection.execute(sql)
    }
}

impl Drop for ScopedConnection {
    fn drop(&mut self) {
        match self.connection.close() {
            Ok(()) => tracing::debug!(target_name = %self.target, "connection closed"),
            Err(error) => {
                tracing::debug!(target_name = %self.target, %error, "connection close failed")
            }
        }
    }
}

/// Maps backend kind keys to connection strategies.
#[derive(Clone)]
pub struct BackendRegistry {
    strategies: BTreeMap<String, Arc<dyn ConnectionStrategy>>,
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::with_default_backends()
    }
}

impl BackendRegistry {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            strategies: BTreeMap::new(),
        }
    }

    /// Registry with the built-in sqlite, postgresql, mysql and snowflake
    /// strategies.
    #[must_use]
    pub fn with_default_backends() -> Self {
        let mut registry = Self::empty();
        for dialect in [Dialect::Sqlite, Dialect::Postgresql, Dialect::Mysql] {
            registry.register(dialect.key(), Arc::new(RelationalStrategy::new(dialect)));
        }
        registry.register(Dialect::Snowflake.key(), Arc::new(SnowflakeStrategy::default()));
        registry
    }

    /// Registers (or replaces) the strategy used for `kind`.
    pub fn register(&mut self, kind: impl Into<String>, strategy: Arc<dyn ConnectionStrategy>) {
        self.strategies.insert(kind.into(), strategy);
    }

    #[must_use]
    pub fn supports(&self, kind: &BackendKind) -> bool {
        self.strategies.contains_key(kind.key())
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.strategies.keys().map(String::as_str)
    }

    pub fn connect(&self, target: &Target) -> Result<ScopedConnection, ConnectionError> {
        if let Some(field) = target.missing_field() {
            return Err(ConnectionError::MissingTargetField {
                target: target.name.clone(),
                field,
            });
        }

        let strategy = self
            .strategies
            .get(target.kind.key())
            .ok_or_else(|| ConnectionError::UnsupportedBackend(target.kind.to_string()))?;

        tracing::debug!(
            target_name = %target.name,
            kind = %target.kind,
            url = %target.display_url(),
            "opening connection"
        );
        let connection = strategy.open(target)?;
        Ok(ScopedConnection::new(target, connection))
    }

    /// Opens a connection, runs `sql` and closes the connection.
    pub fn read_sql(&self, target: &Target, sql: &str) -> Result<QueryRows, ConnectionError> {
        self.connect(target)?.execute(sql)
    }
}

/// Result set of one trace, keyed back to the trace and target it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceData {
    pub trace: String,
    pub target: String,
    pub sql: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cohort_on: Option<String>,
    pub columns: Vec<String>,
    pub rows: Vec<Record>,
}

/// Picks the target a trace runs against: the trace's own `target_name`,
/// then the run-level default, then the project default.
pub fn resolve_target<'a>(
    project: &'a Project,
    trace: &Trace,
    options: &RunOptions,
) -> Result<&'a Target, ConnectionError> {
    let name = trace
        .target_name
        .as_deref()
        .or(options.default_target.as_deref())
        .or(project.default_target_name())
        .ok_or_else(|| ConnectionError::NoTarget {
            trace: trace.name.clone(),
        })?;

    project
        .find_target(name)
        .ok_or_else(|| ConnectionError::UnknownTarget {
            name: name.to_string(),
        })
}

pub fn execute_trace(
    project: &Project,
    trace: &Trace,
    registry: &BackendRegistry,
    options: &RunOptions,
) -> Result<TraceData, ConnectionError> {
    let target = resolve_target(project, trace, options)?;
    let dialect = Dialect::for_backend(&target.kind)
        .ok_or_else(|| ConnectionError::UnsupportedBackend(target.kind.to_string()))?;
    let assembled = assemble_trace_query(trace, dialect)?;

    let rows = registry.read_sql(target, &assembled.sql)?;
    tracing::info!(
        trace = %trace.name,
        target_name = %target.name,
        rows = rows.len(),
        "trace executed"
    );

    Ok(TraceData {
        trace: assembled.trace,
        target: target.name.clone(),
        sql: assembled.sql,
        cohort_on: assembled.cohort_on,
        columns: rows.columns,
        rows: rows.rows,
    })
}
