use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::syntax::REF_PATTERN;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Target,
    Alert,
    Dashboard,
    Chart,
    Table,
    Trace,
}

impl EntityKind {
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Target => "target",
            Self::Alert => "alert",
            Self::Dashboard => "dashboard",
            Self::Chart => "chart",
            Self::Table => "table",
            Self::Trace => "trace",
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReferenceError {
    #[error("`{value}` does not match regex \"{}\"", REF_PATTERN)]
    Malformed { value: String },
}

/// A whole-graph integrity violation found after the project is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "violation", rename_all = "snake_case")]
pub enum Violation {
    #[error("default {kind} '{name}' does not exist")]
    DefaultNotFound { kind: EntityKind, name: String },

    #[error("{kind} 'ref({name})' does not reference a {kind}")]
    DanglingReference { kind: EntityKind, name: String },

    #[error("{kind} name '{name}' is not unique in the project")]
    DuplicateName { kind: EntityKind, name: String },
}

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("invalid project document: {0}")]
    Document(#[from] serde_json::Error),

    #[error("string does not match regex \"{}\"", REF_PATTERN)]
    ReferenceFormat { path: String, value: String },

    #[error("only one of the \"markdown\", \"chart\", or \"table\" properties should be set on an item")]
    MutuallyExclusiveFields { path: String },

    #[error("referenced column name '{column}' is not in columns definition")]
    UnknownColumnReference { trace: String, column: String },

    #[error("target '{target}' is missing required field `{field}`")]
    MissingTargetField { target: String, field: &'static str },

    #[error("test in {trace} {detail}")]
    InvalidTestConfiguration { trace: String, detail: String },

    #[error("{}", summarize_violations(.violations))]
    Invalid { violations: Vec<Violation> },
}

impl CompileError {
    /// Document path of the entity that failed a local check, when known.
    #[must_use]
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::ReferenceFormat { path, .. } | Self::MutuallyExclusiveFields { path } => {
                Some(path)
            }
            _ => None,
        }
    }

    #[must_use]
    pub fn violations(&self) -> &[Violation] {
        match self {
            Self::Invalid { violations } => violations,
            _ => &[],
        }
    }
}

fn summarize_violations(violations: &[Violation]) -> String {
    match violations {
        [] => "project failed validation".to_string(),
        [only] => only.to_string(),
        [first, rest @ ..] => format!("{first} (and {} more violation(s))", rest.len()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("trace '{trace}' references column '{column}' with no entry in columns")]
    AmbiguousColumnReference { trace: String, column: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("no connection strategy registered for backend `{0}`")]
    UnsupportedBackend(String),

    #[error("target '{target}' is missing required field `{field}`")]
    MissingTargetField { target: String, field: &'static str },

    #[error("trace '{trace}' has no target; set target_name or a default target")]
    NoTarget { trace: String },

    #[error("target '{name}' does not exist in the project")]
    UnknownTarget { name: String },

    #[error("failed to connect to target '{target}'")]
    Connect {
        target: String,
        #[source]
        source: BoxError,
    },

    #[error("query failed on target '{target}'")]
    Query {
        target: String,
        #[source]
        source: BoxError,
    },

    #[error("driver runtime failed for target '{target}'")]
    Runtime {
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Assemble(#[from] QueryError),
}

impl ConnectionError {
    pub(crate) fn connect(target: &str, source: impl Into<BoxError>) -> Self {
        Self::Connect {
            target: target.to_string(),
            source: source.into(),
        }
    }

    pub(crate) fn query(target: &str, source: impl Into<BoxError>) -> Self {
        Self::Query {
            target: target.to_string(),
            source: source.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CompileError, EntityKind, Violation};

    #[test]
    fn mutual_exclusion_message_is_exact() {
        let error = CompileError::MutuallyExclusiveFields {
            path: "dashboards[0].rows[0].items[0]".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "only one of the \"markdown\", \"chart\", or \"table\" properties should be set on an item"
        );
        assert_eq!(error.path(), Some("dashboards[0].rows[0].items[0]"));
    }

    #[test]
    fn violation_messages_name_kind_and_entity() {
        let dangling = Violation::DanglingReference {
            kind: EntityKind::Trace,
            name: "missing".to_string(),
        };
        assert_eq!(
            dangling.to_string(),
            "trace 'ref(missing)' does not reference a trace"
        );

        let duplicate = Violation::DuplicateName {
            kind: EntityKind::Target,
            name: "local".to_string(),
        };
        assert_eq!(
            duplicate.to_string(),
            "target name 'local' is not unique in the project"
        );
    }

    #[test]
    fn invalid_summary_counts_extra_violations() {
        let error = CompileError::Invalid {
            violations: vec![
                Violation::DefaultNotFound {
                    kind: EntityKind::Target,
                    name: "prod".to_string(),
                },
                Violation::DefaultNotFound {
                    kind: EntityKind::Alert,
                    name: "pager".to_string(),
                },
            ],
        };
        assert_eq!(
            error.to_string(),
            "default target 'prod' does not exist (and 1 more violation(s))"
        );
        assert_eq!(error.violations().len(), 2);
    }
}
