use serde::Serialize;
use serde_json::{Map, Value};

use super::slot::{Named, Slot};
use super::trace::Trace;

/// Groups one or more traces under a shared layout.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chart {
    pub name: String,
    pub traces: Vec<Slot<Trace>>,

    /// Free-form plotly layout configuration.
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub layout: Map<String, Value>,
}

impl Named for Chart {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Chart {
    pub fn trace_objs(&self) -> impl Iterator<Item = &Trace> {
        self.traces.iter().filter_map(Slot::inline)
    }

    pub fn trace_refs(&self) -> impl Iterator<Item = &str> {
        self.traces.iter().filter_map(Slot::reference)
    }

    #[must_use]
    pub fn find_trace(&self, name: &str) -> Option<&Trace> {
        self.trace_objs().find(|trace| trace.name == name)
    }
}

/// One column of a table: the header shown and the result column it reads.
#[derive(Debug, Clone, PartialEq, Serialize, serde::Deserialize, schemars::JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct TableColumn {
    pub header: String,
    pub column: String,
}

/// Tabular display of a single trace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    pub name: String,
    pub trace: Slot<Trace>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<TableColumn>,
}

impl Named for Table {
    fn name(&self) -> &str {
        &self.name
    }
}
