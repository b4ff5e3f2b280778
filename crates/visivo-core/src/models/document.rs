use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::alert::Alert;
use super::chart::TableColumn;
use super::project::Defaults;
use super::slot::SlotDocument;
use super::target::Target;
use super::trace::Trace;

/// Nested mapping accepted by the compiler, before references are checked.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ProjectDocument {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub defaults: Option<Defaults>,

    #[serde(default)]
    pub targets: Vec<Target>,

    #[serde(default)]
    pub alerts: Vec<Alert>,

    #[serde(default)]
    pub dashboards: Vec<DashboardDocument>,

    #[serde(default)]
    pub charts: Vec<ChartDocument>,

    #[serde(default)]
    pub tables: Vec<TableDocument>,

    #[serde(default)]
    pub traces: Vec<Trace>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct DashboardDocument {
    pub name: String,

    #[serde(default)]
    pub rows: Vec<RowDocument>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct RowDocument {
    #[serde(default)]
    pub items: Vec<ItemDocument>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ItemDocument {
    #[serde(default)]
    pub width: Option<u32>,

    #[serde(default)]
    pub chart: Option<SlotDocument<ChartDocument>>,

    #[serde(default)]
    pub table: Option<SlotDocument<TableDocument>>,

    #[serde(default)]
    pub markdown: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ChartDocument {
    pub name: String,

    #[serde(default)]
    pub traces: Vec<SlotDocument<Trace>>,

    #[serde(default)]
    pub layout: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct TableDocument {
    pub name: String,
    pub trace: SlotDocument<Trace>,

    #[serde(default)]
    pub columns: Vec<TableColumn>,
}

#[must_use]
pub fn project_document_schema() -> Value {
    let schema = schemars::schema_for!(ProjectDocument);
    serde_json::to_value(schema).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ItemDocument, ProjectDocument, project_document_schema};
    use crate::models::SlotDocument;

    #[test]
    fn empty_mapping_is_an_empty_document() {
        let document: ProjectDocument =
            serde_json::from_value(json!({})).expect("empty document should deserialize");
        assert_eq!(document, ProjectDocument::default());
    }

    #[test]
    fn slot_accepts_string_or_object() {
        let by_ref: ItemDocument =
            serde_json::from_value(json!({"chart": "ref(c)"})).expect("ref item");
        assert!(matches!(by_ref.chart, Some(SlotDocument::Text(ref text)) if text == "ref(c)"));

        let inline: ItemDocument = serde_json::from_value(json!({
            "chart": {"name": "c", "traces": ["ref(t)"]}
        }))
        .expect("inline item");
        assert!(matches!(inline.chart, Some(SlotDocument::Inline(_))));
    }

    #[test]
    fn unknown_top_level_key_is_rejected() {
        let result = serde_json::from_value::<ProjectDocument>(json!({"dashbaords": []}));
        assert!(result.is_err());
    }

    #[test]
    fn schema_lists_top_level_collections() {
        let schema = project_document_schema();
        let properties = schema
            .get("properties")
            .and_then(|value| value.as_object())
            .expect("schema should describe properties");
        for key in ["defaults", "targets", "alerts", "dashboards", "charts", "tables", "traces"] {
            assert!(properties.contains_key(key), "missing {key}");
        }
    }
}
