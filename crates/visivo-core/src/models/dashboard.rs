use serde::Serialize;

use super::chart::{Chart, Table};
use super::slot::{Named, Slot};
use super::trace::Trace;

pub const DEFAULT_ITEM_WIDTH: u32 = 1;

/// What a dashboard cell displays. An item holds at most one of these.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemContent {
    Chart(Slot<Chart>),
    Table(Slot<Table>),
    Markdown(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Item {
    pub width: u32,

    #[serde(flatten)]
    pub content: Option<ItemContent>,
}

impl Item {
    #[must_use]
    pub fn chart(&self) -> Option<&Slot<Chart>> {
        match &self.content {
            Some(ItemContent::Chart(chart)) => Some(chart),
            _ => None,
        }
    }

    #[must_use]
    pub fn table(&self) -> Option<&Slot<Table>> {
        match &self.content {
            Some(ItemContent::Table(table)) => Some(table),
            _ => None,
        }
    }

    #[must_use]
    pub fn markdown(&self) -> Option<&str> {
        match &self.content {
            Some(ItemContent::Markdown(text)) => Some(text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub name: String,
    pub rows: Vec<Row>,
}

impl Named for Dashboard {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Dashboard {
    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.rows.iter().flat_map(|row| row.items.iter())
    }

    /// Chart slots placed directly in this dashboard's items.
    pub fn all_charts(&self) -> impl Iterator<Item = &Slot<Chart>> {
        self.items().filter_map(Item::chart)
    }

    pub fn all_tables(&self) -> impl Iterator<Item = &Slot<Table>> {
        self.items().filter_map(Item::table)
    }

    /// Trace slots reachable through inline charts and tables.
    pub fn all_traces(&self) -> impl Iterator<Item = &Slot<Trace>> {
        let chart_traces = self
            .all_charts()
            .filter_map(Slot::inline)
            .flat_map(|chart| chart.traces.iter());
        let table_traces = self
            .all_tables()
            .filter_map(Slot::inline)
            .map(|table| &table.trace);
        chart_traces.chain(table_traces)
    }

    #[must_use]
    pub fn find_trace(&self, name: &str) -> Option<&Trace> {
        self.all_traces()
            .filter_map(Slot::inline)
            .find(|trace| trace.name == name)
    }
}
