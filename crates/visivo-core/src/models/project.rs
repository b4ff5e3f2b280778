use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::alert::Alert;
use super::chart::{Chart, Table};
use super::dashboard::Dashboard;
use super::slot::{Named, Slot};
use super::target::Target;
use super::trace::Trace;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Defaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert_name: Option<String>,
}

/// Root of the compiled graph. Owns every entity by value; reference slots
/// are lookup keys into the flattened namespaces exposed here.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Project {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaults: Option<Defaults>,
    pub targets: Vec<Target>,
    pub alerts: Vec<Alert>,
    pub dashboards: Vec<Dashboard>,
    pub charts: Vec<Chart>,
    pub tables: Vec<Table>,
    pub traces: Vec<Trace>,
}

impl Project {
    /// Every trace slot reachable from the project, top-level traces first.
    #[must_use]
    pub fn all_trace_slots(&self) -> Vec<TraceSlot<'_>> {
        let mut slots = self
            .traces
            .iter()
            .map(TraceSlot::TopLevel)
            .collect::<Vec<_>>();
        slots.extend(self.tables.iter().map(|table| TraceSlot::Nested(&table.trace)));
        slots.extend(
            self.charts
                .iter()
                .flat_map(|chart| chart.traces.iter())
                .map(TraceSlot::Nested),
        );
        slots.extend(
            self.dashboards
                .iter()
                .flat_map(Dashboard::all_traces)
                .map(TraceSlot::Nested),
        );
        slots
    }

    #[must_use]
    pub fn all_chart_slots(&self) -> Vec<ChartSlot<'_>> {
        let mut slots = self
            .charts
            .iter()
            .map(ChartSlot::TopLevel)
            .collect::<Vec<_>>();
        slots.extend(
            self.dashboards
                .iter()
                .flat_map(Dashboard::all_charts)
                .map(ChartSlot::Nested),
        );
        slots
    }

    #[must_use]
    pub fn all_table_slots(&self) -> Vec<TableSlot<'_>> {
        let mut slots = self
            .tables
            .iter()
            .map(TableSlot::TopLevel)
            .collect::<Vec<_>>();
        slots.extend(
            self.dashboards
                .iter()
                .flat_map(Dashboard::all_tables)
                .map(TableSlot::Nested),
        );
        slots
    }

    #[must_use]
    pub fn trace_objs(&self) -> Vec<&Trace> {
        self.all_trace_slots()
            .into_iter()
            .filter_map(TraceSlot::inline)
            .collect()
    }

    #[must_use]
    pub fn trace_refs(&self) -> Vec<&str> {
        self.all_trace_slots()
            .into_iter()
            .filter_map(TraceSlot::reference)
            .collect()
    }

    #[must_use]
    pub fn chart_objs(&self) -> Vec<&Chart> {
        self.all_chart_slots()
            .into_iter()
            .filter_map(ChartSlot::inline)
            .collect()
    }

    #[must_use]
    pub fn chart_refs(&self) -> Vec<&str> {
        self.all_chart_slots()
            .into_iter()
            .filter_map(ChartSlot::reference)
            .collect()
    }

    #[must_use]
    pub fn table_objs(&self) -> Vec<&Table> {
        self.all_table_slots()
            .into_iter()
            .filter_map(TableSlot::inline)
            .collect()
    }

    #[must_use]
    pub fn table_refs(&self) -> Vec<&str> {
        self.all_table_slots()
            .into_iter()
            .filter_map(TableSlot::reference)
            .collect()
    }

    /// Inline traces whose name matches `pattern` anywhere.
    pub fn filter_traces(&self, pattern: &str) -> Result<Vec<&Trace>, regex::Error> {
        let regex = Regex::new(pattern)?;
        Ok(self
            .trace_objs()
            .into_iter()
            .filter(|trace| regex.is_match(&trace.name))
            .collect())
    }

    #[must_use]
    pub fn find_trace(&self, name: &str) -> Option<&Trace> {
        self.trace_objs().into_iter().find(|trace| trace.name == name)
    }

    #[must_use]
    pub fn find_target(&self, name: &str) -> Option<&Target> {
        self.targets.iter().find(|target| target.name == name)
    }

    #[must_use]
    pub fn find_chart(&self, name: &str) -> Option<&Chart> {
        self.chart_objs().into_iter().find(|chart| chart.name == name)
    }

    #[must_use]
    pub fn find_table(&self, name: &str) -> Option<&Table> {
        self.table_objs().into_iter().find(|table| table.name == name)
    }

    #[must_use]
    pub fn find_alert(&self, name: &str) -> Option<&Alert> {
        self.alerts.iter().find(|alert| alert.name() == name)
    }

    #[must_use]
    pub fn find_dashboard(&self, name: &str) -> Option<&Dashboard> {
        self.dashboards
            .iter()
            .find(|dashboard| dashboard.name == name)
    }

    /// Follows a reference slot to its inline definition.
    #[must_use]
    pub fn resolve_trace<'a>(&'a self, slot: &'a Slot<Trace>) -> Option<&'a Trace> {
        match slot {
            Slot::Inline(trace) => Some(trace),
            Slot::Reference(name) => self.find_trace(name),
        }
    }

    #[must_use]
    pub fn resolve_chart<'a>(&'a self, slot: &'a Slot<Chart>) -> Option<&'a Chart> {
        match slot {
            Slot::Inline(chart) => Some(chart),
            Slot::Reference(name) => self.find_chart(name),
        }
    }

    #[must_use]
    pub fn resolve_table<'a>(&'a self, slot: &'a Slot<Table>) -> Option<&'a Table> {
        match slot {
            Slot::Inline(table) => Some(table),
            Slot::Reference(name) => self.find_table(name),
        }
    }

    #[must_use]
    pub fn default_target_name(&self) -> Option<&str> {
        self.defaults.as_ref()?.target_name.as_deref()
    }

    #[must_use]
    pub fn default_alert_name(&self) -> Option<&str> {
        self.defaults.as_ref()?.alert_name.as_deref()
    }
}

macro_rules! located_slot {
    ($name:ident, $entity:ty) => {
        /// A slot found while walking the project: either a top-level
        /// definition or a slot nested inside another entity.
        #[derive(Debug, Clone, Copy, PartialEq)]
        pub enum $name<'a> {
            TopLevel(&'a $entity),
            Nested(&'a Slot<$entity>),
        }

        impl<'a> $name<'a> {
            #[must_use]
            pub fn inline(self) -> Option<&'a $entity> {
                match self {
                    Self::TopLevel(entity) => Some(entity),
                    Self::Nested(slot) => slot.inline(),
                }
            }

            #[must_use]
            pub fn reference(self) -> Option<&'a str> {
                match self {
                    Self::TopLevel(_) => None,
                    Self::Nested(slot) => slot.reference(),
                }
            }

            #[must_use]
            pub fn resolved_name(self) -> &'a str {
                match self {
                    Self::TopLevel(entity) => entity.name(),
                    Self::Nested(slot) => slot.resolved_name(),
                }
            }
        }
    };
}

located_slot!(TraceSlot, Trace);
located_slot!(ChartSlot, Chart);
located_slot!(TableSlot, Table);
