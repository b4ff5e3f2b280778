//! Entity graph: targets, traces, charts, tables, dashboards, alerts and the
//! project that owns them, plus the raw document shapes they are built from.

pub mod alert;
pub mod chart;
pub mod dashboard;
pub mod document;
pub mod project;
pub mod slot;
pub mod target;
pub mod trace;

pub use alert::{Alert, ConsoleAlert, EmailAlert, SlackAlert};
pub use chart::{Chart, Table, TableColumn};
pub use dashboard::{DEFAULT_ITEM_WIDTH, Dashboard, Item, ItemContent, Row};
pub use document::{
    ChartDocument, DashboardDocument, ItemDocument, ProjectDocument, RowDocument, TableDocument,
    project_document_schema,
};
pub use project::{ChartSlot, Defaults, Project, TableSlot, TraceSlot};
pub use slot::{Named, Slot, SlotDocument};
pub use target::{BackendKind, Secret, Target};
pub use trace::{Trace, TraceTest};
