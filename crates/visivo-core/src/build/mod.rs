//! Builds the entity graph from a project document, running only the checks
//! an entity can make about itself: reference string format, item content
//! exclusivity, trace column references, trace test shape and per-backend
//! target fields. Cross-entity checks belong to [`crate::validate`].

use crate::error::CompileError;
use crate::models::{
    Chart, ChartDocument, DEFAULT_ITEM_WIDTH, Dashboard, DashboardDocument, Item, ItemContent,
    ItemDocument, Project, ProjectDocument, Row, RowDocument, Slot, SlotDocument, Table,
    TableDocument, Target, Trace,
};
use crate::syntax::extract_name;

pub fn build_project(document: ProjectDocument) -> Result<Project, CompileError> {
    let ProjectDocument {
        name,
        defaults,
        targets,
        alerts,
        dashboards,
        charts,
        tables,
        traces,
    } = document;

    for target in &targets {
        check_target(target)?;
    }

    let traces = traces
        .into_iter()
        .map(check_trace)
        .collect::<Result<Vec<_>, _>>()?;

    let charts = charts
        .into_iter()
        .enumerate()
        .map(|(index, chart)| build_chart(chart, &format!("charts[{index}]")))
        .collect::<Result<Vec<_>, _>>()?;

    let tables = tables
        .into_iter()
        .enumerate()
        .map(|(index, table)| build_table(table, &format!("tables[{index}]")))
        .collect::<Result<Vec<_>, _>>()?;

    let dashboards = dashboards
        .into_iter()
        .enumerate()
        .map(|(index, dashboard)| build_dashboard(dashboard, &format!("dashboards[{index}]")))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Project {
        name,
        defaults,
        targets,
        alerts,
        dashboards,
        charts,
        tables,
        traces,
    })
}

pub fn check_target(target: &Target) -> Result<(), CompileError> {
    match target.missing_field() {
        Some(field) => Err(CompileError::MissingTargetField {
            target: target.name.clone(),
            field,
        }),
        None => Ok(()),
    }
}

fn check_trace(trace: Trace) -> Result<Trace, CompileError> {
    trace.check_column_references()?;
    trace.all_tests()?;
    Ok(trace)
}

fn build_dashboard(document: DashboardDocument, path: &str) -> Result<Dashboard, CompileError> {
    let rows = document
        .rows
        .into_iter()
        .enumerate()
        .map(|(index, row)| build_row(row, &format!("{path}.rows[{index}]")))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Dashboard {
        name: document.name,
        rows,
    })
}

fn build_row(document: RowDocument, path: &str) -> Result<Row, CompileError> {
    let items = document
        .items
        .into_iter()
        .enumerate()
        .map(|(index, item)| build_item(item, &format!("{path}.items[{index}]")))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Row { items })
}

fn build_item(document: ItemDocument, path: &str) -> Result<Item, CompileError> {
    let ItemDocument {
        width,
        chart,
        table,
        markdown,
    } = document;
    let markdown = markdown.filter(|text| !text.is_empty());

    let content = match (chart, table, markdown) {
        (None, None, None) => None,
        (Some(chart), None, None) => Some(ItemContent::Chart(build_slot(
            chart,
            &format!("{path}.chart"),
            build_chart,
        )?)),
        (None, Some(table), None) => Some(ItemContent::Table(build_slot(
            table,
            &format!("{path}.table"),
            build_table,
        )?)),
        (None, None, Some(markdown)) => Some(ItemContent::Markdown(markdown)),
        _ => {
            return Err(CompileError::MutuallyExclusiveFields {
                path: path.to_string(),
            });
        }
    };

    Ok(Item {
        width: width.unwrap_or(DEFAULT_ITEM_WIDTH),
        content,
    })
}

fn build_chart(document: ChartDocument, path: &str) -> Result<Chart, CompileError> {
    let traces = document
        .traces
        .into_iter()
        .enumerate()
        .map(|(index, slot)| {
            build_slot(slot, &format!("{path}.traces[{index}]"), |trace, _| {
                check_trace(trace)
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Chart {
        name: document.name,
        traces,
        layout: document.layout,
    })
}

fn build_table(document: TableDocument, path: &str) -> Result<Table, CompileError> {
    let trace = build_slot(document.trace, &format!("{path}.trace"), |trace, _| {
        check_trace(trace)
    })?;

    Ok(Table {
        name: document.name,
        trace,
        columns: document.columns,
    })
}

fn build_slot<D, T>(
    document: SlotDocument<D>,
    path: &str,
    build: impl FnOnce(D, &str) -> Result<T, CompileError>,
) -> Result<Slot<T>, CompileError> {
    match document {
        SlotDocument::Text(value) => match extract_name(&value) {
            Ok(name) => Ok(Slot::Reference(name.to_string())),
            Err(_) => Err(CompileError::ReferenceFormat {
                path: path.to_string(),
                value,
            }),
        },
        SlotDocument::Inline(entity) => build(entity, path).map(Slot::Inline),
    }
}
