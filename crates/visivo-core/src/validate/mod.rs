use std::collections::BTreeSet;

use serde::Serialize;

use crate::error::{CompileError, EntityKind, Violation};
use crate::models::{ChartSlot, Named, Project, TraceSlot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Pass,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub status: ValidationStatus,
    pub checks_run: usize,
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn into_result(self) -> Result<(), CompileError> {
        if self.violations.is_empty() {
            Ok(())
        } else {
            Err(CompileError::Invalid {
                violations: self.violations,
            })
        }
    }
}

type GraphCheck = fn(&Project) -> Vec<Violation>;

/// Runs every whole-graph check over a fully built project.
///
/// Checks share no state, so the report lists violations grouped by check in
/// catalog order.
#[must_use]
pub fn validate_project(project: &Project) -> ValidationReport {
    let catalog = check_catalog();
    let mut violations = Vec::new();
    for check in catalog {
        violations.extend(check(project));
    }

    tracing::debug!(
        checks = catalog.len(),
        violations = violations.len(),
        "project graph validated"
    );

    ValidationReport {
        status: if violations.is_empty() {
            ValidationStatus::Pass
        } else {
            ValidationStatus::Fail
        },
        checks_run: catalog.len(),
        violations,
    }
}

fn check_catalog() -> &'static [GraphCheck] {
    &[
        check_default_names,
        check_trace_references,
        check_chart_references,
        check_unique_names,
    ]
}

fn check_default_names(project: &Project) -> Vec<Violation> {
    let mut violations = Vec::new();

    if let Some(name) = project.default_target_name() {
        if project.find_target(name).is_none() {
            violations.push(Violation::DefaultNotFound {
                kind: EntityKind::Target,
                name: name.to_string(),
            });
        }
    }

    if let Some(name) = project.default_alert_name() {
        if project.find_alert(name).is_none() {
            violations.push(Violation::DefaultNotFound {
                kind: EntityKind::Alert,
                name: name.to_string(),
            });
        }
    }

    violations
}

fn check_trace_references(project: &Project) -> Vec<Violation> {
    let slots = project.all_trace_slots();
    let defined = defined_names(
        EntityKind::Trace,
        slots.iter().filter_map(|slot| slot.inline()).map(Named::name),
    );
    dangling_references(
        EntityKind::Trace,
        &defined,
        slots.iter().copied().filter_map(TraceSlot::reference),
    )
}

fn check_chart_references(project: &Project) -> Vec<Violation> {
    let slots = project.all_chart_slots();
    let defined = defined_names(
        EntityKind::Chart,
        slots.iter().filter_map(|slot| slot.inline()).map(Named::name),
    );
    dangling_references(
        EntityKind::Chart,
        &defined,
        slots.iter().copied().filter_map(ChartSlot::reference),
    )
}

fn check_unique_names(project: &Project) -> Vec<Violation> {
    [
        first_duplicate(EntityKind::Target, project.targets.iter().map(Named::name)),
        first_duplicate(EntityKind::Alert, project.alerts.iter().map(Named::name)),
        first_duplicate(
            EntityKind::Dashboard,
            project.dashboards.iter().map(Named::name),
        ),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// Collects inline definition names. Repeated trace or chart names are
/// tolerated, lookups resolve to the first definition.
fn defined_names<'a>(
    kind: EntityKind,
    names: impl Iterator<Item = &'a str>,
) -> BTreeSet<&'a str> {
    let mut defined = BTreeSet::new();
    for name in names {
        if !defined.insert(name) {
            tracing::warn!(%kind, name, "inline {kind} name is defined more than once");
        }
    }
    defined
}

fn dangling_references<'a>(
    kind: EntityKind,
    defined: &BTreeSet<&str>,
    references: impl Iterator<Item = &'a str>,
) -> Vec<Violation> {
    let mut reported = BTreeSet::new();
    references
        .filter(|name| !defined.contains(name) && reported.insert(*name))
        .map(|name| Violation::DanglingReference {
            kind,
            name: name.to_string(),
        })
        .collect()
}

fn first_duplicate<'a>(
    kind: EntityKind,
    names: impl Iterator<Item = &'a str>,
) -> Option<Violation> {
    let mut seen = BTreeSet::new();
    names
        .into_iter()
        .find(|name| !seen.insert(*name))
        .map(|name| Violation::DuplicateName {
            kind,
            name: name.to_string(),
        })
}
