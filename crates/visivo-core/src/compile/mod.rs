//! Two-phase compilation: build the graph with per-entity checks, then run
//! the whole-graph validation. The document is accepted or rejected as a
//! whole; no partial project is ever returned.

use serde_json::Value;

use crate::build::build_project;
use crate::error::CompileError;
use crate::models::{Project, ProjectDocument};
use crate::validate::validate_project;

pub fn compile_project(document: Value) -> Result<Project, CompileError> {
    let document = serde_json::from_value::<ProjectDocument>(document)?;
    compile_document(document)
}

pub fn compile_project_str(input: &str) -> Result<Project, CompileError> {
    let document = serde_json::from_str::<ProjectDocument>(input)?;
    compile_document(document)
}

pub fn compile_document(document: ProjectDocument) -> Result<Project, CompileError> {
    let project = build_project(document)?;
    validate_project(&project).into_result()?;

    tracing::info!(
        targets = project.targets.len(),
        traces = project.trace_objs().len(),
        charts = project.chart_objs().len(),
        dashboards = project.dashboards.len(),
        "project compiled"
    );
    Ok(project)
}

#[cfg(test)]
mod tests {
    use super::compile_project_str;
    use crate::error::CompileError;

    #[test]
    fn structural_errors_surface_as_document_errors() {
        let error = compile_project_str(r#"{"targets": [{"name": "local"}]}"#)
            .expect_err("database is required");
        assert!(matches!(error, CompileError::Document(_)));
        assert!(error.to_string().contains("database"));
    }

    #[test]
    fn named_project_compiles() {
        let project = compile_project_str(r#"{"name": "project"}"#).expect("should compile");
        assert_eq!(project.name.as_deref(), Some("project"));
    }
}
