pub mod compile;
pub mod query;
pub mod schema;

use std::fmt::{Display, Formatter};
use std::path::Path;

use anyhow::{Context, Result};

use crate::compile::compile_project_str;
use crate::error::CompileError;
use crate::models::Project;

/// A project document that was read but rejected by the compiler.
#[derive(Debug)]
pub struct CompileCommandFailure {
    pub error: CompileError,
}

impl Display for CompileCommandFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "project failed to compile: {}", self.error)?;
        if let Some(path) = self.error.path() {
            write!(f, " (at {path})")?;
        }
        Ok(())
    }
}

impl std::error::Error for CompileCommandFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

pub fn load_project(path: &Path) -> Result<Project> {
    let input = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read project document {}", path.display()))?;

    compile_project_str(&input).map_err(|error| {
        for violation in error.violations() {
            eprintln!("compile: violation {violation}");
        }
        CompileCommandFailure { error }.into()
    })
}
