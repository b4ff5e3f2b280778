use anyhow::{Context, Result, anyhow};
use clap::Args;

use super::load_project;
use crate::config::{RunOptions, RuntimePaths};
use crate::targets::{BackendRegistry, execute_trace};

#[derive(Debug, Clone, Args)]
pub struct QueryArgs {
    #[arg(value_name = "TRACE")]
    pub trace: String,

    /// Target for traces that do not name one, ahead of the project default.
    #[arg(long, value_name = "NAME")]
    pub target: Option<String>,
}

pub fn run(args: &QueryArgs, runtime_paths: &RuntimePaths) -> Result<()> {
    let project = load_project(&runtime_paths.project_file)?;
    let trace = project
        .find_trace(&args.trace)
        .ok_or_else(|| anyhow!("trace `{}` is not defined in the project", args.trace))?;

    let options = RunOptions {
        default_target: args.target.clone(),
    };
    let data = execute_trace(&project, trace, &BackendRegistry::default(), &options)
        .with_context(|| format!("failed to execute trace `{}`", args.trace))?;

    println!("{}", serde_json::to_string_pretty(&data)?);
    Ok(())
}
