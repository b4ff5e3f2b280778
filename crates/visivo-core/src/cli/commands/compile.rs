use anyhow::Result;
use clap::Args;

use super::load_project;
use crate::config::RuntimePaths;

#[derive(Debug, Clone, Args)]
pub struct CompileArgs {
    /// Also list every inline trace name.
    #[arg(long, default_value_t = false)]
    pub list_traces: bool,
}

pub fn run(args: &CompileArgs, runtime_paths: &RuntimePaths) -> Result<()> {
    println!(
        "compile: start project={}",
        runtime_paths.project_file.display()
    );

    let project = load_project(&runtime_paths.project_file)?;
    println!(
        "compile: ok targets={} traces={} charts={} tables={} dashboards={} alerts={}",
        project.targets.len(),
        project.trace_objs().len(),
        project.chart_objs().len(),
        project.table_objs().len(),
        project.dashboards.len(),
        project.alerts.len()
    );

    if args.list_traces {
        for trace in project.trace_objs() {
            println!("{}", trace.name);
        }
    }
    Ok(())
}
