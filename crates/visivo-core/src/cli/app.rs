use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use super::commands::{compile::CompileArgs, query::QueryArgs, schema::SchemaArgs};

#[derive(Debug, Parser)]
#[command(
    name = "visivo-core",
    version,
    about = "Compile BI project documents and run trace queries"
)]
pub struct Cli {
    #[command(flatten)]
    pub runtime: RuntimeArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Args)]
pub struct RuntimeArgs {
    #[arg(long, global = true, value_name = "PATH")]
    pub home_dir: Option<PathBuf>,

    #[arg(long, global = true, value_name = "PATH")]
    pub cwd: Option<PathBuf>,

    /// Project document (JSON). Defaults to `project.json` in the working directory.
    #[arg(long, global = true, value_name = "PATH")]
    pub project: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Build and validate the project graph.
    Compile(CompileArgs),
    /// Execute one trace against its target and print the rows as JSON.
    Query(QueryArgs),
    /// Print the JSON Schema of the project document.
    Schema(SchemaArgs),
}

impl Command {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Compile(_) => "compile",
            Self::Query(_) => "query",
            Self::Schema(_) => "schema",
        }
    }
}
