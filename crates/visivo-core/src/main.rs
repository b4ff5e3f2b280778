#![forbid(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::Parser;
use clap::error::ErrorKind;
use tracing_subscriber::EnvFilter;
use visivo_core::cli::app::{Cli, Command, RuntimeArgs};
use visivo_core::cli::commands;
use visivo_core::config::RuntimePaths;

const EXIT_SUCCESS: i32 = 0;
const EXIT_RUNTIME_FAILURE: i32 = 1;
const EXIT_VALIDATION_FAILURE: i32 = 2;
const EXIT_USAGE_ERROR: i32 = 64;

fn main() {
    init_tracing();
    std::process::exit(run());
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run() -> i32 {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => return exit_code_for_parse_error(error),
    };
    let command_name = cli.command.name();
    eprintln!("visivo-core: starting `{command_name}`");

    match execute(cli) {
        Ok(()) => {
            eprintln!("visivo-core: completed `{command_name}` (exit_code={EXIT_SUCCESS})");
            EXIT_SUCCESS
        }
        Err(error) => {
            let exit_code = classify_runtime_error(&error);
            eprintln!("visivo-core: failed `{command_name}` (exit_code={exit_code})");
            eprintln!("{error:#}");
            exit_code
        }
    }
}

fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Compile(args) => {
            let runtime_paths = resolve_runtime_paths(&cli.runtime)?;
            commands::compile::run(&args, &runtime_paths)
        }
        Command::Query(args) => {
            let runtime_paths = resolve_runtime_paths(&cli.runtime)?;
            commands::query::run(&args, &runtime_paths)
        }
        Command::Schema(args) => commands::schema::run(&args),
    }
}

fn classify_runtime_error(error: &anyhow::Error) -> i32 {
    if error
        .downcast_ref::<commands::CompileCommandFailure>()
        .is_some()
    {
        EXIT_VALIDATION_FAILURE
    } else {
        EXIT_RUNTIME_FAILURE
    }
}

fn exit_code_for_parse_error(error: clap::Error) -> i32 {
    let _ = error.print();
    match error.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => EXIT_SUCCESS,
        _ => EXIT_USAGE_ERROR,
    }
}

fn resolve_runtime_paths(args: &RuntimeArgs) -> Result<RuntimePaths> {
    let home_dir = match &args.home_dir {
        Some(path) => path.clone(),
        None => std::env::var_os("HOME")
            .map(PathBuf::from)
            .ok_or_else(|| anyhow!("HOME is not set; pass --home-dir"))?,
    };

    let cwd = match &args.cwd {
        Some(path) => path.clone(),
        None => std::env::current_dir()?,
    };

    visivo_core::config::resolve_runtime_paths(&home_dir, &cwd, args.project.as_deref())
}
