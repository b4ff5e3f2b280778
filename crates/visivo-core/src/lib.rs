#![forbid(unsafe_code)]

pub mod build;
pub mod cli;
pub mod compile;
pub mod config;
pub mod error;
pub mod models;
pub mod query;
pub mod syntax;
pub mod targets;
pub mod validate;

pub use cli::app::{Cli, Command};
pub use compile::{compile_document, compile_project, compile_project_str};
pub use error::{CompileError, ConnectionError, QueryError, ReferenceError, Violation};
pub use models::{Project, Target, Trace};
pub use query::{AssembledQuery, Dialect, assemble_trace_query};
pub use targets::{BackendRegistry, QueryRows, TraceData, execute_trace};
