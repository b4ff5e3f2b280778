use anyhow::Result;
use clap::Args;

use crate::models::project_document_schema;

#[derive(Debug, Clone, Args)]
pub struct SchemaArgs {}

pub fn run(_args: &SchemaArgs) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&project_document_schema())?);
    Ok(())
}
