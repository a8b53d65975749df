//! CLI argument definitions using clap derive

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cli::commands::{
    catalog::CatalogCommands, category::CategoryCommands, completions::CompletionsArgs,
    init::InitArgs, props::PropsCommands, schema::SchemaCommands, template::TemplateCommands,
    version::VersionCommands,
};

#[derive(Parser)]
#[command(name = "ntk")]
#[command(author, version, about = "Node Template Kit")]
#[command(long_about = "Reusable BPMN node templates with schema-driven properties, validation and extension serialization.")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOpts,
}

#[derive(clap::Args, Clone, Debug)]
pub struct GlobalOpts {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "auto")]
    pub format: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Enable verbose output (debug logging)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Workspace root (default: auto-detect by finding .ntk/)
    #[arg(long, global = true, env = "NTK_WORKSPACE")]
    pub workspace: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new ntk workspace
    Init(InitArgs),

    /// Node template management
    #[command(subcommand)]
    Template(TemplateCommands),

    /// Template version history
    #[command(subcommand)]
    Version(VersionCommands),

    /// Template categories
    #[command(subcommand)]
    Category(CategoryCommands),

    /// Built-in template catalog
    #[command(subcommand)]
    Catalog(CatalogCommands),

    /// Element property schemas
    #[command(subcommand)]
    Schema(SchemaCommands),

    /// Validate, edit and convert element properties
    #[command(subcommand)]
    Props(PropsCommands),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Automatically detect based on context (yaml for show, tsv for list)
    #[default]
    Auto,
    /// YAML format (full fidelity)
    Yaml,
    /// Tab-separated values (for piping)
    Tsv,
    /// JSON format (for programming)
    Json,
    /// CSV format (for spreadsheets)
    Csv,
    /// Markdown tables
    Md,
    /// Just IDs, one per line
    Id,
}
