//! `ntk init` command - Initialize a new workspace

use console::style;
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;

use crate::cli::GlobalOpts;
use crate::core::{Config, Workspace, WorkspaceError};
use crate::toolkit::Toolkit;

#[derive(clap::Args, Debug)]
pub struct InitArgs {
    /// Directory to initialize (default: current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Rewrite the config of an existing workspace
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: InitArgs, global: &GlobalOpts) -> Result<()> {
    let path = if args.path.as_os_str() == "." {
        std::env::current_dir().into_diagnostic()?
    } else {
        args.path.clone()
    };

    if !path.exists() {
        std::fs::create_dir_all(&path).into_diagnostic()?;
        if !global.quiet {
            println!(
                "{} Created directory {}",
                style("✓").green(),
                style(path.display()).cyan()
            );
        }
    }

    let workspace = match Workspace::init(&path, args.force) {
        Ok(workspace) => workspace,
        Err(WorkspaceError::AlreadyExists(root)) => {
            println!(
                "{} ntk workspace already exists at {}",
                style("!").yellow(),
                style(root.display()).cyan()
            );
            println!();
            println!("Use {} to rewrite its config", style("ntk init --force").yellow());
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    // Opening the store installs the built-in catalog
    let config = Config::load_for(Some(&workspace));
    let toolkit = Toolkit::open(&workspace, config)?;

    if global.quiet {
        return Ok(());
    }
    println!(
        "{} Initialized ntk workspace at {}",
        style("✓").green(),
        style(workspace.root().display()).cyan()
    );
    println!(
        "   {} templates in {} categories",
        style(toolkit.store.len()).cyan(),
        toolkit.store.list_categories().len()
    );
    println!();
    println!("Next steps:");
    println!("  {} Browse the catalog", style("ntk template list").yellow());
    println!("  {} Author a template", style("ntk template scaffold <name> --type bpmn:UserTask").yellow());
    println!("  {} Inspect an element schema", style("ntk schema show bpmn:UserTask").yellow());
    Ok(())
}
