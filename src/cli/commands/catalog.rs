//! `ntk catalog` command - Built-in template catalog

use clap::Subcommand;
use console::style;
use miette::Result;

use crate::cli::helpers::open_toolkit;
use crate::cli::table::{Column, Table};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::template::Catalog;

#[derive(Subcommand, Debug)]
pub enum CatalogCommands {
    /// Show which catalog packs are installed and up to date
    Status,

    /// Reinstall catalog packs
    Seed(SeedArgs),
}

#[derive(clap::Args, Debug)]
pub struct SeedArgs {
    /// Reinstall every pack, not just stale ones
    #[arg(long)]
    pub force: bool,
}

pub fn run(cmd: CatalogCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        CatalogCommands::Status => run_status(global),
        CatalogCommands::Seed(args) => run_seed(args, global),
    }
}

fn run_status(global: &GlobalOpts) -> Result<()> {
    let (_, toolkit) = open_toolkit(global)?;
    let catalog = Catalog::builtin()?;

    let mut table = Table::new(
        &[
            Column::new("CATEGORY", 14),
            Column::new("INSTALLED", 9),
            Column::new("EXPECTED", 8),
            Column::new("STATUS", 30),
        ],
        "pack",
    );
    for status in catalog.status(&toolkit.store) {
        let state = match &status.stale {
            Some(reason) => format!("stale: {}", reason),
            None => "ok".to_string(),
        };
        table.push(vec![
            status.category,
            status.installed.to_string(),
            status.expected.to_string(),
            state,
        ]);
    }
    let format = match global.format {
        OutputFormat::Json | OutputFormat::Yaml => OutputFormat::Tsv,
        f => f,
    };
    table.print(format, global.quiet)
}

fn run_seed(args: SeedArgs, global: &GlobalOpts) -> Result<()> {
    // Opening already reinstalls stale packs
    let (_, mut toolkit) = open_toolkit(global)?;
    let catalog = Catalog::builtin()?;
    let report = catalog.seed(&mut toolkit.store, args.force)?;
    toolkit.publish_pending();

    if global.quiet {
        return Ok(());
    }
    if report.is_noop() {
        println!("{} Catalog is up to date", style("✓").green());
        return Ok(());
    }
    println!(
        "{} Reinstalled {} ({} created, {} replaced)",
        style("✓").green(),
        style(report.seeded.join(", ")).cyan(),
        report.created,
        report.removed
    );
    Ok(())
}
