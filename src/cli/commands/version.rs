//! `ntk version` command - Template version history

use clap::Subcommand;
use console::style;
use dialoguer::{theme::ColorfulTheme, Confirm};
use miette::{IntoDiagnostic, Result};

use crate::cli::helpers::{format_short_id, open_toolkit, resolve_template, truncate_str};
use crate::cli::table::{Column, Table};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::identity::{IdPrefix, RecordId};
use crate::template::TemplateChanges;

#[derive(Subcommand, Debug)]
pub enum VersionCommands {
    /// Snapshot a template as a new patch version
    Create(CreateArgs),

    /// List a template's recorded versions, oldest first
    List(ListArgs),

    /// Reset a template's content to a recorded version
    Restore(RestoreArgs),
}

#[derive(clap::Args, Debug)]
pub struct CreateArgs {
    /// Template ID or name
    pub template: String,

    /// What changed
    #[arg(long, short = 'm', default_value = "")]
    pub message: String,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Template ID or name
    pub template: String,
}

#[derive(clap::Args, Debug)]
pub struct RestoreArgs {
    /// Template ID or name
    pub template: String,

    /// Version ID (VER-...) or version number (e.g. 1.0.2)
    #[arg(id = "version_ref", value_name = "VERSION")]
    pub version: String,

    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

pub fn run(cmd: VersionCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        VersionCommands::Create(args) => run_create(args, global),
        VersionCommands::List(args) => run_list(args, global),
        VersionCommands::Restore(args) => run_restore(args, global),
    }
}

fn run_create(args: CreateArgs, global: &GlobalOpts) -> Result<()> {
    let (_, mut toolkit) = open_toolkit(global)?;
    let id = resolve_template(&toolkit.store, &args.template)?;
    let version_id = toolkit
        .store
        .create_version(&id, TemplateChanges::described(args.message))?;
    let template = toolkit.store.get(&id)?;

    match global.format {
        OutputFormat::Id => println!("{}", version_id),
        _ if global.quiet => {}
        _ => println!(
            "{} Recorded {} v{} as {}",
            style("✓").green(),
            style(&template.name).cyan(),
            template.metadata.version,
            style(format_short_id(&version_id)).cyan()
        ),
    }
    Ok(())
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let (_, toolkit) = open_toolkit(global)?;
    let id = resolve_template(&toolkit.store, &args.template)?;
    let history = toolkit.store.version_history(&id);

    match global.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(history).into_diagnostic()?);
        }
        OutputFormat::Yaml => print!("{}", serde_yml::to_string(history).into_diagnostic()?),
        format => {
            if history.is_empty() {
                if !global.quiet && !matches!(format, OutputFormat::Id | OutputFormat::Csv) {
                    println!("No versions recorded.");
                }
                return Ok(());
            }
            let mut table = Table::new(
                &[
                    Column::new("ID", 16),
                    Column::new("VERSION", 8),
                    Column::new("CREATED", 17),
                    Column::new("AUTHOR", 14),
                    Column::new("CHANGELOG", 40),
                ],
                "version",
            );
            for v in history {
                let wide = matches!(format, OutputFormat::Csv | OutputFormat::Id);
                table.push(vec![
                    if wide { v.id.to_string() } else { format_short_id(&v.id) },
                    v.version.clone(),
                    v.created_at.format("%Y-%m-%d %H:%M").to_string(),
                    v.author.clone(),
                    if wide { v.changelog.clone() } else { truncate_str(&v.changelog, 40) },
                ]);
            }
            table.print(format, global.quiet)?;
        }
    }
    Ok(())
}

fn run_restore(args: RestoreArgs, global: &GlobalOpts) -> Result<()> {
    let (_, mut toolkit) = open_toolkit(global)?;
    let id = resolve_template(&toolkit.store, &args.template)?;

    let history = toolkit.store.version_history(&id);
    let version = match RecordId::parse_as(&args.version, IdPrefix::Ver) {
        Ok(vid) => history.iter().find(|v| v.id == vid),
        Err(_) => {
            let wanted = args.version.trim_start_matches('v');
            history.iter().find(|v| v.version == wanted)
        }
    }
    .ok_or_else(|| miette::miette!("Version not found: {}", args.version))?;
    let (version_id, number) = (version.id, version.version.clone());

    if !args.yes {
        let confirmed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("Reset template content to v{}?", number))
            .default(false)
            .interact()
            .into_diagnostic()?;
        if !confirmed {
            println!("Cancelled.");
            return Ok(());
        }
    }

    toolkit.store.restore_version(&id, &version_id)?;
    if !global.quiet {
        println!(
            "{} Restored content of v{} ({})",
            style("✓").green(),
            number,
            style(format_short_id(&version_id)).cyan()
        );
    }
    Ok(())
}
