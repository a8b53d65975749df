//! `ntk category` command - Template categories

use clap::Subcommand;
use console::style;
use dialoguer::{theme::ColorfulTheme, Confirm};
use miette::{IntoDiagnostic, Result};

use crate::cli::helpers::{format_short_id, open_toolkit, resolve_category, truncate_str};
use crate::cli::table::{Column, Table};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::template::model::SortPolicy;
use crate::template::CategoryDraft;

#[derive(Subcommand, Debug)]
pub enum CategoryCommands {
    /// Create a category
    New(NewArgs),

    /// List categories in display order
    List,

    /// List a category's templates in its own sort order
    Show(ShowArgs),

    /// Delete a category (its templates are kept)
    Delete(DeleteArgs),
}

#[derive(clap::Args, Debug)]
pub struct NewArgs {
    pub name: String,

    #[arg(long, short = 'd', default_value = "")]
    pub description: String,

    #[arg(long, default_value = "")]
    pub icon: String,

    /// Position among categories (lower first)
    #[arg(long, default_value_t = 100)]
    pub order: i32,

    /// How templates are ordered (name, usage, date)
    #[arg(long, default_value = "name")]
    pub sort: SortPolicy,

    /// Parent category name or ID
    #[arg(long)]
    pub parent: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Category name or ID
    pub category: String,
}

#[derive(clap::Args, Debug)]
pub struct DeleteArgs {
    /// Category name or ID
    pub category: String,

    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

pub fn run(cmd: CategoryCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        CategoryCommands::New(args) => run_new(args, global),
        CategoryCommands::List => run_list(global),
        CategoryCommands::Show(args) => run_show(args, global),
        CategoryCommands::Delete(args) => run_delete(args, global),
    }
}

fn run_new(args: NewArgs, global: &GlobalOpts) -> Result<()> {
    let (_, mut toolkit) = open_toolkit(global)?;
    if toolkit.store.find_category(&args.name).is_some() {
        return Err(miette::miette!("Category '{}' already exists", args.name));
    }

    let mut draft = CategoryDraft::new(args.name, args.order);
    draft.description = args.description;
    draft.icon = args.icon;
    draft.config.sort_policy = args.sort;
    if let Some(parent) = &args.parent {
        draft.parent_id = Some(resolve_category(&toolkit.store, parent)?);
    }

    let id = toolkit.store.create_category(draft)?;
    match global.format {
        OutputFormat::Id => println!("{}", id),
        _ if global.quiet => {}
        _ => println!(
            "{} Created category {}",
            style("✓").green(),
            style(format_short_id(&id)).cyan()
        ),
    }
    Ok(())
}

fn run_list(global: &GlobalOpts) -> Result<()> {
    let (_, toolkit) = open_toolkit(global)?;
    let categories = toolkit.store.list_categories();

    match global.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&categories).into_diagnostic()?),
        OutputFormat::Yaml => print!("{}", serde_yml::to_string(&categories).into_diagnostic()?),
        format => {
            let mut table = Table::new(
                &[
                    Column::new("ID", 16),
                    Column::new("NAME", 18),
                    Column::new("ORDER", 5),
                    Column::new("SORT", 6),
                    Column::new("TEMPLATES", 9),
                    Column::new("DESCRIPTION", 36),
                ],
                "category",
            );
            let wide = matches!(format, OutputFormat::Csv | OutputFormat::Id);
            for c in categories {
                let count = toolkit.store.templates_in_category(&c.id)?.len();
                table.push(vec![
                    if wide { c.id.to_string() } else { format_short_id(&c.id) },
                    c.name.clone(),
                    c.sort_order.to_string(),
                    c.config.sort_policy.to_string(),
                    count.to_string(),
                    if wide { c.description.clone() } else { truncate_str(&c.description, 36) },
                ]);
            }
            table.print(format, global.quiet)?;
        }
    }
    Ok(())
}

fn run_show(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let (_, toolkit) = open_toolkit(global)?;
    let id = resolve_category(&toolkit.store, &args.category)?;
    let templates = toolkit.store.templates_in_category(&id)?;

    match global.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&templates).into_diagnostic()?),
        OutputFormat::Yaml => print!("{}", serde_yml::to_string(&templates).into_diagnostic()?),
        format => {
            let mut table = Table::new(
                &[
                    Column::new("ID", 16),
                    Column::new("NAME", 28),
                    Column::new("TYPE", 24),
                    Column::new("USES", 5),
                ],
                "template",
            );
            let wide = matches!(format, OutputFormat::Csv | OutputFormat::Id);
            for t in &templates {
                table.push(vec![
                    if wide { t.id.to_string() } else { format_short_id(&t.id) },
                    if wide { t.name.clone() } else { truncate_str(&t.name, 28) },
                    t.node_type.clone(),
                    t.metadata.usage_count.to_string(),
                ]);
            }
            table.print(format, global.quiet)?;
        }
    }
    Ok(())
}

fn run_delete(args: DeleteArgs, global: &GlobalOpts) -> Result<()> {
    let (_, mut toolkit) = open_toolkit(global)?;
    let id = resolve_category(&toolkit.store, &args.category)?;
    let members = toolkit.store.templates_in_category(&id)?.len();

    if !args.yes {
        let prompt = if members > 0 {
            format!("Delete category? {} template(s) will keep a dangling reference", members)
        } else {
            "Delete category?".to_string()
        };
        let confirmed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .default(false)
            .interact()
            .into_diagnostic()?;
        if !confirmed {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let category = toolkit.store.delete_category(&id)?;
    if !global.quiet {
        println!(
            "{} Deleted category {}",
            style("✓").green(),
            style(&category.name).cyan()
        );
        if members > 0 {
            println!(
                "   {} template(s) still reference it; move them with {}",
                members,
                style("ntk template edit <template> --category <name>").yellow()
            );
        }
    }
    Ok(())
}
