//! `ntk template` command - Node template management

use clap::Subcommand;
use console::style;
use dialoguer::{theme::ColorfulTheme, Confirm, Input};
use miette::{IntoDiagnostic, Result};
use std::fs;
use std::path::PathBuf;

use crate::cli::helpers::{
    format_short_id, open_toolkit, parse_assignment, resolve_category, resolve_template,
    split_tags, truncate_str, write_element,
};
use crate::cli::table::{Column, Table};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::element::{Element, PropertyContext};
use crate::template::loader::{load_dir, load_draft};
use crate::template::model::{MetadataPatch, Template};
use crate::template::{
    InstantiationConfig, ScaffoldContext, ScaffoldGenerator, SearchQuery, SortBy, SortOrder,
    TemplateDraft, TemplatePatch, TemplateStore,
};

#[derive(Subcommand, Debug)]
pub enum TemplateCommands {
    /// List templates with filtering
    List(ListArgs),

    /// Full-text search over names, tags and descriptions
    Search(SearchArgs),

    /// Most frequently instantiated templates
    Popular(PopularArgs),

    /// Create a new template
    New(NewArgs),

    /// Show a template's details
    Show(ShowArgs),

    /// Update template fields
    Edit(EditArgs),

    /// Delete a template and its version history
    Delete(DeleteArgs),

    /// Create an element from a template
    Instantiate(InstantiateArgs),

    /// Load template YAML files
    Import(ImportArgs),

    /// Write a YAML skeleton for a new template
    Scaffold(ScaffoldArgs),
}

#[derive(clap::Args, Debug, Default)]
pub struct FilterArgs {
    /// Category name or ID
    #[arg(long, short = 'c')]
    pub category: Option<String>,

    /// Only templates carrying any of these tags (comma-separated)
    #[arg(long, short = 't')]
    pub tag: Vec<String>,

    /// Target element type, e.g. bpmn:UserTask
    #[arg(long = "type")]
    pub node_type: Option<String>,

    /// Only templates by this author
    #[arg(long)]
    pub author: Option<String>,

    /// Maximum number of results
    #[arg(long, short = 'n')]
    pub limit: Option<usize>,

    /// Skip this many results
    #[arg(long, default_value_t = 0)]
    pub offset: usize,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub filter: FilterArgs,

    /// Sort field (name, usage, date, relevance)
    #[arg(long, default_value = "name")]
    pub sort: SortBy,

    /// Reverse the sort order
    #[arg(long, short = 'r')]
    pub reverse: bool,
}

#[derive(clap::Args, Debug)]
pub struct SearchArgs {
    /// Search term
    pub term: String,

    #[command(flatten)]
    pub filter: FilterArgs,
}

#[derive(clap::Args, Debug)]
pub struct PopularArgs {
    /// Number of templates to show
    #[arg(default_value_t = 10)]
    pub limit: usize,
}

#[derive(clap::Args, Debug)]
pub struct NewArgs {
    /// Template name
    pub name: Option<String>,

    /// Target element type, e.g. bpmn:UserTask
    #[arg(long = "type")]
    pub node_type: Option<String>,

    #[arg(long, short = 'd')]
    pub description: Option<String>,

    /// Category name or ID
    #[arg(long, short = 'c')]
    pub category: Option<String>,

    #[arg(long)]
    pub icon: Option<String>,

    /// Tags (comma-separated, repeatable)
    #[arg(long, short = 't')]
    pub tag: Vec<String>,

    /// Template property as key=value (repeatable)
    #[arg(long = "set", short = 's')]
    pub properties: Vec<String>,

    /// Prompt for missing fields
    #[arg(long, short = 'i')]
    pub interactive: bool,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Template ID or name
    pub template: String,
}

#[derive(clap::Args, Debug)]
pub struct EditArgs {
    /// Template ID or name
    pub template: String,

    #[arg(long)]
    pub name: Option<String>,

    #[arg(long, short = 'd')]
    pub description: Option<String>,

    #[arg(long)]
    pub icon: Option<String>,

    /// Move to this category (name or ID)
    #[arg(long, short = 'c', conflicts_with = "no_category")]
    pub category: Option<String>,

    /// Remove the category reference
    #[arg(long)]
    pub no_category: bool,

    /// Replace the tags (comma-separated, repeatable)
    #[arg(long, short = 't')]
    pub tag: Vec<String>,

    /// Set a template property as key=value (repeatable)
    #[arg(long = "set", short = 's')]
    pub set: Vec<String>,

    /// Remove a template property (repeatable)
    #[arg(long)]
    pub unset: Vec<String>,
}

#[derive(clap::Args, Debug)]
pub struct DeleteArgs {
    /// Template ID or name
    pub template: String,

    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

#[derive(clap::Args, Debug)]
pub struct InstantiateArgs {
    /// Template ID or name
    pub template: String,

    #[arg(long, default_value_t = 0.0)]
    pub x: f64,

    #[arg(long, default_value_t = 0.0)]
    pub y: f64,

    /// Override a property as key=value (repeatable)
    #[arg(long = "set", short = 's')]
    pub set: Vec<String>,

    /// Write the element to this file (.json or .yaml) instead of stdout
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct ImportArgs {
    /// Template file or directory (default: the workspace templates directory)
    pub path: Option<PathBuf>,

    /// File imported templates under this category (name or ID)
    #[arg(long, short = 'c')]
    pub category: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct ScaffoldArgs {
    /// Template name
    pub name: String,

    /// Target element type; its schema seeds the properties block
    #[arg(long = "type", default_value = "bpmn:Task")]
    pub node_type: String,

    #[arg(long, short = 'd')]
    pub description: Option<String>,

    #[arg(long, short = 't')]
    pub tag: Vec<String>,

    /// Write to this file instead of stdout
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

pub fn run(cmd: TemplateCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        TemplateCommands::List(args) => run_list(args, global),
        TemplateCommands::Search(args) => run_search(args, global),
        TemplateCommands::Popular(args) => run_popular(args, global),
        TemplateCommands::New(args) => run_new(args, global),
        TemplateCommands::Show(args) => run_show(args, global),
        TemplateCommands::Edit(args) => run_edit(args, global),
        TemplateCommands::Delete(args) => run_delete(args, global),
        TemplateCommands::Instantiate(args) => run_instantiate(args, global),
        TemplateCommands::Import(args) => run_import(args, global),
        TemplateCommands::Scaffold(args) => run_scaffold(args, global),
    }
}

fn build_query(store: &TemplateStore, filter: &FilterArgs) -> Result<SearchQuery> {
    let mut query = SearchQuery::new().offset(filter.offset);
    if let Some(category) = &filter.category {
        query = query.category(resolve_category(store, category)?);
    }
    for tag in split_tags(&filter.tag) {
        query = query.tag(tag);
    }
    if let Some(node_type) = &filter.node_type {
        query = query.node_type(node_type.clone());
    }
    if let Some(author) = &filter.author {
        query = query.author(author.clone());
    }
    if let Some(limit) = filter.limit {
        query = query.limit(limit);
    }
    Ok(query)
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let (_, toolkit) = open_toolkit(global)?;
    let order = if args.reverse { SortOrder::Desc } else { SortOrder::Asc };
    let query = build_query(&toolkit.store, &args.filter)?.sort(args.sort, order);
    print_templates(&toolkit.store, &toolkit.store.search(&query), global)
}

fn run_search(args: SearchArgs, global: &GlobalOpts) -> Result<()> {
    let (_, toolkit) = open_toolkit(global)?;
    let query = build_query(&toolkit.store, &args.filter)?
        .text(args.term)
        .sort(SortBy::Relevance, SortOrder::Asc);
    print_templates(&toolkit.store, &toolkit.store.search(&query), global)
}

fn run_popular(args: PopularArgs, global: &GlobalOpts) -> Result<()> {
    let (_, toolkit) = open_toolkit(global)?;
    print_templates(&toolkit.store, &toolkit.store.popular(args.limit), global)
}

fn print_templates(store: &TemplateStore, templates: &[Template], global: &GlobalOpts) -> Result<()> {
    if templates.is_empty() {
        match global.format {
            OutputFormat::Json | OutputFormat::Yaml => println!("[]"),
            OutputFormat::Id | OutputFormat::Csv => {}
            _ => {
                println!("No templates found.");
                println!();
                println!("Create one with: {}", style("ntk template new").yellow());
            }
        }
        return Ok(());
    }

    match global.format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(templates).into_diagnostic()?;
            println!("{}", json);
        }
        OutputFormat::Yaml => {
            let yaml = serde_yml::to_string(templates).into_diagnostic()?;
            print!("{}", yaml);
        }
        format => {
            let mut table = Table::new(
                &[
                    Column::new("ID", 16),
                    Column::new("NAME", 28),
                    Column::new("TYPE", 24),
                    Column::new("CATEGORY", 14),
                    Column::new("VERSION", 8),
                    Column::new("USES", 5),
                ],
                "template",
            );
            let wide = matches!(format, OutputFormat::Csv | OutputFormat::Id);
            for t in templates {
                let category = t
                    .category
                    .as_ref()
                    .and_then(|c| store.get_category(c))
                    .map(|c| c.name.clone())
                    .unwrap_or_default();
                let (id, name) = if wide {
                    (t.id.to_string(), t.name.clone())
                } else {
                    (format_short_id(&t.id), truncate_str(&t.name, 28))
                };
                table.push(vec![
                    id,
                    name,
                    t.node_type.clone(),
                    category,
                    t.metadata.version.clone(),
                    t.metadata.usage_count.to_string(),
                ]);
            }
            table.print(format, global.quiet)?;
        }
    }
    Ok(())
}

fn run_new(args: NewArgs, global: &GlobalOpts) -> Result<()> {
    let (_, mut toolkit) = open_toolkit(global)?;
    let theme = ColorfulTheme::default();

    let name = match args.name {
        Some(name) => name,
        None if args.interactive => Input::<String>::with_theme(&theme)
            .with_prompt("Name")
            .interact_text()
            .into_diagnostic()?,
        None => return Err(miette::miette!("Template name is required (or use --interactive)")),
    };
    let node_type = match args.node_type {
        Some(t) => t,
        None if args.interactive => Input::<String>::with_theme(&theme)
            .with_prompt("Element type")
            .default("bpmn:Task".to_string())
            .interact_text()
            .into_diagnostic()?,
        None => "bpmn:Task".to_string(),
    };
    let description = match args.description {
        Some(d) => d,
        None if args.interactive => Input::<String>::with_theme(&theme)
            .with_prompt("Description")
            .allow_empty(true)
            .interact_text()
            .into_diagnostic()?,
        None => String::new(),
    };

    let mut draft = TemplateDraft::new(name, node_type)
        .with_description(description)
        .with_tags(split_tags(&args.tag));
    if let Some(category) = &args.category {
        draft = draft.in_category(resolve_category(&toolkit.store, category)?);
    }
    if let Some(icon) = args.icon {
        draft.icon = icon;
    }
    for assignment in &args.properties {
        let (key, value) = parse_assignment(assignment)?;
        draft = draft.with_property(key, value);
    }

    let id = toolkit.store.create(draft)?;
    toolkit.publish_pending();

    match global.format {
        OutputFormat::Id => println!("{}", id),
        _ if global.quiet => {}
        _ => println!(
            "{} Created template {}",
            style("✓").green(),
            style(format_short_id(&id)).cyan()
        ),
    }
    Ok(())
}

fn run_show(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let (_, toolkit) = open_toolkit(global)?;
    let id = resolve_template(&toolkit.store, &args.template)?;
    let template = toolkit.store.get(&id)?;

    match global.format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&template).into_diagnostic()?;
            println!("{}", json);
        }
        OutputFormat::Yaml => {
            let yaml = serde_yml::to_string(&template).into_diagnostic()?;
            print!("{}", yaml);
        }
        OutputFormat::Id => println!("{}", template.id),
        _ => print_template(&toolkit.store, &template),
    }
    Ok(())
}

fn print_template(store: &TemplateStore, t: &Template) {
    println!("{}", style("─".repeat(60)).dim());
    println!("{}: {}", style("ID").bold(), style(&t.id.to_string()).cyan());
    println!("{}: {}", style("Name").bold(), style(&t.name).yellow());
    println!("{}: {}", style("Type").bold(), t.node_type);
    if let Some(category) = &t.category {
        let label = store
            .get_category(category)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| format!("{} (missing)", category));
        println!("{}: {}", style("Category").bold(), label);
    }
    println!("{}: {}", style("Version").bold(), t.metadata.version);
    println!("{}: {}", style("Author").bold(), t.metadata.author);
    println!("{}: {}", style("Uses").bold(), t.metadata.usage_count);
    if !t.metadata.tags.is_empty() {
        println!("{}: {}", style("Tags").bold(), t.metadata.tags.join(", "));
    }
    if t.is_default() {
        println!("{}: built-in", style("Source").bold());
    }
    println!("{}", style("─".repeat(60)).dim());

    if !t.description.is_empty() {
        println!();
        println!("{}", t.description);
    }

    if !t.properties.is_empty() {
        println!();
        println!("{}", style("Properties:").bold());
        for (key, value) in &t.properties {
            println!("  {} = {}", key, value);
        }
    }

    if let Some(form) = t.dynamic_form.as_ref().filter(|f| !f.is_empty()) {
        println!();
        println!("{}", style("Form:").bold());
        for section in &form.sections {
            println!("  {}", style(&section.title).underlined());
            for field in &section.fields {
                let required = if field.required { " *" } else { "" };
                println!("    {}{} ({})", field.label, required, field.key);
            }
        }
    }

    let history = store.version_history(&t.id);
    if !history.is_empty() {
        println!();
        println!("{} {} version(s) recorded", style("•").dim(), history.len());
    }
}

fn run_edit(args: EditArgs, global: &GlobalOpts) -> Result<()> {
    let (_, mut toolkit) = open_toolkit(global)?;
    let id = resolve_template(&toolkit.store, &args.template)?;
    let current = toolkit.store.get(&id)?;

    let mut patch = TemplatePatch {
        name: args.name,
        description: args.description,
        icon: args.icon,
        ..Default::default()
    };
    if let Some(category) = &args.category {
        patch.category = Some(Some(resolve_category(&toolkit.store, category)?));
    } else if args.no_category {
        patch.category = Some(None);
    }
    if !args.tag.is_empty() {
        patch.metadata = Some(MetadataPatch {
            tags: Some(split_tags(&args.tag)),
            ..Default::default()
        });
    }
    if !args.set.is_empty() || !args.unset.is_empty() {
        let mut properties = current.properties.clone();
        for key in &args.unset {
            properties.remove(key);
        }
        for assignment in &args.set {
            let (key, value) = parse_assignment(assignment)?;
            properties.insert(key, value);
        }
        patch.properties = Some(properties);
    }

    if patch == TemplatePatch::default() {
        return Err(miette::miette!("Nothing to change; pass at least one field option"));
    }

    toolkit.store.update(&id, patch)?;
    if !global.quiet {
        println!(
            "{} Updated template {}",
            style("✓").green(),
            style(format_short_id(&id)).cyan()
        );
        println!(
            "   Record a version with {}",
            style(format!("ntk version create {}", id)).yellow()
        );
    }
    Ok(())
}

fn run_delete(args: DeleteArgs, global: &GlobalOpts) -> Result<()> {
    let (_, mut toolkit) = open_toolkit(global)?;
    let id = resolve_template(&toolkit.store, &args.template)?;
    let template = toolkit.store.get(&id)?;

    if !args.yes {
        let versions = toolkit.store.version_history(&id).len();
        let confirmed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(format!(
                "Delete '{}' and {} recorded version(s)?",
                template.name, versions
            ))
            .default(false)
            .interact()
            .into_diagnostic()?;
        if !confirmed {
            println!("Cancelled.");
            return Ok(());
        }
    }

    toolkit.store.delete(&id)?;
    if !global.quiet {
        println!(
            "{} Deleted template {}",
            style("✓").green(),
            style(&template.name).cyan()
        );
    }
    Ok(())
}

fn run_instantiate(args: InstantiateArgs, global: &GlobalOpts) -> Result<()> {
    let (_, mut toolkit) = open_toolkit(global)?;
    let id = resolve_template(&toolkit.store, &args.template)?;

    let mut config = InstantiationConfig::at(args.x, args.y);
    for assignment in &args.set {
        let (key, value) = parse_assignment(assignment)?;
        config = config.with_property(key, value);
    }
    let mut placed = toolkit.store.instantiate(&id, config)?;

    let configs = toolkit.configs_for(&placed.element);
    toolkit.serializer.write_to_element(&mut placed.element, &configs);
    report_validation(&toolkit, &placed.element, global)?;

    match args.output {
        Some(path) => {
            write_element(&path, &placed.element)?;
            if !global.quiet {
                println!(
                    "{} Created element {} at ({}, {})",
                    style("✓").green(),
                    style(&placed.element.id).cyan(),
                    placed.position.x,
                    placed.position.y
                );
                println!("   {}", style(path.display()).dim());
            }
        }
        None => match global.format {
            OutputFormat::Yaml => print!("{}", serde_yml::to_string(&placed).into_diagnostic()?),
            OutputFormat::Id => println!("{}", placed.element.id),
            _ => println!("{}", serde_json::to_string_pretty(&placed).into_diagnostic()?),
        },
    }
    Ok(())
}

/// Warn (on stderr) about required values the new element still lacks
fn report_validation(toolkit: &crate::toolkit::Toolkit, element: &Element, global: &GlobalOpts) -> Result<()> {
    if global.quiet {
        return Ok(());
    }
    let result = toolkit
        .validate(element)
        .map_err(|e| miette::miette!("{}", e))?;
    for failure in &result.errors {
        eprintln!(
            "{} {}: {}",
            style("!").yellow(),
            failure.property,
            failure.message
        );
    }
    Ok(())
}

fn run_import(args: ImportArgs, global: &GlobalOpts) -> Result<()> {
    let (workspace, mut toolkit) = open_toolkit(global)?;
    let path = args.path.unwrap_or_else(|| workspace.templates_dir());
    let category = match &args.category {
        Some(c) => Some(resolve_category(&toolkit.store, c)?),
        None => None,
    };

    let mut drafts = Vec::new();
    let mut failed = 0usize;
    if path.is_file() {
        drafts.push((path.clone(), load_draft(&path)?));
    } else {
        let report = load_dir(&path);
        for (file, err) in &report.failures {
            failed += 1;
            eprintln!("{} {}: {}", style("!").yellow(), file.display(), err);
        }
        drafts.extend(report.drafts.into_iter().map(|d| (d.path, d.draft)));
    }

    let mut created = 0usize;
    for (file, mut draft) in drafts {
        if category.is_some() {
            draft.category = category;
        }
        match toolkit.store.create(draft) {
            Ok(id) => {
                created += 1;
                if !global.quiet {
                    println!(
                        "{} {} {}",
                        style("✓").green(),
                        style(format_short_id(&id)).cyan(),
                        style(file.display()).dim()
                    );
                }
            }
            Err(e) => {
                failed += 1;
                eprintln!("{} {}: {}", style("!").yellow(), file.display(), e);
            }
        }
    }
    toolkit.publish_pending();

    if !global.quiet {
        println!();
        println!(
            "Imported {} template(s){}",
            style(created).cyan(),
            if failed > 0 {
                format!(", {} failed", style(failed).red())
            } else {
                String::new()
            }
        );
    }
    if created == 0 && failed > 0 {
        return Err(miette::miette!("No templates imported"));
    }
    Ok(())
}

fn run_scaffold(args: ScaffoldArgs, global: &GlobalOpts) -> Result<()> {
    // Skeletons only need the built-in schemas, not a workspace
    let config = crate::core::Config::load();
    let toolkit = crate::toolkit::Toolkit::in_memory(config);

    let sample = Element::new("scaffold", args.node_type.clone());
    let configs = toolkit
        .registry
        .get_property_configs(&args.node_type, &PropertyContext::for_element(&sample));

    let mut ctx = ScaffoldContext::new(&args.name, &args.node_type, toolkit.config.author())
        .with_tags(split_tags(&args.tag))
        .with_configs(configs);
    if let Some(description) = args.description {
        ctx = ctx.with_description(description);
    }
    let yaml = ScaffoldGenerator::new()?.render(&ctx)?;

    match args.output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).into_diagnostic()?;
            }
            fs::write(&path, yaml).into_diagnostic()?;
            if !global.quiet {
                println!("{} Wrote {}", style("✓").green(), style(path.display()).cyan());
                println!("   Load it with {}", style("ntk template import").yellow());
            }
        }
        None => print!("{}", yaml),
    }
    Ok(())
}
