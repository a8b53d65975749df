//! `ntk props` command - Element property validation, editing and interchange
//!
//! Elements are read from and written back to JSON or YAML documents holding
//! `id`, `type` and `business_object`.

use clap::Subcommand;
use console::style;
use miette::{IntoDiagnostic, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::cli::helpers::{open_toolkit, parse_assignment, read_element, resolve_template, write_element};
use crate::cli::table::{Column, Table};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::element::{Element, PropertyContext};
use crate::schema::PropertyWizard;
use crate::serialize::{ExportFormat, ExportOptions};
use crate::template::apply_to_element;
use crate::toolkit::{EditOutcome, Toolkit};
use crate::validation::ValidationResult;

#[derive(Subcommand, Debug)]
pub enum PropsCommands {
    /// Validate an element's properties against its schema
    Validate(FileArgs),

    /// Show an element's properties with their labels
    Show(FileArgs),

    /// Set properties as key=value, transforming and validating each
    Set(SetArgs),

    /// Edit properties interactively
    Edit(FileArgs),

    /// Fill missing properties from a template and link the element to it
    Apply(ApplyArgs),

    /// Export properties as json, xml, yaml or csv
    Export(ExportArgs),

    /// Import properties from an interchange file
    Import(ImportArgs),

    /// Print the element's extension fragment as XML
    Fragment(FileArgs),
}

#[derive(clap::Args, Debug)]
pub struct FileArgs {
    /// Element document (.json or .yaml)
    pub file: PathBuf,
}

#[derive(clap::Args, Debug)]
pub struct SetArgs {
    /// Element document (.json or .yaml)
    pub file: PathBuf,

    /// Assignments as key=value
    #[arg(required = true)]
    pub assignments: Vec<String>,
}

#[derive(clap::Args, Debug)]
pub struct ApplyArgs {
    /// Element document (.json or .yaml)
    pub file: PathBuf,

    /// Template ID or name
    pub template: String,
}

#[derive(clap::Args, Debug)]
pub struct ExportArgs {
    /// Element document (.json or .yaml)
    pub file: PathBuf,

    /// Interchange format (default: output extension, then config, then json)
    #[arg(long = "as", short = 'a')]
    pub export_format: Option<ExportFormat>,

    /// Include export time and property metadata
    #[arg(long, short = 'm')]
    pub metadata: bool,

    /// Write to this file instead of stdout
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct ImportArgs {
    /// Element document (.json or .yaml)
    pub file: PathBuf,

    /// Interchange file to read
    pub input: PathBuf,

    /// Interchange format (default: input extension)
    #[arg(long = "as", short = 'a')]
    pub import_format: Option<ExportFormat>,
}

pub fn run(cmd: PropsCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        PropsCommands::Validate(args) => run_validate(args, global),
        PropsCommands::Show(args) => run_show(args, global),
        PropsCommands::Set(args) => run_set(args, global),
        PropsCommands::Edit(args) => run_edit(args, global),
        PropsCommands::Apply(args) => run_apply(args, global),
        PropsCommands::Export(args) => run_export(args, global),
        PropsCommands::Import(args) => run_import(args, global),
        PropsCommands::Fragment(args) => run_fragment(args),
    }
}

fn validate(toolkit: &Toolkit, element: &Element) -> Result<ValidationResult> {
    toolkit
        .validate(element)
        .map_err(|e| miette::miette!("Custom validator failed: {}", e))
}

fn run_validate(args: FileArgs, global: &GlobalOpts) -> Result<()> {
    let (_, toolkit) = open_toolkit(global)?;
    let element = read_element(&args.file)?;
    let result = validate(&toolkit, &element)?;

    match global.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result).into_diagnostic()?),
        OutputFormat::Yaml => print!("{}", serde_yml::to_string(&result).into_diagnostic()?),
        _ => {
            for failure in &result.errors {
                println!(
                    "{} {} {}: {}",
                    style("✗").red(),
                    style(&failure.property).bold(),
                    style(format!("[{}]", failure.rule)).dim(),
                    failure.message
                );
            }
            for warning in &result.warnings {
                println!("{} {}", style("!").yellow(), warning);
            }
            if result.is_valid && !global.quiet {
                println!(
                    "{} {} ({}) is valid",
                    style("✓").green(),
                    style(&element.id).cyan(),
                    element.element_type
                );
            }
        }
    }

    if !result.is_valid {
        return Err(miette::miette!(
            "{} validation error(s) in {}",
            result.errors.len(),
            args.file.display()
        ));
    }
    Ok(())
}

fn run_show(args: FileArgs, global: &GlobalOpts) -> Result<()> {
    let (_, toolkit) = open_toolkit(global)?;
    let element = read_element(&args.file)?;
    let configs = toolkit.configs_for(&element);

    match global.format {
        OutputFormat::Json => {
            let json = crate::core::value::bag_to_json(element.properties());
            println!("{}", serde_json::to_string_pretty(&json).into_diagnostic()?);
        }
        OutputFormat::Yaml => print!("{}", serde_yml::to_string(element.properties()).into_diagnostic()?),
        format => {
            let mut table = Table::new(
                &[
                    Column::new("KEY", 22),
                    Column::new("LABEL", 24),
                    Column::new("TYPE", 12),
                    Column::new("VALUE", 30),
                ],
                "property",
            );
            for (key, value) in element.properties() {
                let config = configs.iter().find(|c| &c.key == key);
                table.push(vec![
                    key.clone(),
                    config.map(|c| c.label.clone()).unwrap_or_default(),
                    config.map(|c| c.property_type.to_string()).unwrap_or_else(|| "-".into()),
                    value.to_text(),
                ]);
            }
            table.print(format, global.quiet)?;
            if let Some(link) = &element.business_object.template {
                if !global.quiet && matches!(format, OutputFormat::Auto | OutputFormat::Tsv) {
                    println!("Template: {} v{}", style(link.id).cyan(), link.version);
                }
            }
        }
    }
    Ok(())
}

/// Print one edit's outcome; returns whether it was applied
fn report_outcome(key: &str, outcome: &EditOutcome, quiet: bool) -> bool {
    if let Some(warning) = &outcome.warning {
        eprintln!("{} {}: {}", style("!").yellow(), key, warning);
    }
    if outcome.applied {
        if !quiet {
            println!("{} {} = {}", style("✓").green(), key, outcome.value);
        }
    } else {
        for failure in &outcome.validation.errors {
            eprintln!("{} {}: {}", style("✗").red(), key, failure.message);
        }
    }
    outcome.applied
}

fn run_set(args: SetArgs, global: &GlobalOpts) -> Result<()> {
    let (_, toolkit) = open_toolkit(global)?;
    let mut element = read_element(&args.file)?;

    let mut rejected = 0usize;
    for assignment in &args.assignments {
        let (key, value) = parse_assignment(assignment)?;
        let outcome = toolkit.apply_edit(&mut element, &key, value)?;
        if !report_outcome(&key, &outcome, global.quiet) {
            rejected += 1;
        }
    }

    write_element(&args.file, &element)?;
    if rejected > 0 {
        return Err(miette::miette!("{} value(s) rejected", rejected));
    }
    Ok(())
}

fn run_edit(args: FileArgs, global: &GlobalOpts) -> Result<()> {
    let (_, toolkit) = open_toolkit(global)?;
    let mut element = read_element(&args.file)?;
    let groups = {
        let ctx = PropertyContext::for_element(&element);
        toolkit.registry.get_property_groups(&element.element_type, &ctx)
    };
    if groups.is_empty() {
        return Err(miette::miette!(
            "No schema for element type '{}'",
            element.element_type
        ));
    }

    let current = element.properties().clone();
    let answers = PropertyWizard::new().run(&element, &groups, &current)?;
    for (key, value) in answers.edits {
        let outcome = toolkit.apply_edit(&mut element, &key, value)?;
        report_outcome(&key, &outcome, global.quiet);
    }

    write_element(&args.file, &element)?;
    Ok(())
}

fn run_apply(args: ApplyArgs, global: &GlobalOpts) -> Result<()> {
    let (_, toolkit) = open_toolkit(global)?;
    let mut element = read_element(&args.file)?;
    let id = resolve_template(&toolkit.store, &args.template)?;
    let template = toolkit.store.get(&id)?;

    if template.node_type != element.element_type {
        tracing::warn!(
            template = %template.node_type,
            element = %element.element_type,
            "applying template to a different element type"
        );
    }
    let before = element.properties().len();
    apply_to_element(&template, &mut element);
    let configs = toolkit.configs_for(&element);
    toolkit.serializer.write_to_element(&mut element, &configs);
    write_element(&args.file, &element)?;

    if !global.quiet {
        println!(
            "{} Applied {} ({} new propert{})",
            style("✓").green(),
            style(&template.name).cyan(),
            element.properties().len() - before,
            if element.properties().len() - before == 1 { "y" } else { "ies" }
        );
    }
    Ok(())
}

fn format_for(explicit: Option<ExportFormat>, path: Option<&Path>, fallback: Option<&str>) -> Result<ExportFormat> {
    if let Some(format) = explicit {
        return Ok(format);
    }
    if let Some(format) = path
        .and_then(|p| p.extension())
        .and_then(|e| e.to_str())
        .and_then(ExportFormat::from_extension)
    {
        return Ok(format);
    }
    match fallback {
        Some(name) => Ok(name.parse::<ExportFormat>()?),
        None => Ok(ExportFormat::default()),
    }
}

fn run_export(args: ExportArgs, global: &GlobalOpts) -> Result<()> {
    let (_, toolkit) = open_toolkit(global)?;
    let element = read_element(&args.file)?;
    let configs = toolkit.configs_for(&element);
    let format = format_for(
        args.export_format,
        args.output.as_deref(),
        toolkit.config.default_format.as_deref(),
    )?;
    let options = if args.metadata {
        ExportOptions::with_metadata()
    } else {
        ExportOptions::default()
    };

    let text = toolkit
        .serializer
        .export(element.properties(), &configs, format, &options)?;
    match args.output {
        Some(path) => {
            fs::write(&path, &text).into_diagnostic()?;
            if !global.quiet {
                println!(
                    "{} Exported {} propert{} as {} to {}",
                    style("✓").green(),
                    element.properties().len(),
                    if element.properties().len() == 1 { "y" } else { "ies" },
                    format,
                    style(path.display()).cyan()
                );
            }
        }
        None => {
            print!("{}", text);
            if !text.ends_with('\n') {
                println!();
            }
        }
    }
    Ok(())
}

fn run_import(args: ImportArgs, global: &GlobalOpts) -> Result<()> {
    let (_, toolkit) = open_toolkit(global)?;
    let mut element = read_element(&args.file)?;
    let configs = toolkit.configs_for(&element);
    let format = format_for(args.import_format, Some(&args.input), None)?;
    let data = fs::read_to_string(&args.input)
        .map_err(|e| miette::miette!("Failed to read {}: {}", args.input.display(), e))?;

    let imported = toolkit.serializer.import(&data, format, &configs)?;
    let count = imported.len();
    element.business_object.properties.extend(imported);
    toolkit.serializer.write_to_element(&mut element, &configs);

    let result = validate(&toolkit, &element)?;
    write_element(&args.file, &element)?;

    if !global.quiet {
        println!(
            "{} Imported {} propert{} from {}",
            style("✓").green(),
            count,
            if count == 1 { "y" } else { "ies" },
            style(args.input.display()).cyan()
        );
        for failure in &result.errors {
            eprintln!("{} {}: {}", style("!").yellow(), failure.property, failure.message);
        }
    }
    Ok(())
}

fn run_fragment(args: FileArgs) -> Result<()> {
    let element = read_element(&args.file)?;
    match &element.business_object.extension {
        Some(fragment) => {
            println!("{}", fragment.to_xml(&element.id, &element.element_type));
            Ok(())
        }
        None => Err(miette::miette!(
            help = "run 'ntk props set' or 'ntk props import' to generate one",
            "{} has no extension fragment",
            element.id
        )),
    }
}
