//! `ntk schema` command - Element property schema introspection
//!
//! Shows the effective schema for an element type: base groups, extension
//! groups, dynamic properties and any groups published by templates.

use clap::Subcommand;
use console::style;
use miette::{IntoDiagnostic, Result};
use serde_json::{json, Value as JsonValue};

use crate::cli::helpers::open_toolkit;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::element::{Element, PropertyContext};
use crate::core::Config;
use crate::schema::PropertyGroup;
use crate::toolkit::Toolkit;

#[derive(Subcommand, Debug)]
pub enum SchemaCommands {
    /// List element types with a registered schema
    List,

    /// Show the property groups for an element type
    Show(ShowArgs),
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Element type, e.g. bpmn:UserTask
    pub element_type: String,
}

pub fn run(cmd: SchemaCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        SchemaCommands::List => list_schemas(global),
        SchemaCommands::Show(args) => show_schema(args, global),
    }
}

/// Workspace toolkit when there is one, so template forms are included
fn toolkit(global: &GlobalOpts) -> Result<Toolkit> {
    match open_toolkit(global) {
        Ok((_, toolkit)) => Ok(toolkit),
        Err(e) if global.workspace.is_none() => {
            tracing::debug!("no workspace, using built-in schemas only: {}", e);
            Ok(Toolkit::in_memory(Config::load_for(None)))
        }
        Err(e) => Err(e),
    }
}

fn list_schemas(global: &GlobalOpts) -> Result<()> {
    let toolkit = toolkit(global)?;
    let types = toolkit.registry.element_types();

    match global.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&types).into_diagnostic()?),
        OutputFormat::Yaml => print!("{}", serde_yml::to_string(&types).into_diagnostic()?),
        OutputFormat::Id | OutputFormat::Csv => {
            for t in types {
                println!("{}", t);
            }
        }
        _ => {
            println!("{:<28} {}", style("ELEMENT TYPE").bold(), style("GROUPS").bold());
            println!("{}", "-".repeat(40));
            for t in &types {
                let groups = toolkit.registry.get_schema(t).map_or(0, |s| s.groups.len());
                println!("{:<28} {}", t, groups);
            }
            println!();
            println!("Use 'ntk schema show <type>' for property details");
        }
    }
    Ok(())
}

fn show_schema(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let toolkit = toolkit(global)?;
    let element = Element::new("schema", args.element_type.clone());
    let ctx = PropertyContext::for_element(&element);
    let groups = toolkit.registry.get_property_groups(&args.element_type, &ctx);

    if groups.is_empty() {
        return Err(miette::miette!(
            help = "run 'ntk schema list' to see registered types",
            "No schema for element type '{}'",
            args.element_type
        ));
    }

    match global.format {
        OutputFormat::Json => {
            let doc = schema_json(&args.element_type, &groups);
            println!("{}", serde_json::to_string_pretty(&doc).into_diagnostic()?);
        }
        OutputFormat::Yaml => {
            let doc = schema_json(&args.element_type, &groups);
            print!("{}", serde_yml::to_string(&doc).into_diagnostic()?);
        }
        OutputFormat::Id => {
            for config in groups.iter().flat_map(|g| &g.properties) {
                println!("{}", config.key);
            }
        }
        _ => print_groups(&args.element_type, &groups),
    }
    Ok(())
}

fn schema_json(element_type: &str, groups: &[PropertyGroup]) -> JsonValue {
    let groups: Vec<JsonValue> = groups
        .iter()
        .map(|g| {
            let properties: Vec<JsonValue> = g
                .properties
                .iter()
                .map(|p| {
                    json!({
                        "key": p.key,
                        "label": p.label,
                        "type": p.property_type,
                        "required": p.is_required(),
                        "default": p.default_value.as_ref().map(|v| v.to_json()),
                        "options": p.options,
                        "description": p.description,
                    })
                })
                .collect();
            json!({
                "key": g.key,
                "label": g.label,
                "order": g.sort_order(),
                "properties": properties,
            })
        })
        .collect();
    json!({ "elementType": element_type, "groups": groups })
}

fn print_groups(element_type: &str, groups: &[PropertyGroup]) {
    println!("{} {}", style("Schema:").bold(), style(element_type).cyan());
    for group in groups {
        println!();
        println!("{}", style(&group.label).bold().underlined());
        for p in &group.properties {
            let required = if p.is_required() { "*" } else { " " };
            let default = p
                .default_value
                .as_ref()
                .map(|v| format!(" = {}", v))
                .unwrap_or_default();
            println!(
                "  {}{:<22} {:<12} {}{}",
                style(required).red(),
                p.key,
                style(p.property_type).dim(),
                p.label,
                style(default).dim()
            );
            if !p.options.is_empty() {
                let labels: Vec<&str> = p.options.iter().map(|o| o.label.as_str()).collect();
                println!("   {:<22} {}", "", style(labels.join(" | ")).dim());
            }
        }
    }
    println!();
    println!("{} required", style("*").red());
}
