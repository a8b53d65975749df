//! Shared helper functions for CLI commands

use miette::{IntoDiagnostic, Result};
use serde_json::Value as JsonValue;
use std::fs;
use std::path::Path;

use crate::cli::GlobalOpts;
use crate::core::element::Element;
use crate::core::identity::RecordId;
use crate::core::value::PropertyValue;
use crate::core::{Config, Workspace};
use crate::template::TemplateStore;
use crate::toolkit::Toolkit;

/// Locate the workspace from `--workspace` or the current directory
pub fn open_workspace(global: &GlobalOpts) -> Result<Workspace> {
    let workspace = match &global.workspace {
        Some(path) => Workspace::discover_from(path)?,
        None => Workspace::discover()?,
    };
    Ok(workspace)
}

/// Open the workspace and its toolkit, seeding the catalog if needed
pub fn open_toolkit(global: &GlobalOpts) -> Result<(Workspace, Toolkit)> {
    let workspace = open_workspace(global)?;
    let config = Config::load_for(Some(&workspace));
    let toolkit = Toolkit::open(&workspace, config)?;
    Ok((workspace, toolkit))
}

/// Resolve a template reference (ID or unique name)
pub fn resolve_template(store: &TemplateStore, reference: &str) -> Result<RecordId> {
    Ok(store.resolve(reference)?)
}

/// Resolve a category reference (ID or exact name)
pub fn resolve_category(store: &TemplateStore, reference: &str) -> Result<RecordId> {
    if let Ok(id) = reference.parse::<RecordId>() {
        if store.get_category(&id).is_some() {
            return Ok(id);
        }
    }
    store
        .find_category(reference)
        .map(|c| c.id)
        .ok_or_else(|| miette::miette!("Category not found: {}", reference))
}

/// Format a RecordId for display, truncating if too long
///
/// IDs longer than 16 characters are truncated to 13 chars with "..." suffix.
pub fn format_short_id(id: &RecordId) -> String {
    let s = id.to_string();
    if s.len() > 16 {
        format!("{}...", &s[..13])
    } else {
        s
    }
}

/// Truncate a string to max_len characters, adding "..." if truncated
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Parse `key=value`; the value is read as JSON when it parses, else as text
pub fn parse_assignment(s: &str) -> Result<(String, PropertyValue)> {
    let (key, raw) = s
        .split_once('=')
        .ok_or_else(|| miette::miette!("Expected key=value, got '{}'", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(miette::miette!("Empty property key in '{}'", s));
    }
    let value = match serde_json::from_str::<JsonValue>(raw) {
        Ok(json) => PropertyValue::from(json),
        Err(_) => PropertyValue::from(raw),
    };
    Ok((key.to_string(), value))
}

/// Split comma-separated tag arguments, dropping blanks
pub fn split_tags(raw: &[String]) -> Vec<String> {
    raw.iter()
        .flat_map(|t| t.split(','))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

/// Load an element document (JSON or YAML by extension)
pub fn read_element(path: &Path) -> Result<Element> {
    let content = fs::read_to_string(path)
        .map_err(|e| miette::miette!("Failed to read {}: {}", path.display(), e))?;
    if is_json(path) {
        serde_json::from_str(&content).into_diagnostic()
    } else {
        let filename = path.display().to_string();
        Ok(crate::yaml::parse_document(&content, &filename)?)
    }
}

/// Write an element document back in the format implied by its extension
pub fn write_element(path: &Path, element: &Element) -> Result<()> {
    let content = if is_json(path) {
        let mut json = serde_json::to_string_pretty(element).into_diagnostic()?;
        json.push('\n');
        json
    } else {
        serde_yml::to_string(element).into_diagnostic()?
    };
    fs::write(path, content).into_diagnostic()
}
