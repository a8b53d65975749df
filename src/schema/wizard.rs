//! Schema-driven interactive property editor
//!
//! Walks the visible property groups for an element and prompts for each
//! editable field, pre-filled with the element's current value.

use console::style;
use dialoguer::{theme::ColorfulTheme, Input, MultiSelect, Select};
use miette::{IntoDiagnostic, Result};
use serde_json::Value as JsonValue;

use crate::core::element::Element;
use crate::core::value::{PropertyBag, PropertyValue};
use crate::schema::property::{PropertyConfig, PropertyGroup, PropertyType, SelectOption};

/// Interactive editor over a set of property groups
pub struct PropertyWizard {
    theme: ColorfulTheme,
}

/// Values the user changed, in prompt order
#[derive(Debug, Default)]
pub struct WizardResult {
    pub edits: Vec<(String, PropertyValue)>,
}

impl WizardResult {
    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.edits.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }
}

impl PropertyWizard {
    pub fn new() -> Self {
        Self {
            theme: ColorfulTheme::default(),
        }
    }

    /// Prompt for every editable field; unchanged answers are not reported
    pub fn run(&self, element: &Element, groups: &[PropertyGroup], current: &PropertyBag) -> Result<WizardResult> {
        println!();
        println!(
            "{} Editing {} ({})",
            style("◆").cyan(),
            style(&element.id).bold(),
            element.element_type
        );
        println!("{}", style("─".repeat(50)).dim());

        let mut result = WizardResult::default();
        for group in groups {
            let editable: Vec<&PropertyConfig> = group
                .properties
                .iter()
                .filter(|p| p.is_editable(element))
                .collect();
            if editable.is_empty() {
                continue;
            }
            println!();
            println!("{}", style(&group.label).bold().underlined());

            for config in editable {
                let existing = current
                    .get(&config.key)
                    .cloned()
                    .or_else(|| config.default_value.clone())
                    .unwrap_or_default();
                let answer = self.prompt_field(config, &existing)?;
                if answer != existing && !(answer.is_empty() && existing.is_empty()) {
                    result.edits.push((config.key.clone(), answer));
                }
            }
        }

        println!();
        println!("{} {} value(s) changed", style("✓").green(), result.edits.len());
        Ok(result)
    }

    fn prompt_field(&self, config: &PropertyConfig, existing: &PropertyValue) -> Result<PropertyValue> {
        let prompt = format_prompt(config);

        match config.property_type {
            PropertyType::Boolean => {
                let items = &["Yes", "No"];
                let default_idx = match existing {
                    PropertyValue::Bool(true) => 0,
                    PropertyValue::String(s) if s == "true" => 0,
                    _ => 1,
                };
                let selection = Select::with_theme(&self.theme)
                    .with_prompt(&prompt)
                    .items(items)
                    .default(default_idx)
                    .interact()
                    .into_diagnostic()?;
                Ok(PropertyValue::Bool(selection == 0))
            }

            PropertyType::Select if !config.options.is_empty() => {
                let labels: Vec<&str> = config.options.iter().map(|o| o.label.as_str()).collect();
                let default_idx = option_index(&config.options, existing).unwrap_or(0);
                let selection = Select::with_theme(&self.theme)
                    .with_prompt(&prompt)
                    .items(&labels)
                    .default(default_idx)
                    .interact()
                    .into_diagnostic()?;
                Ok(PropertyValue::from(config.options[selection].value.clone()))
            }

            PropertyType::MultiSelect if !config.options.is_empty() => {
                let labels: Vec<&str> = config.options.iter().map(|o| o.label.as_str()).collect();
                let chosen: Vec<String> = match existing {
                    PropertyValue::List(items) => items.clone(),
                    other => other
                        .to_text()
                        .split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect(),
                };
                let defaults: Vec<bool> = config
                    .options
                    .iter()
                    .map(|o| chosen.contains(&option_text(&o.value)))
                    .collect();
                let selection = MultiSelect::with_theme(&self.theme)
                    .with_prompt(&prompt)
                    .items(&labels)
                    .defaults(&defaults)
                    .interact()
                    .into_diagnostic()?;
                Ok(PropertyValue::List(
                    selection
                        .into_iter()
                        .map(|i| option_text(&config.options[i].value))
                        .collect(),
                ))
            }

            PropertyType::Number => {
                let value: String = Input::with_theme(&self.theme)
                    .with_prompt(&prompt)
                    .default(existing.to_text())
                    .allow_empty(!config.is_required())
                    .interact_text()
                    .into_diagnostic()?;
                if value.trim().is_empty() {
                    return Ok(PropertyValue::Null);
                }
                // leave non-numeric input as text so validation reports it
                Ok(match value.trim().parse::<f64>() {
                    Ok(n) => PropertyValue::Number(n),
                    Err(_) => PropertyValue::String(value),
                })
            }

            _ => {
                let value: String = Input::with_theme(&self.theme)
                    .with_prompt(&prompt)
                    .default(existing.to_text())
                    .allow_empty(!config.is_required())
                    .interact_text()
                    .into_diagnostic()?;
                Ok(PropertyValue::String(value))
            }
        }
    }
}

impl Default for PropertyWizard {
    fn default() -> Self {
        Self::new()
    }
}

fn option_text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn option_index(options: &[SelectOption], existing: &PropertyValue) -> Option<usize> {
    let current = existing.to_text();
    options.iter().position(|o| option_text(&o.value) == current)
}

fn format_prompt(config: &PropertyConfig) -> String {
    let marker = if config.is_required() { "*" } else { "" };
    match &config.description {
        Some(desc) => {
            let short: String = if desc.chars().count() > 50 {
                format!("{}...", desc.chars().take(47).collect::<String>())
            } else {
                desc.clone()
            };
            format!("{}{} ({})", config.label, marker, style(short).dim())
        }
        None => format!("{}{}", config.label, marker),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_index_matches_numbers_and_strings() {
        let options = vec![
            SelectOption::new("Low", 1),
            SelectOption::new("High", 3),
            SelectOption::new("Mixed", "Mixed"),
        ];
        assert_eq!(option_index(&options, &PropertyValue::Number(3.0)), Some(1));
        assert_eq!(option_index(&options, &"Mixed".into()), Some(2));
        assert_eq!(option_index(&options, &PropertyValue::Null), None);
    }

    #[test]
    fn test_prompt_marks_required_fields() {
        let config = PropertyConfig::text("name", "Name").required();
        assert_eq!(format_prompt(&config), "Name*");
    }
}
