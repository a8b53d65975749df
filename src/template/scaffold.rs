//! YAML authoring skeletons for new templates

use chrono::{DateTime, Utc};
use miette::Diagnostic;
use rust_embed::Embed;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tera::Tera;
use thiserror::Error;

use crate::schema::property::{PropertyConfig, PropertyType};
use crate::serialize::escape::{yaml_key, yaml_quote};

#[derive(Embed)]
#[folder = "scaffold/"]
struct EmbeddedScaffolds;

const SKELETON: &str = "template.yaml.tera";

const FALLBACK_SKELETON: &str = r#"name: {{ name }}
nodeType: {{ node_type }}
description: {{ description }}
tags: [{{ tags | join(sep=", ") }}]
{% if fields | length == 0 %}properties: {}{% else %}properties:
{%- for field in fields %}
  {{ field.key }}: {{ field.value }}
{%- endfor %}{% endif %}
"#;

#[derive(Debug, Error, Diagnostic)]
pub enum ScaffoldError {
    #[error("Scaffold template error: {0}")]
    #[diagnostic(code(ntk::scaffold::template))]
    Template(String),

    #[error("Scaffold rendering error: {0}")]
    #[diagnostic(code(ntk::scaffold::render))]
    Render(String),
}

#[derive(Debug, Clone)]
pub struct ScaffoldContext {
    pub name: String,
    pub node_type: String,
    pub author: String,
    pub created: DateTime<Utc>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    /// Property configs whose keys seed the `properties` block
    pub configs: Vec<PropertyConfig>,
}

impl ScaffoldContext {
    pub fn new(name: impl Into<String>, node_type: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            node_type: node_type.into(),
            author: author.into(),
            created: Utc::now(),
            description: None,
            tags: Vec::new(),
            configs: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_configs(mut self, configs: Vec<PropertyConfig>) -> Self {
        self.configs = configs;
        self
    }
}

#[derive(Debug, Serialize)]
struct FieldLine {
    key: String,
    label: String,
    value: String,
    required: bool,
    description: Option<String>,
}

pub struct ScaffoldGenerator {
    tera: Tera,
}

impl ScaffoldGenerator {
    /// Load the embedded skeletons, falling back to a built-in one
    pub fn new() -> Result<Self, ScaffoldError> {
        let mut tera = Tera::default();
        for file in EmbeddedScaffolds::iter() {
            let name = file.as_ref();
            if let Some(content) = EmbeddedScaffolds::get(name) {
                if let Ok(text) = std::str::from_utf8(&content.data) {
                    tera.add_raw_template(name, text)
                        .map_err(|e| ScaffoldError::Template(e.to_string()))?;
                }
            }
        }
        if !tera.get_template_names().any(|n| n == SKELETON) {
            tera.add_raw_template(SKELETON, FALLBACK_SKELETON)
                .map_err(|e| ScaffoldError::Template(e.to_string()))?;
        }
        Ok(Self { tera })
    }

    pub fn render(&self, ctx: &ScaffoldContext) -> Result<String, ScaffoldError> {
        let fields: Vec<FieldLine> = ctx
            .configs
            .iter()
            .filter(|c| c.key != "name")
            .map(field_line)
            .collect();
        let mut required: Vec<String> = vec![yaml_key("name")];
        required.extend(
            ctx.configs
                .iter()
                .filter(|c| c.required && c.key != "name")
                .map(|c| yaml_key(&c.key)),
        );

        let mut context = tera::Context::new();
        context.insert("title", &one_line(&ctx.name));
        context.insert("name", &yaml_quote(&ctx.name));
        context.insert("node_type", &yaml_quote(&ctx.node_type));
        context.insert("node_type_raw", &ctx.node_type);
        context.insert("description", &yaml_quote(ctx.description.as_deref().unwrap_or_default()));
        context.insert("author", &one_line(&ctx.author));
        context.insert("created", &ctx.created.to_rfc3339());
        context.insert("created_date", &ctx.created.format("%Y-%m-%d").to_string());
        context.insert(
            "tags",
            &ctx.tags.iter().map(|t| yaml_quote(t)).collect::<Vec<_>>(),
        );
        context.insert("fields", &fields);
        context.insert("required", &required);

        self.tera
            .render(SKELETON, &context)
            .map_err(|e| ScaffoldError::Render(e.to_string()))
    }
}

fn field_line(config: &PropertyConfig) -> FieldLine {
    let value = match &config.default_value {
        Some(value) => JsonValue::from(value.clone()),
        None => match config.property_type {
            PropertyType::Boolean => JsonValue::Bool(false),
            PropertyType::Number | PropertyType::Json | PropertyType::Custom => JsonValue::Null,
            PropertyType::MultiSelect => JsonValue::Array(Vec::new()),
            _ => JsonValue::String(String::new()),
        },
    };
    FieldLine {
        key: yaml_key(&config.key),
        label: one_line(&config.label),
        // JSON scalars and flow collections are valid YAML
        value: value.to_string(),
        required: config.required,
        description: config.description.as_deref().map(one_line),
    }
}

fn one_line(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::PropertyValue;
    use crate::template::model::TemplateDraft;

    fn configs() -> Vec<PropertyConfig> {
        let mut priority = PropertyConfig::new("priority", "Priority", PropertyType::Number);
        priority.default_value = Some(PropertyValue::Number(50.0));
        vec![
            PropertyConfig::text("name", "Name").required(),
            PropertyConfig::text("assignee", "Assignee").required(),
            priority,
            PropertyConfig::new("urgent", "Urgent", PropertyType::Boolean),
            PropertyConfig::text("odd key", "Odd\nlabel"),
        ]
    }

    #[test]
    fn test_skeleton_parses_as_draft() {
        let generator = ScaffoldGenerator::new().unwrap();
        let ctx = ScaffoldContext::new("Invoice \"Approval\"", "bpmn:UserTask", "alice")
            .with_description("Approve: invoices")
            .with_tags(vec!["finance".into(), "a, b".into()])
            .with_configs(configs());
        let yaml = generator.render(&ctx).unwrap();

        let draft: TemplateDraft = serde_yml::from_str(&yaml).unwrap();
        assert_eq!(draft.name, "Invoice \"Approval\"");
        assert_eq!(draft.node_type, "bpmn:UserTask");
        assert_eq!(draft.description, "Approve: invoices");
        assert_eq!(draft.tags, vec!["finance", "a, b"]);
        assert_eq!(draft.properties.get("assignee"), Some(&PropertyValue::from("")));
        assert_eq!(draft.properties.get("priority"), Some(&PropertyValue::Number(50.0)));
        assert_eq!(draft.properties.get("urgent"), Some(&PropertyValue::Bool(false)));
        assert!(draft.properties.contains_key("odd key"));
        assert!(!draft.properties.contains_key("name"));
        assert_eq!(draft.template_config.required_fields, vec!["name", "assignee"]);
        assert!(yaml.contains("# Created by alice"));
    }

    #[test]
    fn test_skeleton_without_configs() {
        let generator = ScaffoldGenerator::new().unwrap();
        let yaml = generator
            .render(&ScaffoldContext::new("Blank", "bpmn:Task", "bob"))
            .unwrap();
        let draft: TemplateDraft = serde_yml::from_str(&yaml).unwrap();
        assert!(draft.properties.is_empty());
        assert!(draft.tags.is_empty());
    }
}
