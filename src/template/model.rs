//! Template, category and version records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;

use crate::core::element::Element;
use crate::core::identity::RecordId;
use crate::core::value::PropertyBag;

/// Version stamped on newly created templates
pub const INITIAL_VERSION: &str = "1.0.0";

/// A reusable, versioned bundle of default properties for one element type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<RecordId>,
    #[serde(default)]
    pub icon: String,
    pub node_type: String,
    #[serde(default)]
    pub properties: PropertyBag,
    #[serde(default)]
    pub ui_config: UiConfig,
    #[serde(default)]
    pub template_config: TemplateConfig,
    pub metadata: TemplateMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dynamic_form: Option<DynamicFormConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<Preview>,
}

impl Template {
    pub fn is_default(&self) -> bool {
        self.template_config.is_default
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.metadata.tags.iter().any(|t| t == tag)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    #[default]
    Rectangle,
    Circle,
    Diamond,
    Gateway,
    /// Connections; drawn between elements with no fixed size
    Edge,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Default for Size {
    fn default() -> Self {
        Self {
            width: 100,
            height: 80,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Colors {
    pub fill: String,
    pub stroke: String,
    pub text: String,
}

impl Default for Colors {
    fn default() -> Self {
        Self {
            fill: "#ffffff".to_string(),
            stroke: "#333333".to_string(),
            text: "#333333".to_string(),
        }
    }
}

/// Presentation hints for the diagram canvas
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UiConfig {
    #[serde(default)]
    pub shape: Shape,
    #[serde(default)]
    pub size: Size,
    #[serde(default)]
    pub colors: Colors,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateConfig {
    /// Seeded from the built-in catalog
    #[serde(default)]
    pub is_default: bool,
    #[serde(default = "default_true")]
    pub is_customizable: bool,
    #[serde(default)]
    pub required_fields: Vec<String>,
    #[serde(default)]
    pub default_values: PropertyBag,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            is_default: false,
            is_customizable: true,
            required_fields: Vec::new(),
            default_values: PropertyBag::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateMetadata {
    pub version: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub usage_count: u64,
}

impl TemplateMetadata {
    pub fn new(author: impl Into<String>, tags: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            version: INITIAL_VERSION.to_string(),
            author: author.into(),
            created_at: now,
            updated_at: now,
            tags,
            usage_count: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Preview {
    #[serde(default)]
    pub thumbnail: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub examples: Vec<String>,
}

/// Per-template field declarations published into the schema registry
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DynamicFormConfig {
    #[serde(default)]
    pub sections: Vec<FormSection>,
}

impl DynamicFormConfig {
    pub fn is_empty(&self) -> bool {
        self.sections.iter().all(|s| s.fields.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormSection {
    pub title: String,
    #[serde(default)]
    pub fields: Vec<DynamicField>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    Text,
    Textarea,
    Select,
    Checkbox,
    Number,
    Date,
    File,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicField {
    pub key: String,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    pub label: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<FieldValidation>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FieldValidation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

/// Input for [`TemplateStore::create`](super::store::TemplateStore::create)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<RecordId>,
    #[serde(default)]
    pub icon: String,
    pub node_type: String,
    #[serde(default)]
    pub properties: PropertyBag,
    #[serde(default)]
    pub ui_config: UiConfig,
    #[serde(default)]
    pub template_config: TemplateConfig,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dynamic_form: Option<DynamicFormConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<Preview>,
}

impl TemplateDraft {
    pub fn new(name: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            node_type: node_type.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn in_category(mut self, category: RecordId) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<crate::core::value::PropertyValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_dynamic_form(mut self, form: DynamicFormConfig) -> Self {
        self.dynamic_form = Some(form);
        self
    }
}

/// Metadata fields an update may change; `updated_at` is always refreshed
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MetadataPatch {
    pub version: Option<String>,
    pub author: Option<String>,
    pub tags: Option<Vec<String>>,
    pub usage_count: Option<u64>,
}

/// Partial update; `None` leaves a field untouched
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TemplatePatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<Option<RecordId>>,
    pub icon: Option<String>,
    pub node_type: Option<String>,
    pub properties: Option<PropertyBag>,
    pub ui_config: Option<UiConfig>,
    pub template_config: Option<TemplateConfig>,
    pub dynamic_form: Option<Option<DynamicFormConfig>>,
    pub preview: Option<Option<Preview>>,
    pub metadata: Option<MetadataPatch>,
}

impl TemplatePatch {
    /// Every content field of `snapshot`; of its metadata only the author and
    /// tags are carried over
    pub fn from_snapshot(snapshot: &Template) -> Self {
        Self {
            name: Some(snapshot.name.clone()),
            description: Some(snapshot.description.clone()),
            category: Some(snapshot.category),
            icon: Some(snapshot.icon.clone()),
            node_type: Some(snapshot.node_type.clone()),
            properties: Some(snapshot.properties.clone()),
            ui_config: Some(snapshot.ui_config.clone()),
            template_config: Some(snapshot.template_config.clone()),
            dynamic_form: Some(snapshot.dynamic_form.clone()),
            preview: Some(snapshot.preview.clone()),
            metadata: Some(MetadataPatch {
                author: Some(snapshot.metadata.author.clone()),
                tags: Some(snapshot.metadata.tags.clone()),
                ..Default::default()
            }),
        }
    }

    pub fn apply(self, template: &mut Template) {
        if let Some(name) = self.name {
            template.name = name;
        }
        if let Some(description) = self.description {
            template.description = description;
        }
        if let Some(category) = self.category {
            template.category = category;
        }
        if let Some(icon) = self.icon {
            template.icon = icon;
        }
        if let Some(node_type) = self.node_type {
            template.node_type = node_type;
        }
        if let Some(properties) = self.properties {
            template.properties = properties;
        }
        if let Some(ui_config) = self.ui_config {
            template.ui_config = ui_config;
        }
        if let Some(template_config) = self.template_config {
            template.template_config = template_config;
        }
        if let Some(dynamic_form) = self.dynamic_form {
            template.dynamic_form = dynamic_form;
        }
        if let Some(preview) = self.preview {
            template.preview = preview;
        }

        let meta = &mut template.metadata;
        if let Some(patch) = self.metadata {
            if let Some(version) = patch.version {
                meta.version = version;
            }
            if let Some(author) = patch.author {
                meta.author = author;
            }
            if let Some(tags) = patch.tags {
                meta.tags = tags;
            }
            if let Some(usage_count) = patch.usage_count {
                meta.usage_count = usage_count;
            }
        }
        meta.updated_at = Utc::now();
    }
}

/// How a category orders its templates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortPolicy {
    #[default]
    Name,
    Usage,
    Date,
}

impl fmt::Display for SortPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortPolicy::Name => write!(f, "name"),
            SortPolicy::Usage => write!(f, "usage"),
            SortPolicy::Date => write!(f, "date"),
        }
    }
}

impl FromStr for SortPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "name" => Ok(SortPolicy::Name),
            "usage" => Ok(SortPolicy::Usage),
            "date" => Ok(SortPolicy::Date),
            _ => Err(format!("Unknown sort policy: {}. Use name, usage, or date", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryConfig {
    #[serde(default = "default_true")]
    pub allow_custom_nodes: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_template: Option<RecordId>,
    #[serde(default)]
    pub sort_policy: SortPolicy,
}

impl Default for CategoryConfig {
    fn default() -> Self {
        Self {
            allow_custom_nodes: true,
            default_template: None,
            sort_policy: SortPolicy::Name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<RecordId>,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default)]
    pub config: CategoryConfig,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub parent_id: Option<RecordId>,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default)]
    pub config: CategoryConfig,
}

impl CategoryDraft {
    pub fn new(name: impl Into<String>, sort_order: i32) -> Self {
        Self {
            name: name.into(),
            sort_order,
            ..Default::default()
        }
    }
}

/// Immutable snapshot of a template at one version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Version {
    pub id: RecordId,
    pub template_id: RecordId,
    pub version: String,
    pub changelog: String,
    pub created_at: DateTime<Utc>,
    pub author: String,
    pub template_data: Template,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Add,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldChange {
    pub field: String,
    #[serde(default)]
    pub old_value: JsonValue,
    #[serde(default)]
    pub new_value: JsonValue,
    #[serde(rename = "type")]
    pub change_type: ChangeType,
}

/// Description of what a new version changes
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TemplateChanges {
    pub description: String,
    #[serde(default)]
    pub changes: Vec<FieldChange>,
}

impl TemplateChanges {
    pub fn described(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            changes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct InstantiationConfig {
    pub position: Position,
    pub custom_properties: PropertyBag,
}

impl InstantiationConfig {
    pub fn at(x: f64, y: f64) -> Self {
        Self {
            position: Position { x, y },
            custom_properties: PropertyBag::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<crate::core::value::PropertyValue>) -> Self {
        self.custom_properties.insert(key.into(), value.into());
        self
    }
}

/// A freshly instantiated element and where it was placed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedElement {
    pub element: Element,
    pub position: Position,
}
