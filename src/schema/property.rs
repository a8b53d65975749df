//! Property configuration model
//!
//! A [`PropertyConfig`] describes one editable field: its storage key, label,
//! value type, visibility, validation rules and optional transformer.
//! Configs are grouped into [`PropertyGroup`]s, and groups make up a
//! [`PropertySchema`] for one element type.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::core::element::{Element, PropertyContext};
use crate::core::value::{PropertyBag, PropertyValue};
use crate::validation::rules::{RuleKind, ValidationResult, ValidationRule};
use crate::validation::transform::Transformer;

/// Error raised by a host-supplied callback; handed back to the caller as-is
pub type HostError = Box<dyn std::error::Error + Send + Sync>;

/// Order given to groups without one; sorts them last
pub const DEFAULT_GROUP_ORDER: u32 = 999;

/// Declared value type of a property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum PropertyType {
    #[default]
    Text,
    Textarea,
    Number,
    Boolean,
    Select,
    MultiSelect,
    Date,
    Datetime,
    Email,
    Url,
    Password,
    Json,
    Custom,
}

impl PropertyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyType::Text => "text",
            PropertyType::Textarea => "textarea",
            PropertyType::Number => "number",
            PropertyType::Boolean => "boolean",
            PropertyType::Select => "select",
            PropertyType::MultiSelect => "multiSelect",
            PropertyType::Date => "date",
            PropertyType::Datetime => "datetime",
            PropertyType::Email => "email",
            PropertyType::Url => "url",
            PropertyType::Password => "password",
            PropertyType::Json => "json",
            PropertyType::Custom => "custom",
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PropertyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(PropertyType::Text),
            "textarea" => Ok(PropertyType::Textarea),
            "number" => Ok(PropertyType::Number),
            "boolean" => Ok(PropertyType::Boolean),
            "select" => Ok(PropertyType::Select),
            "multiSelect" | "multiselect" => Ok(PropertyType::MultiSelect),
            "date" => Ok(PropertyType::Date),
            "datetime" => Ok(PropertyType::Datetime),
            "email" => Ok(PropertyType::Email),
            "url" => Ok(PropertyType::Url),
            "password" => Ok(PropertyType::Password),
            "json" => Ok(PropertyType::Json),
            "custom" => Ok(PropertyType::Custom),
            _ => Err(format!("Unknown property type: {}", s)),
        }
    }
}

/// Predicate evaluated against the element being edited
pub type ElementPredicate = Arc<dyn Fn(&Element) -> bool + Send + Sync>;

/// A fixed flag or a predicate over the current element
#[derive(Clone)]
pub enum Visibility {
    Flag(bool),
    When(ElementPredicate),
}

impl Visibility {
    pub fn evaluate(&self, element: &Element) -> bool {
        match self {
            Visibility::Flag(flag) => *flag,
            Visibility::When(predicate) => predicate(element),
        }
    }
}

impl Default for Visibility {
    fn default() -> Self {
        Visibility::Flag(true)
    }
}

impl fmt::Debug for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Visibility::Flag(flag) => write!(f, "Flag({})", flag),
            Visibility::When(_) => write!(f, "When(<predicate>)"),
        }
    }
}

/// One choice of a select property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectOption {
    pub label: String,
    pub value: JsonValue,
}

impl SelectOption {
    pub fn new(label: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// Editable field declaration
#[derive(Debug, Clone)]
pub struct PropertyConfig {
    pub key: String,
    pub label: String,
    pub property_type: PropertyType,
    pub required: bool,
    pub default_value: Option<PropertyValue>,
    pub visible: Visibility,
    pub editable: Visibility,
    pub validation: Vec<ValidationRule>,
    pub options: Vec<SelectOption>,
    pub group: Option<String>,
    pub order: Option<u32>,
    pub description: Option<String>,
    /// Transformer applied between stored and edited forms
    pub transformer: Option<String>,
}

impl PropertyConfig {
    pub fn new(key: impl Into<String>, label: impl Into<String>, property_type: PropertyType) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            property_type,
            required: false,
            default_value: None,
            visible: Visibility::default(),
            editable: Visibility::default(),
            validation: Vec::new(),
            options: Vec::new(),
            group: None,
            order: None,
            description: None,
            transformer: None,
        }
    }

    pub fn text(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(key, label, PropertyType::Text)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<PropertyValue>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn with_rule(mut self, rule: ValidationRule) -> Self {
        self.validation.push(rule);
        self
    }

    pub fn with_options(mut self, options: Vec<SelectOption>) -> Self {
        self.options = options;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_transformer(mut self, name: impl Into<String>) -> Self {
        self.transformer = Some(name.into());
        self
    }

    pub fn with_order(mut self, order: u32) -> Self {
        self.order = Some(order);
        self
    }

    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = Visibility::Flag(false);
        self
    }

    pub fn visible_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Element) -> bool + Send + Sync + 'static,
    {
        self.visible = Visibility::When(Arc::new(predicate));
        self
    }

    pub fn read_only(mut self) -> Self {
        self.editable = Visibility::Flag(false);
        self
    }

    /// Required either by flag or by a `required` rule
    pub fn is_required(&self) -> bool {
        self.required
            || self
                .validation
                .iter()
                .any(|rule| matches!(rule.kind, RuleKind::Required))
    }

    pub fn is_visible(&self, element: &Element) -> bool {
        self.visible.evaluate(element)
    }

    pub fn is_editable(&self, element: &Element) -> bool {
        self.editable.evaluate(element)
    }
}

/// Named, ordered set of property configs
#[derive(Debug, Clone)]
pub struct PropertyGroup {
    pub key: String,
    pub label: String,
    pub icon: Option<String>,
    pub order: Option<u32>,
    pub collapsed: bool,
    pub visible: Visibility,
    pub properties: Vec<PropertyConfig>,
}

impl PropertyGroup {
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            icon: None,
            order: None,
            collapsed: false,
            visible: Visibility::default(),
            properties: Vec::new(),
        }
    }

    pub fn with_order(mut self, order: u32) -> Self {
        self.order = Some(order);
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn collapsed(mut self) -> Self {
        self.collapsed = true;
        self
    }

    pub fn with_property(mut self, config: PropertyConfig) -> Self {
        self.properties.push(config);
        self
    }

    pub fn sort_order(&self) -> u32 {
        self.order.unwrap_or(DEFAULT_GROUP_ORDER)
    }
}

/// Reusable property bundle that any schema may reference by name
#[derive(Debug, Clone, Default)]
pub struct PropertyExtension {
    pub name: String,
    pub namespace: String,
    /// Loose properties, presented as a group keyed by the extension name
    pub properties: Vec<PropertyConfig>,
    pub groups: Vec<PropertyGroup>,
    pub transformers: Vec<Arc<dyn Transformer>>,
}

impl PropertyExtension {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ..Default::default()
        }
    }
}

/// Schema-level validator run after the per-property rules
pub type CustomValidator =
    Arc<dyn Fn(&Element, &PropertyBag) -> Result<ValidationResult, HostError> + Send + Sync>;

/// Groups presented for one element type
#[derive(Clone, Default)]
pub struct PropertySchema {
    pub element_type: String,
    pub groups: Vec<PropertyGroup>,
    /// Names of extensions whose groups are appended after the base groups
    pub extensions: Vec<String>,
    pub custom_validators: Vec<CustomValidator>,
}

impl PropertySchema {
    pub fn new(element_type: impl Into<String>) -> Self {
        Self {
            element_type: element_type.into(),
            ..Default::default()
        }
    }

    pub fn with_group(mut self, group: PropertyGroup) -> Self {
        self.groups.push(group);
        self
    }

    pub fn with_extension(mut self, name: impl Into<String>) -> Self {
        self.extensions.push(name.into());
        self
    }

    pub fn with_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Element, &PropertyBag) -> Result<ValidationResult, HostError> + Send + Sync + 'static,
    {
        self.custom_validators.push(Arc::new(validator));
        self
    }
}

impl fmt::Debug for PropertySchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertySchema")
            .field("element_type", &self.element_type)
            .field("groups", &self.groups)
            .field("extensions", &self.extensions)
            .field("custom_validators", &self.custom_validators.len())
            .finish()
    }
}

/// Produces select options when the editor opens
pub type OptionsProvider = Arc<
    dyn Fn(&Element, &PropertyContext<'_>) -> Result<Vec<SelectOption>, HostError> + Send + Sync,
>;

/// Decides whether a dynamic property applies to the current values
pub type PropertyCondition = Arc<dyn Fn(&Element, &PropertyBag) -> bool + Send + Sync>;

/// Property contributed at runtime rather than by a base schema
#[derive(Clone)]
pub struct DynamicPropertyConfig {
    pub config: PropertyConfig,
    pub dynamic_options: Option<OptionsProvider>,
    pub depends_on: Vec<String>,
    pub condition: Option<PropertyCondition>,
}

impl DynamicPropertyConfig {
    pub fn new(config: PropertyConfig) -> Self {
        Self {
            config,
            dynamic_options: None,
            depends_on: Vec::new(),
            condition: None,
        }
    }

    pub fn with_options_provider<F>(mut self, provider: F) -> Self
    where
        F: Fn(&Element, &PropertyContext<'_>) -> Result<Vec<SelectOption>, HostError>
            + Send
            + Sync
            + 'static,
    {
        self.dynamic_options = Some(Arc::new(provider));
        self
    }

    pub fn depends_on(mut self, key: impl Into<String>) -> Self {
        self.depends_on.push(key.into());
        self
    }

    pub fn with_condition<F>(mut self, condition: F) -> Self
    where
        F: Fn(&Element, &PropertyBag) -> bool + Send + Sync + 'static,
    {
        self.condition = Some(Arc::new(condition));
        self
    }
}

impl fmt::Debug for DynamicPropertyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicPropertyConfig")
            .field("config", &self.config)
            .field("dynamic_options", &self.dynamic_options.is_some())
            .field("depends_on", &self.depends_on)
            .field("condition", &self.condition.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_via_rule() {
        let config = PropertyConfig::text("name", "Name")
            .with_rule(ValidationRule::required("Name is required"));
        assert!(config.is_required());
        assert!(!PropertyConfig::text("name", "Name").is_required());
    }

    #[test]
    fn test_visibility_predicate() {
        let config = PropertyConfig::text("assignee", "Assignee")
            .visible_when(|el| el.element_type == "bpmn:UserTask");
        assert!(config.is_visible(&Element::new("a", "bpmn:UserTask")));
        assert!(!config.is_visible(&Element::new("b", "bpmn:ServiceTask")));
        assert!(!PropertyConfig::text("x", "X").hidden().is_visible(&Element::new("c", "t")));
    }

    #[test]
    fn test_property_type_names_parse() {
        for ty in [
            PropertyType::Text,
            PropertyType::MultiSelect,
            PropertyType::Datetime,
            PropertyType::Json,
        ] {
            assert_eq!(ty.as_str().parse::<PropertyType>().unwrap(), ty);
        }
        assert!("checkbox".parse::<PropertyType>().is_err());
    }
}
