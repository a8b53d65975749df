//! Schema registry - effective property groups per element type
//!
//! Three sources feed the groups shown for an element:
//!
//! 1. the base schema registered for the element type (replaced wholesale),
//! 2. the extensions that schema names,
//! 3. dynamic configs registered for the type (always appended, never replaced).
//!
//! Storage keys are unique in the composed view: the first occurrence in that
//! order wins and later duplicates are dropped.

use std::collections::{HashMap, HashSet};

use crate::core::element::{Element, PropertyContext};
use crate::core::value::PropertyBag;
use crate::schema::defaults::{default_schema, DEFAULT_ELEMENT_TYPES};
use crate::schema::property::{
    DynamicPropertyConfig, HostError, PropertyConfig, PropertyExtension, PropertyGroup,
    PropertySchema, SelectOption, DEFAULT_GROUP_ORDER,
};
use crate::validation::{ValidationEngine, ValidationResult};

/// Key of the synthetic group holding dynamic configs
pub const DYNAMIC_GROUP_KEY: &str = "dynamic";

#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, PropertySchema>,
    extensions: HashMap<String, PropertyExtension>,
    dynamic: HashMap<String, Vec<DynamicPropertyConfig>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with base schemas for the common element types
    pub fn with_default_schemas() -> Self {
        let mut registry = Self::new();
        for element_type in DEFAULT_ELEMENT_TYPES {
            registry.register_schema(default_schema(element_type));
        }
        registry
    }

    /// Store a schema, replacing any schema for the same element type
    pub fn register_schema(&mut self, schema: PropertySchema) {
        tracing::debug!(element_type = %schema.element_type, groups = schema.groups.len(), "registering schema");
        self.schemas.insert(schema.element_type.clone(), schema);
    }

    pub fn get_schema(&self, element_type: &str) -> Option<&PropertySchema> {
        self.schemas.get(element_type)
    }

    pub fn element_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.schemas.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Store an extension and register its transformers with the engine
    pub fn register_extension(&mut self, extension: PropertyExtension, engine: &mut ValidationEngine) {
        for transformer in &extension.transformers {
            engine.register_transformer(transformer.clone());
        }
        self.extensions.insert(extension.name.clone(), extension);
    }

    pub fn get_extension(&self, name: &str) -> Option<&PropertyExtension> {
        self.extensions.get(name)
    }

    pub fn extensions(&self) -> impl Iterator<Item = &PropertyExtension> {
        self.extensions.values()
    }

    /// Append dynamic configs for an element type
    pub fn register_dynamic_config(&mut self, element_type: &str, configs: Vec<DynamicPropertyConfig>) {
        self.dynamic
            .entry(element_type.to_string())
            .or_default()
            .extend(configs);
    }

    pub fn dynamic_configs(&self, element_type: &str) -> &[DynamicPropertyConfig] {
        self.dynamic
            .get(element_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Append groups to the element type's schema, creating it if absent
    pub fn merge_template_groups(&mut self, element_type: &str, groups: Vec<PropertyGroup>) {
        let schema = self
            .schemas
            .entry(element_type.to_string())
            .or_insert_with(|| PropertySchema::new(element_type));
        tracing::debug!(
            element_type,
            existing = schema.groups.len(),
            added = groups.len(),
            "merging template groups"
        );
        schema.groups.extend(groups);
    }

    /// Visible groups for an element, sorted by ascending order
    pub fn get_property_groups(&self, element_type: &str, ctx: &PropertyContext<'_>) -> Vec<PropertyGroup> {
        let element = ctx.element;
        let mut composed = Vec::new();

        if let Some(schema) = self.schemas.get(element_type) {
            composed.extend(visible_groups(&schema.groups, element));

            for name in &schema.extensions {
                let Some(extension) = self.extensions.get(name) else {
                    tracing::debug!(extension = %name, element_type, "schema names unknown extension");
                    continue;
                };
                composed.extend(visible_groups(&extension.groups, element));
                let loose: Vec<PropertyConfig> = extension
                    .properties
                    .iter()
                    .filter(|p| p.is_visible(element))
                    .cloned()
                    .collect();
                if !loose.is_empty() {
                    let mut group = PropertyGroup::new(extension.name.clone(), extension.name.clone());
                    group.properties = loose;
                    composed.push(group);
                }
            }
        }

        let dynamic: Vec<PropertyConfig> = self
            .dynamic_configs(element_type)
            .iter()
            .filter(|d| d.config.is_visible(element))
            .map(|d| d.config.clone())
            .collect();
        if !dynamic.is_empty() {
            let mut group = PropertyGroup::new(DYNAMIC_GROUP_KEY, "Dynamic properties")
                .with_icon("fas fa-magic")
                .with_order(DEFAULT_GROUP_ORDER);
            group.properties = dynamic;
            composed.push(group);
        }

        let mut groups = dedupe_keys(composed);
        groups.sort_by_key(PropertyGroup::sort_order);
        groups
    }

    /// Flattened configs in group order
    pub fn get_property_configs(&self, element_type: &str, ctx: &PropertyContext<'_>) -> Vec<PropertyConfig> {
        self.get_property_groups(element_type, ctx)
            .into_iter()
            .flat_map(|g| g.properties)
            .collect()
    }

    /// Run the property rules, then every custom validator; all failures are
    /// collected. A failing host validator's error is returned unchanged.
    pub fn validate_element_properties(
        &self,
        element_type: &str,
        properties: &PropertyBag,
        ctx: &PropertyContext<'_>,
        engine: &ValidationEngine,
    ) -> Result<ValidationResult, HostError> {
        let configs = self.get_property_configs(element_type, ctx);
        let mut result = engine.validate_properties(properties, &configs, ctx);
        if let Some(schema) = self.schemas.get(element_type) {
            for validator in &schema.custom_validators {
                result.merge(validator(ctx.element, properties)?);
            }
        }
        Ok(result)
    }

    /// Options supplied by a dynamic config's provider; empty when it has none
    pub fn get_dynamic_options(
        &self,
        key: &str,
        element_type: &str,
        ctx: &PropertyContext<'_>,
    ) -> Result<Vec<SelectOption>, HostError> {
        match self.find_dynamic(key, element_type) {
            Some(DynamicPropertyConfig {
                dynamic_options: Some(provider),
                ..
            }) => provider(ctx.element, ctx),
            _ => Ok(Vec::new()),
        }
    }

    /// True when every key the dynamic config depends on has a non-empty value
    pub fn check_property_dependencies(&self, key: &str, element_type: &str, properties: &PropertyBag) -> bool {
        match self.find_dynamic(key, element_type) {
            Some(config) => config
                .depends_on
                .iter()
                .all(|dep| properties.get(dep).is_some_and(|v| !v.is_empty())),
            None => true,
        }
    }

    pub fn check_property_condition(
        &self,
        key: &str,
        element_type: &str,
        element: &Element,
        properties: &PropertyBag,
    ) -> bool {
        match self.find_dynamic(key, element_type).and_then(|c| c.condition.as_ref()) {
            Some(condition) => condition(element, properties),
            None => true,
        }
    }

    fn find_dynamic(&self, key: &str, element_type: &str) -> Option<&DynamicPropertyConfig> {
        self.dynamic_configs(element_type)
            .iter()
            .find(|d| d.config.key == key)
    }
}

fn visible_groups<'a>(
    groups: &'a [PropertyGroup],
    element: &'a Element,
) -> impl Iterator<Item = PropertyGroup> + 'a {
    groups
        .iter()
        .filter(|g| g.visible.evaluate(element))
        .map(|g| {
            let mut group = g.clone();
            group.properties.retain(|p| p.is_visible(element));
            group
        })
}

/// Drop repeated storage keys, keeping the first; groups emptied this way are
/// dropped as well
fn dedupe_keys(groups: Vec<PropertyGroup>) -> Vec<PropertyGroup> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(groups.len());
    for mut group in groups {
        let before = group.properties.len();
        group.properties.retain(|p| {
            let fresh = seen.insert(p.key.clone());
            if !fresh {
                tracing::debug!(key = %p.key, group = %group.key, "dropping duplicate property key");
            }
            fresh
        });
        if before > 0 && group.properties.is_empty() {
            continue;
        }
        out.push(group);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::PropertyValue;
    use crate::schema::property::PropertyType;
    use crate::validation::{ValidationFailure, ValidationRule};

    fn section(key: &str, fields: &[&str]) -> PropertyGroup {
        let mut group = PropertyGroup::new(key, key);
        for f in fields {
            group.properties.push(PropertyConfig::text(*f, *f));
        }
        group
    }

    fn keys(groups: &[PropertyGroup]) -> Vec<String> {
        groups
            .iter()
            .flat_map(|g| g.properties.iter().map(|p| p.key.clone()))
            .collect()
    }

    #[test]
    fn test_additive_merge_keeps_every_section() {
        let mut registry = SchemaRegistry::with_default_schemas();
        registry.merge_template_groups("bpmn:UserTask", vec![section("A - Review", &["reviewer"])]);
        registry.merge_template_groups("bpmn:UserTask", vec![section("B - Approval", &["approver"])]);
        registry.merge_template_groups(
            "bpmn:UserTask",
            vec![section("B - Approval", &["approver", "approvalNote"])],
        );

        let element = Element::new("Task_1", "bpmn:UserTask");
        let ctx = PropertyContext::for_element(&element);
        let all = keys(&registry.get_property_groups("bpmn:UserTask", &ctx));
        for key in ["id", "assignee", "reviewer", "approver", "approvalNote"] {
            assert!(all.contains(&key.to_string()), "missing {}", key);
        }
        assert_eq!(all.iter().filter(|k| *k == "approver").count(), 1);
    }

    #[test]
    fn test_register_schema_replaces() {
        let mut registry = SchemaRegistry::with_default_schemas();
        registry.register_schema(
            PropertySchema::new("bpmn:UserTask").with_group(section("only", &["x"])),
        );
        let element = Element::new("Task_1", "bpmn:UserTask");
        let ctx = PropertyContext::for_element(&element);
        assert_eq!(keys(&registry.get_property_groups("bpmn:UserTask", &ctx)), vec!["x"]);
    }

    #[test]
    fn test_first_registered_key_wins() {
        let mut registry = SchemaRegistry::new();
        registry.register_schema(PropertySchema::new("bpmn:Task").with_group(section("base", &["name"])));
        registry.register_dynamic_config(
            "bpmn:Task",
            vec![DynamicPropertyConfig::new(PropertyConfig::new(
                "name",
                "Other name",
                PropertyType::Number,
            ))],
        );
        let element = Element::new("Task_1", "bpmn:Task");
        let ctx = PropertyContext::for_element(&element);
        let configs = registry.get_property_configs("bpmn:Task", &ctx);
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].property_type, PropertyType::Text);
        // the dynamic group lost its only field and is gone
        let groups = registry.get_property_groups("bpmn:Task", &ctx);
        assert!(groups.iter().all(|g| g.key != DYNAMIC_GROUP_KEY));
    }

    #[test]
    fn test_groups_sorted_with_dynamic_last() {
        let mut registry = SchemaRegistry::new();
        let schema = PropertySchema::new("bpmn:UserTask")
            .with_group(section("late", &["a"]).with_order(5))
            .with_group(section("unordered", &["b"]))
            .with_group(section("early", &["c"]).with_order(1));
        registry.register_schema(schema);
        registry.register_dynamic_config(
            "bpmn:UserTask",
            vec![DynamicPropertyConfig::new(PropertyConfig::text("d", "D"))],
        );
        let element = Element::new("Task_1", "bpmn:UserTask");
        let ctx = PropertyContext::for_element(&element);
        let order: Vec<String> = registry
            .get_property_groups("bpmn:UserTask", &ctx)
            .into_iter()
            .map(|g| g.key)
            .collect();
        assert_eq!(order, vec!["early", "late", "unordered", "dynamic"]);
    }

    #[test]
    fn test_visibility_filtering() {
        let mut registry = SchemaRegistry::new();
        let mut group = PropertyGroup::new("g", "G");
        group.properties.push(
            PropertyConfig::text("assignee", "Assignee").visible_when(|el| el.property("type").is_none()),
        );
        group.properties.push(PropertyConfig::text("secret", "Secret").hidden());
        let mut hidden_group = PropertyGroup::new("h", "H");
        hidden_group.visible = crate::schema::property::Visibility::Flag(false);
        hidden_group.properties.push(PropertyConfig::text("never", "Never"));
        registry.register_schema(
            PropertySchema::new("bpmn:UserTask")
                .with_group(group)
                .with_group(hidden_group),
        );
        let element = Element::new("Task_1", "bpmn:UserTask");
        let ctx = PropertyContext::for_element(&element);
        assert_eq!(
            keys(&registry.get_property_groups("bpmn:UserTask", &ctx)),
            vec!["assignee"]
        );
    }

    #[test]
    fn test_extension_groups_and_transformers() {
        use crate::validation::FnTransformer;
        use std::sync::Arc;

        let mut engine = ValidationEngine::new();
        let mut registry = SchemaRegistry::new();
        let mut extension = PropertyExtension::new("retry", "zeebe");
        extension.properties.push(PropertyConfig::new("retries", "Retries", PropertyType::Number));
        extension.transformers.push(Arc::new(FnTransformer::new(
            "upper",
            |v, _| PropertyValue::from(v.to_text().to_uppercase()),
            |v, _| PropertyValue::from(v.to_text().to_lowercase()),
        )));
        registry.register_extension(extension, &mut engine);
        registry.register_schema(
            PropertySchema::new("bpmn:ServiceTask")
                .with_group(section("basic", &["id"]).with_order(1))
                .with_extension("retry"),
        );

        assert!(engine.transformers().get("upper").is_some());
        let element = Element::new("Task_1", "bpmn:ServiceTask");
        let ctx = PropertyContext::for_element(&element);
        let groups = registry.get_property_groups("bpmn:ServiceTask", &ctx);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[1].key, "retry");
        assert_eq!(keys(&groups), vec!["id", "retries"]);
    }

    #[test]
    fn test_custom_validators_concatenate() {
        let mut registry = SchemaRegistry::new();
        let mut group = PropertyGroup::new("g", "G");
        group.properties.push(PropertyConfig::text("name", "Name").required());
        registry.register_schema(
            PropertySchema::new("bpmn:UserTask")
                .with_group(group)
                .with_validator(|_, bag| {
                    let mut result = ValidationResult::success();
                    if !bag.contains_key("assignee") {
                        result.merge(ValidationResult::from_parts(
                            vec![ValidationFailure {
                                property: "assignee".into(),
                                message: "needs an assignee".into(),
                                value: PropertyValue::Null,
                                rule: "custom".into(),
                            }],
                            vec!["check the lane".into()],
                        ));
                    }
                    Ok(result)
                }),
        );
        let engine = ValidationEngine::new();
        let element = Element::new("Task_1", "bpmn:UserTask");
        let ctx = PropertyContext::for_element(&element);
        let result = registry
            .validate_element_properties("bpmn:UserTask", &PropertyBag::new(), &ctx, &engine)
            .unwrap();
        assert_eq!(result.errors.len(), 2);
        assert_eq!(result.warnings.len(), 1);
        assert!(!result.is_valid);
    }

    #[test]
    fn test_host_validator_error_propagates() {
        let mut registry = SchemaRegistry::new();
        registry.register_schema(
            PropertySchema::new("bpmn:UserTask").with_validator(|_, _| Err("directory offline".into())),
        );
        let engine = ValidationEngine::new();
        let element = Element::new("Task_1", "bpmn:UserTask");
        let ctx = PropertyContext::for_element(&element);
        let err = registry
            .validate_element_properties("bpmn:UserTask", &PropertyBag::new(), &ctx, &engine)
            .unwrap_err();
        assert_eq!(err.to_string(), "directory offline");
    }

    #[test]
    fn test_dynamic_options_dependencies_conditions() {
        let mut registry = SchemaRegistry::new();
        registry.register_dynamic_config(
            "bpmn:UserTask",
            vec![DynamicPropertyConfig::new(PropertyConfig::new(
                "queue",
                "Queue",
                PropertyType::Select,
            ))
            .depends_on("team")
            .with_options_provider(|el, _| Ok(vec![SelectOption::new(el.id.clone(), "q1")]))
            .with_condition(|_, bag| bag.contains_key("team"))],
        );
        let element = Element::new("Task_1", "bpmn:UserTask");
        let ctx = PropertyContext::for_element(&element);
        let options = registry
            .get_dynamic_options("queue", "bpmn:UserTask", &ctx)
            .unwrap();
        assert_eq!(options[0].label, "Task_1");
        assert!(registry
            .get_dynamic_options("unknown", "bpmn:UserTask", &ctx)
            .unwrap()
            .is_empty());

        let mut bag = PropertyBag::new();
        assert!(!registry.check_property_dependencies("queue", "bpmn:UserTask", &bag));
        assert!(!registry.check_property_condition("queue", "bpmn:UserTask", &element, &bag));
        bag.insert("team".into(), "".into());
        assert!(!registry.check_property_dependencies("queue", "bpmn:UserTask", &bag));
        bag.insert("team".into(), "ops".into());
        assert!(registry.check_property_dependencies("queue", "bpmn:UserTask", &bag));
        assert!(registry.check_property_condition("queue", "bpmn:UserTask", &element, &bag));
        assert!(registry.check_property_dependencies("other", "bpmn:UserTask", &bag));
    }

    #[test]
    fn test_required_rule_applies_through_schema() {
        let mut registry = SchemaRegistry::new();
        let mut group = PropertyGroup::new("g", "G");
        group
            .properties
            .push(PropertyConfig::text("name", "Name").with_rule(ValidationRule::required("name it")));
        registry.register_schema(PropertySchema::new("bpmn:Task").with_group(group));
        let engine = ValidationEngine::new();
        let element = Element::new("Task_1", "bpmn:Task");
        let ctx = PropertyContext::for_element(&element);
        let result = registry
            .validate_element_properties("bpmn:Task", &PropertyBag::new(), &ctx, &engine)
            .unwrap();
        assert_eq!(result.errors[0].message, "name it");
    }
}
