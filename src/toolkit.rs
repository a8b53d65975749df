//! Composition root wiring the store, registry, engine and serializer

use miette::Diagnostic;
use thiserror::Error;

use crate::core::config::{Config, StoreBackend};
use crate::core::element::{Element, PropertyContext};
use crate::core::store::{KeyValueStore, MemoryStore, SqliteStore, StoreError};
use crate::core::value::PropertyValue;
use crate::core::workspace::Workspace;
use crate::schema::property::{HostError, PropertyConfig};
use crate::schema::registry::SchemaRegistry;
use crate::serialize::Serializer;
use crate::template::catalog::{Catalog, CatalogError};
use crate::template::publish::DrainResult;
use crate::template::store::{TemplateError, TemplateStore};
use crate::validation::engine::ValidationEngine;
use crate::validation::rules::ValidationResult;

#[derive(Debug, Error, Diagnostic)]
pub enum OpenError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Template(#[from] TemplateError),
}

#[derive(Debug, Error, Diagnostic)]
pub enum EditError {
    #[error("{element_type} has no editable property '{key}'")]
    #[diagnostic(code(ntk::edit::unknown_property), help("run 'ntk schema show {element_type}' to list properties"))]
    UnknownProperty { element_type: String, key: String },

    #[error("property '{0}' is read-only")]
    #[diagnostic(code(ntk::edit::read_only))]
    ReadOnly(String),
}

/// What happened to one edited value
#[derive(Debug, Clone)]
pub struct EditOutcome {
    /// Stored form after the config's transformer ran
    pub value: PropertyValue,
    pub validation: ValidationResult,
    /// Transformer lookup warning, if any
    pub warning: Option<String>,
    /// False when validation failed and the element was left unchanged
    pub applied: bool,
}

pub struct Toolkit {
    pub config: Config,
    pub registry: SchemaRegistry,
    pub engine: ValidationEngine,
    pub serializer: Serializer,
    pub store: TemplateStore,
}

impl Toolkit {
    pub fn new(backend: Box<dyn KeyValueStore>, config: Config) -> Self {
        let store = TemplateStore::open(backend, config.author());
        Self {
            registry: SchemaRegistry::with_default_schemas(),
            engine: ValidationEngine::new(),
            serializer: Serializer::new(config.namespace()),
            store,
            config,
        }
    }

    /// Nothing persisted; used by tests and one-off commands
    pub fn in_memory(config: Config) -> Self {
        Self::new(Box::new(MemoryStore::new()), config)
    }

    /// Open the workspace's configured store, bring the built-in catalog up
    /// to date and publish every queued template form
    pub fn open(workspace: &Workspace, config: Config) -> Result<Self, OpenError> {
        let backend: Box<dyn KeyValueStore> = match config.store_backend() {
            StoreBackend::Sqlite => Box::new(SqliteStore::open(&workspace.store_path())?),
            StoreBackend::Memory => Box::new(MemoryStore::new()),
        };
        let mut toolkit = Self::new(backend, config);
        let report = Catalog::builtin()?.seed(&mut toolkit.store, false)?;
        if !report.is_noop() {
            tracing::info!(
                categories = report.seeded.len(),
                created = report.created,
                removed = report.removed,
                "catalog seeded"
            );
        }
        toolkit.publish_pending();
        Ok(toolkit)
    }

    /// Merge queued template forms into the schema registry
    pub fn publish_pending(&mut self) -> DrainResult {
        let result = self.store.outbox_mut().drain_into(&mut self.registry);
        if result.claimed > 0 {
            tracing::debug!(
                claimed = result.claimed,
                published = result.published,
                groups = result.groups,
                "drained publication queue"
            );
        }
        result
    }

    /// Visible property configs for the element's type
    pub fn configs_for(&self, element: &Element) -> Vec<PropertyConfig> {
        let ctx = PropertyContext::for_element(element);
        self.registry.get_property_configs(&element.element_type, &ctx)
    }

    /// Validate the element's bag; the element id stands in for a missing `id`
    pub fn validate(&self, element: &Element) -> Result<ValidationResult, HostError> {
        let ctx = PropertyContext::for_element(element);
        let mut properties = element.properties().clone();
        properties
            .entry("id".to_string())
            .or_insert_with(|| PropertyValue::from(element.id.as_str()));
        self.registry
            .validate_element_properties(&element.element_type, &properties, &ctx, &self.engine)
    }

    /// Transform, validate and store one edited value
    ///
    /// The element is only modified when the value passes its config's rules;
    /// its extension fragment is regenerated afterwards.
    pub fn apply_edit(&self, element: &mut Element, key: &str, edited: PropertyValue) -> Result<EditOutcome, EditError> {
        let configs = self.configs_for(element);
        let config = configs
            .iter()
            .find(|c| c.key == key)
            .ok_or_else(|| EditError::UnknownProperty {
                element_type: element.element_type.clone(),
                key: key.to_string(),
            })?;
        if !config.is_editable(element) {
            return Err(EditError::ReadOnly(key.to_string()));
        }

        let outcome = {
            let ctx = PropertyContext::for_element(element);
            let transformed = match &config.transformer {
                Some(name) => self.engine.transform_value(&edited, name, &ctx),
                None => crate::validation::engine::Transformed {
                    value: edited,
                    warning: None,
                },
            };
            let validation = self.engine.validate_property(&transformed.value, config, &ctx);
            EditOutcome {
                applied: validation.is_valid,
                value: transformed.value,
                validation,
                warning: transformed.warning,
            }
        };

        if outcome.applied {
            element
                .business_object
                .properties
                .insert(key.to_string(), outcome.value.clone());
            self.serializer.write_to_element(element, &configs);
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::model::{DynamicField, DynamicFormConfig, FieldType, FormSection, TemplateDraft};

    fn toolkit() -> Toolkit {
        let config: Config = serde_yml::from_str("author: tester\nnamespace: camunda\n").unwrap();
        Toolkit::in_memory(config)
    }

    #[test]
    fn test_publication_is_visible_after_drain() {
        let mut kit = toolkit();
        let form = DynamicFormConfig {
            sections: vec![FormSection {
                title: "HTTP".into(),
                fields: vec![DynamicField {
                    key: "endpoint".into(),
                    field_type: FieldType::Text,
                    label: "Endpoint".into(),
                    required: true,
                    options: Vec::new(),
                    description: None,
                    validation: None,
                }],
            }],
        };
        kit.store
            .create(TemplateDraft::new("HTTP Call", "bpmn:ServiceTask").with_dynamic_form(form))
            .unwrap();

        let element = Element::new("Task_1", "bpmn:ServiceTask");
        assert!(!kit.configs_for(&element).iter().any(|c| c.key == "endpoint"));

        let drained = kit.publish_pending();
        assert_eq!(drained.published, 1);
        assert!(kit.configs_for(&element).iter().any(|c| c.key == "endpoint"));

        let result = kit.validate(&element).unwrap();
        assert!(!result.is_valid);
        assert!(result.errors.iter().any(|e| e.property == "endpoint"));
        assert!(!result.errors.iter().any(|e| e.property == "id"));
    }

    #[test]
    fn test_open_seeds_catalog_once() {
        let tmp = tempfile::tempdir().unwrap();
        let workspace = Workspace::init(tmp.path(), false).unwrap();
        let config: Config = serde_yml::from_str("author: tester\n").unwrap();
        let expected = Catalog::builtin().unwrap().template_count();

        let kit = Toolkit::open(&workspace, config).unwrap();
        assert_eq!(kit.store.len(), expected);
        let element = Element::new("Task_1", "bpmn:ServiceTask");
        assert!(kit.configs_for(&element).iter().any(|c| c.key == "method"));
        drop(kit);

        let config: Config = serde_yml::from_str("author: tester\n").unwrap();
        let reopened = Toolkit::open(&workspace, config).unwrap();
        assert_eq!(reopened.store.len(), expected);
    }

    #[test]
    fn test_apply_edit_rejects_unknown_keys() {
        let kit = toolkit();
        let mut element = Element::new("Task_1", "bpmn:UserTask");
        let err = kit
            .apply_edit(&mut element, "nope", PropertyValue::from("x"))
            .unwrap_err();
        assert!(matches!(err, EditError::UnknownProperty { .. }));
    }

    #[test]
    fn test_apply_edit_stores_and_serializes() {
        let kit = toolkit();
        let mut element = Element::new("Task_1", "bpmn:UserTask");
        let outcome = kit
            .apply_edit(&mut element, "assignee", PropertyValue::from("alice"))
            .unwrap();
        assert!(outcome.applied);
        assert_eq!(element.property("assignee"), Some(&PropertyValue::from("alice")));
        let fragment = element.business_object.extension.as_ref().unwrap();
        assert_eq!(fragment.attributes.get("assignee").map(String::as_str), Some("alice"));
    }
}
