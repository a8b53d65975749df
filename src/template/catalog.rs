//! Built-in template catalog
//!
//! Packs are YAML documents embedded at build time, one per category, checked
//! against `catalog/pack.schema.json` when loaded. Seeding is idempotent: a
//! pack is only reinstalled when its category looks out of date.

use miette::Diagnostic;
use rust_embed::Embed;
use serde::Deserialize;
use std::fmt;
use thiserror::Error;

use crate::core::identity::RecordId;
use crate::core::value::PropertyBag;
use crate::template::model::{
    CategoryConfig, CategoryDraft, Colors, DynamicFormConfig, Preview, Shape, Size, SortPolicy,
    TemplateConfig, TemplateDraft, UiConfig,
};
use crate::template::store::{TemplateError, TemplateStore};
use crate::yaml::diagnostics::{parse_validated, YamlError};

#[derive(Embed)]
#[folder = "catalog/"]
struct EmbeddedCatalog;

pub const PACK_SCHEMA: &str = "pack.schema.json";

#[derive(Debug, Error, Diagnostic)]
pub enum CatalogError {
    #[error("catalog file missing: {0}")]
    #[diagnostic(code(ntk::catalog::missing))]
    Missing(String),

    #[error("invalid pack schema: {0}")]
    #[diagnostic(code(ntk::catalog::schema))]
    Schema(String),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Pack(#[from] YamlError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct PackCategory {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
    pub sort_order: i32,
    #[serde(default)]
    pub sort_policy: SortPolicy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PackTemplate {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub node_type: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub properties: PropertyBag,
    #[serde(default)]
    pub colors: Colors,
    #[serde(default)]
    pub examples: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub form: Option<DynamicFormConfig>,
}

/// The default templates of one category
#[derive(Debug, Clone, Deserialize)]
pub struct Pack {
    pub category: PackCategory,
    /// Newest template in the pack; its absence means the install is stale
    pub marker: String,
    #[serde(default)]
    pub shape: Shape,
    #[serde(default)]
    pub size: Size,
    pub templates: Vec<PackTemplate>,
}

impl Pack {
    /// Drafts for every pack template, filed under `category`
    pub fn drafts(&self, category: RecordId) -> Vec<TemplateDraft> {
        self.templates
            .iter()
            .map(|t| {
                let mut properties = PropertyBag::new();
                properties.insert("name".to_string(), t.name.clone().into());
                properties.extend(t.properties.clone());

                let mut default_values = PropertyBag::new();
                default_values.insert("name".to_string(), t.name.clone().into());

                TemplateDraft {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    category: Some(category),
                    icon: t.icon.clone(),
                    node_type: t.node_type.clone(),
                    properties,
                    ui_config: UiConfig {
                        shape: self.shape,
                        size: self.size.clone(),
                        colors: t.colors.clone(),
                    },
                    template_config: TemplateConfig {
                        is_default: true,
                        is_customizable: true,
                        required_fields: vec!["name".to_string()],
                        default_values,
                    },
                    tags: t.tags.clone(),
                    dynamic_form: t.form.clone(),
                    preview: Some(Preview {
                        thumbnail: self.thumbnail(t),
                        description: t.description.clone(),
                        examples: t.examples.clone(),
                    }),
                }
            })
            .collect()
    }

    fn thumbnail(&self, template: &PackTemplate) -> String {
        if self.shape == Shape::Edge {
            let slug: Vec<String> = template
                .name
                .split_whitespace()
                .map(str::to_lowercase)
                .collect();
            return format!("connection-{}-thumb.svg", slug.join("-"));
        }
        let local = template
            .node_type
            .split_once(':')
            .map_or(template.node_type.as_str(), |(_, local)| local);
        format!("{}-thumb.svg", local.to_lowercase())
    }

    fn category_draft(&self) -> CategoryDraft {
        let mut draft = CategoryDraft::new(self.category.name.clone(), self.category.sort_order);
        draft.description = self.category.description.clone();
        draft.icon = self.category.icon.clone();
        draft.config = CategoryConfig {
            sort_policy: self.category.sort_policy,
            ..Default::default()
        };
        draft
    }
}

/// Why a pack needs reinstalling
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Staleness {
    MissingCategory,
    TooFewTemplates { installed: usize, expected: usize },
    MissingMarker(String),
}

impl fmt::Display for Staleness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Staleness::MissingCategory => write!(f, "category missing"),
            Staleness::TooFewTemplates { installed, expected } => {
                write!(f, "{} of {} templates installed", installed, expected)
            }
            Staleness::MissingMarker(name) => write!(f, "'{}' not installed", name),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PackStatus {
    pub category: String,
    pub expected: usize,
    pub installed: usize,
    pub stale: Option<Staleness>,
}

#[derive(Debug, Default, Clone)]
pub struct SeedReport {
    /// Categories that were (re)installed
    pub seeded: Vec<String>,
    pub created: usize,
    pub removed: usize,
}

impl SeedReport {
    pub fn is_noop(&self) -> bool {
        self.seeded.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Catalog {
    packs: Vec<Pack>,
}

impl Catalog {
    /// The packs compiled into the binary
    pub fn builtin() -> Result<Self, CatalogError> {
        let schema = embedded_text(PACK_SCHEMA)?;
        let mut names: Vec<String> = EmbeddedCatalog::iter()
            .filter(|name| name.ends_with(".yaml"))
            .map(|name| name.into_owned())
            .collect();
        names.sort();

        let mut documents = Vec::with_capacity(names.len());
        for name in names {
            let text = embedded_text(&name)?;
            documents.push((name, text));
        }
        Self::from_documents(&schema, &documents)
    }

    /// Parse `(filename, yaml)` pairs against a pack schema
    pub fn from_documents(schema: &str, documents: &[(String, String)]) -> Result<Self, CatalogError> {
        let schema: serde_json::Value =
            serde_json::from_str(schema).map_err(|e| CatalogError::Schema(e.to_string()))?;
        let validator = jsonschema::validator_for(&schema).map_err(|e| CatalogError::Schema(e.to_string()))?;

        let mut packs = Vec::with_capacity(documents.len());
        for (name, text) in documents {
            let pack: Pack = parse_validated(text, name, &validator)?;
            packs.push(pack);
        }
        packs.sort_by_key(|p| p.category.sort_order);
        Ok(Self { packs })
    }

    pub fn packs(&self) -> &[Pack] {
        &self.packs
    }

    pub fn template_count(&self) -> usize {
        self.packs.iter().map(|p| p.templates.len()).sum()
    }

    pub fn status(&self, store: &TemplateStore) -> Vec<PackStatus> {
        self.packs
            .iter()
            .map(|pack| {
                let installed = store
                    .find_category(&pack.category.name)
                    .map_or(0, |c| store.search(&category_query(c.id)).len());
                PackStatus {
                    category: pack.category.name.clone(),
                    expected: pack.templates.len(),
                    installed,
                    stale: staleness(pack, store),
                }
            })
            .collect()
    }

    /// Reinstall every stale pack, or every pack when `force` is set
    ///
    /// Only templates flagged as defaults are replaced; user templates filed
    /// in a catalog category are left alone.
    pub fn seed(&self, store: &mut TemplateStore, force: bool) -> Result<SeedReport, TemplateError> {
        let mut report = SeedReport::default();
        for pack in &self.packs {
            let reason = staleness(pack, store);
            if reason.is_none() && !force {
                continue;
            }
            match &reason {
                Some(reason) => tracing::info!(category = %pack.category.name, "reseeding catalog pack: {}", reason),
                None => tracing::info!(category = %pack.category.name, "reseeding catalog pack on request"),
            }

            let existing = store.find_category(&pack.category.name).map(|c| c.id);
            let category = match existing {
                Some(id) => id,
                None => store.create_category(pack.category_draft())?,
            };
            report.removed += store.remove_default_templates(&category)?;
            for draft in pack.drafts(category) {
                store.create(draft)?;
                report.created += 1;
            }
            report.seeded.push(pack.category.name.clone());
        }
        Ok(report)
    }
}

fn embedded_text(name: &str) -> Result<String, CatalogError> {
    let file = EmbeddedCatalog::get(name).ok_or_else(|| CatalogError::Missing(name.to_string()))?;
    Ok(String::from_utf8_lossy(&file.data).into_owned())
}

fn category_query(category: RecordId) -> crate::template::query::SearchQuery {
    crate::template::query::SearchQuery::new().category(category)
}

fn staleness(pack: &Pack, store: &TemplateStore) -> Option<Staleness> {
    let Some(category) = store.find_category(&pack.category.name) else {
        return Some(Staleness::MissingCategory);
    };
    let installed = store.search(&category_query(category.id));
    if installed.len() < pack.templates.len() {
        return Some(Staleness::TooFewTemplates {
            installed: installed.len(),
            expected: pack.templates.len(),
        });
    }
    if !installed.iter().any(|t| t.name == pack.marker) {
        return Some(Staleness::MissingMarker(pack.marker.clone()));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::MemoryStore;
    use crate::core::value::PropertyValue;
    use crate::template::model::FieldType;
    use crate::template::query::SearchQuery;

    fn store() -> TemplateStore {
        TemplateStore::open(Box::new(MemoryStore::new()), "catalog")
    }

    #[test]
    fn test_builtin_packs_load() {
        let catalog = Catalog::builtin().unwrap();
        let names: Vec<&str> = catalog.packs().iter().map(|p| p.category.name.as_str()).collect();
        assert_eq!(names, vec!["Events", "Tasks", "Gateways", "Connections"]);
        for pack in catalog.packs() {
            assert!(
                pack.templates.iter().any(|t| t.name == pack.marker),
                "pack {} lacks its marker",
                pack.category.name
            );
        }
    }

    #[test]
    fn test_service_task_offers_http_methods() {
        let catalog = Catalog::builtin().unwrap();
        let service = catalog
            .packs()
            .iter()
            .flat_map(|p| p.templates.iter())
            .find(|t| t.name == "Service Task")
            .unwrap();
        let method = service.form.as_ref().unwrap().sections[0]
            .fields
            .iter()
            .find(|f| f.key == "method")
            .unwrap();
        assert_eq!(method.field_type, FieldType::Select);
        assert!(method.options.iter().any(|o| o == "GET"));
    }

    #[test]
    fn test_drafts_are_flagged_defaults() {
        let catalog = Catalog::builtin().unwrap();
        let pack = catalog.packs().iter().find(|p| p.category.name == "Tasks").unwrap();
        let category = RecordId::new(crate::core::identity::IdPrefix::Cat);
        let drafts = pack.drafts(category);
        let user = drafts.iter().find(|d| d.name == "User Task").unwrap();

        assert!(user.template_config.is_default);
        assert_eq!(user.template_config.required_fields, vec!["name"]);
        assert_eq!(user.properties.get("name"), Some(&PropertyValue::from("User Task")));
        assert_eq!(user.properties.get("priority"), Some(&PropertyValue::from("50")));
        assert_eq!(user.preview.as_ref().unwrap().thumbnail, "usertask-thumb.svg");
        assert_eq!(user.category, Some(category));
    }

    #[test]
    fn test_connection_thumbnails_use_names() {
        let catalog = Catalog::builtin().unwrap();
        let pack = catalog.packs().iter().find(|p| p.shape == Shape::Edge).unwrap();
        let category = RecordId::new(crate::core::identity::IdPrefix::Cat);
        let drafts = pack.drafts(category);
        let flow = drafts.iter().find(|d| d.name == "Async Flow").unwrap();
        assert_eq!(flow.preview.as_ref().unwrap().thumbnail, "connection-async-flow-thumb.svg");
        // pack properties override the seeded name
        assert_eq!(flow.properties.get("name"), Some(&PropertyValue::from("async")));
    }

    #[test]
    fn test_seed_is_idempotent() {
        let catalog = Catalog::builtin().unwrap();
        let mut store = store();
        assert!(catalog.status(&store).iter().all(|s| s.stale == Some(Staleness::MissingCategory)));

        let report = catalog.seed(&mut store, false).unwrap();
        assert_eq!(report.seeded.len(), 4);
        assert_eq!(report.created, catalog.template_count());
        assert_eq!(store.len(), catalog.template_count());
        assert!(catalog.status(&store).iter().all(|s| s.stale.is_none()));

        let again = catalog.seed(&mut store, false).unwrap();
        assert!(again.is_noop());
        assert_eq!(store.len(), catalog.template_count());
    }

    #[test]
    fn test_reseed_replaces_defaults_and_keeps_user_templates() {
        let catalog = Catalog::builtin().unwrap();
        let mut store = store();
        catalog.seed(&mut store, false).unwrap();

        let gateways = store.find_category("Gateways").unwrap().id;
        let marker = store.resolve("Data-Driven Gateway").unwrap();
        store.delete(&marker).unwrap();
        let mine = store
            .create(TemplateDraft::new("My Gateway", "bpmn:ExclusiveGateway").in_category(gateways))
            .unwrap();

        let stale: Vec<String> = catalog
            .status(&store)
            .into_iter()
            .filter(|s| s.stale.is_some())
            .map(|s| s.category)
            .collect();
        assert_eq!(stale, vec!["Gateways"]);

        let report = catalog.seed(&mut store, false).unwrap();
        assert_eq!(report.seeded, vec!["Gateways"]);
        assert_eq!(report.removed, 4);
        assert!(store.contains(&mine));
        let in_category = store.search(&SearchQuery::new().category(gateways));
        assert_eq!(in_category.len(), 6);
    }

    #[test]
    fn test_reseed_after_category_delete_drops_orphaned_defaults() {
        let catalog = Catalog::builtin().unwrap();
        let mut store = store();
        catalog.seed(&mut store, false).unwrap();

        let events = store.find_category("Events").unwrap().id;
        let expected = store.templates_in_category(&events).unwrap().len();
        store.delete_category(&events).unwrap();

        let report = catalog.seed(&mut store, false).unwrap();
        assert_eq!(report.seeded, vec!["Events"]);
        assert_eq!(report.removed, expected);
        assert_eq!(store.len(), catalog.template_count());
        let fresh = store.find_category("Events").unwrap().id;
        assert_ne!(fresh, events);
        assert_eq!(store.templates_in_category(&fresh).unwrap().len(), expected);
    }

    #[test]
    fn test_reseed_publishes_only_installed_forms() {
        use crate::core::element::{Element, PropertyContext};
        use crate::schema::{PropertyType, SchemaRegistry};
        use crate::template::model::{CategoryDraft, DynamicField, DynamicFormConfig, FormSection};

        let catalog = Catalog::builtin().unwrap();
        let mut store = store();
        let tasks = store.create_category(CategoryDraft::new("Tasks", 20)).unwrap();
        let form = DynamicFormConfig {
            sections: vec![FormSection {
                title: "Approval".into(),
                fields: vec![DynamicField {
                    key: "approvalLevel".into(),
                    field_type: FieldType::Number,
                    label: "Old level".into(),
                    required: false,
                    options: Vec::new(),
                    description: None,
                    validation: None,
                }],
            }],
        };
        let mut old = TemplateDraft::new("Approval Task", "bpmn:UserTask")
            .in_category(tasks)
            .with_dynamic_form(form);
        old.template_config.is_default = true;
        let old_id = store.create(old).unwrap();

        let report = catalog.seed(&mut store, false).unwrap();
        assert!(report.seeded.contains(&"Tasks".to_string()));
        assert!(!store.contains(&old_id));

        let mut registry = SchemaRegistry::with_default_schemas();
        store.outbox_mut().drain_into(&mut registry);
        let element = Element::new("Task_1", "bpmn:UserTask");
        let configs = registry.get_property_configs("bpmn:UserTask", &PropertyContext::for_element(&element));
        let level = configs.iter().find(|c| c.key == "approvalLevel").unwrap();
        assert_eq!(level.property_type, PropertyType::Select);
        assert_eq!(level.label, "Approval level");
    }

    #[test]
    fn test_invalid_pack_is_rejected() {
        let schema = embedded_text(PACK_SCHEMA).unwrap();
        let bad = "category: { name: Broken, sort_order: 1 }\nmarker: X\ntemplates:\n  - name: X\n    node_type: UserTask\n";
        let err = Catalog::from_documents(&schema, &[("broken.yaml".to_string(), bad.to_string())]).unwrap_err();
        match err {
            CatalogError::Pack(YamlError::Schema(violations)) => {
                assert_eq!(violations.filename, "broken.yaml");
                assert!(violations.violations.iter().any(|v| v.path.contains("node_type")));
            }
            other => panic!("expected schema violation, got {:?}", other),
        }
    }
}
