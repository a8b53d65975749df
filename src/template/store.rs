//! Template, category and version-history store
//!
//! In-memory maps are authoritative for the session. They are loaded once
//! from a [`KeyValueStore`] and each slot is rewritten wholesale after every
//! mutation.

use chrono::Utc;
use miette::Diagnostic;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use crate::core::element::{Element, TemplateLink};
use crate::core::identity::{IdPrefix, RecordId};
use crate::core::store::{KeyValueStore, StoreError};
use crate::template::model::{
    Category, CategoryDraft, InstantiationConfig, MetadataPatch, PlacedElement, Template,
    TemplateChanges, TemplateDraft, TemplateMetadata, TemplatePatch, Version,
};
use crate::template::publish::PublicationQueue;
use crate::template::query::{SearchQuery, SortBy, SortOrder};
use crate::template::version::bump_patch;

pub const TEMPLATES_SLOT: &str = "ntk.templates";
pub const CATEGORIES_SLOT: &str = "ntk.categories";
pub const VERSIONS_SLOT: &str = "ntk.versions";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Template,
    Version,
    Category,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Template => write!(f, "Template"),
            RecordKind::Version => write!(f, "Version"),
            RecordKind::Category => write!(f, "Category"),
        }
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum TemplateError {
    #[error("{kind} not found: {id}")]
    #[diagnostic(code(ntk::template::not_found))]
    NotFound { kind: RecordKind, id: String },

    #[error("Invalid template: {0}")]
    #[diagnostic(code(ntk::template::invalid))]
    Invalid(String),

    #[error("Invalid version '{version}': {message}")]
    #[diagnostic(code(ntk::template::version))]
    InvalidVersion { version: String, message: String },

    #[error("Failed to persist {slot}")]
    #[diagnostic(
        code(ntk::template::persistence),
        help("Changes are kept in memory for this session")
    )]
    Persistence {
        slot: &'static str,
        #[source]
        source: StoreError,
    },
}

impl TemplateError {
    fn not_found(kind: RecordKind, id: impl fmt::Display) -> Self {
        TemplateError::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

pub struct TemplateStore {
    backend: Box<dyn KeyValueStore>,
    author: String,
    templates: BTreeMap<RecordId, Template>,
    categories: BTreeMap<RecordId, Category>,
    versions: BTreeMap<RecordId, Vec<Version>>,
    outbox: PublicationQueue,
}

impl fmt::Debug for TemplateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateStore")
            .field("author", &self.author)
            .field("templates", &self.templates.len())
            .field("categories", &self.categories.len())
            .field("pending_publications", &self.outbox.len())
            .finish()
    }
}

impl TemplateStore {
    /// Load all slots from `backend`; unreadable slots start empty
    ///
    /// Every loaded template with a form declaration is queued for
    /// publication.
    pub fn open(backend: Box<dyn KeyValueStore>, author: impl Into<String>) -> Self {
        let templates: Vec<Template> = read_slot(backend.as_ref(), TEMPLATES_SLOT);
        let categories: Vec<Category> = read_slot(backend.as_ref(), CATEGORIES_SLOT);
        let versions: BTreeMap<RecordId, Vec<Version>> = read_slot(backend.as_ref(), VERSIONS_SLOT);

        tracing::debug!(
            templates = templates.len(),
            categories = categories.len(),
            "loaded template store"
        );

        let mut outbox = PublicationQueue::new();
        for template in &templates {
            outbox.enqueue(template);
        }

        Self {
            backend,
            author: author.into(),
            templates: templates.into_iter().map(|t| (t.id, t)).collect(),
            categories: categories.into_iter().map(|c| (c.id, c)).collect(),
            versions,
            outbox,
        }
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn outbox_mut(&mut self) -> &mut PublicationQueue {
        &mut self.outbox
    }

    pub fn pending_publications(&self) -> usize {
        self.outbox.len()
    }

    // ---- templates ----

    /// Store a new template at version 1.0.0 and queue its form for publication
    pub fn create(&mut self, draft: TemplateDraft) -> Result<RecordId, TemplateError> {
        if draft.name.trim().is_empty() {
            return Err(TemplateError::Invalid("name must not be empty".into()));
        }
        if draft.node_type.trim().is_empty() {
            return Err(TemplateError::Invalid("node type must not be empty".into()));
        }

        let id = RecordId::new(IdPrefix::Tpl);
        let template = Template {
            id,
            name: draft.name,
            description: draft.description,
            category: draft.category,
            icon: draft.icon,
            node_type: draft.node_type,
            properties: draft.properties,
            ui_config: draft.ui_config,
            template_config: draft.template_config,
            metadata: TemplateMetadata::new(self.author.clone(), draft.tags),
            dynamic_form: draft.dynamic_form,
            preview: draft.preview,
        };

        if self.outbox.enqueue(&template) {
            tracing::debug!(template = %id, "queued form publication");
        }
        tracing::info!(template = %id, name = %template.name, "created template");
        self.templates.insert(id, template);
        self.persist_templates()?;
        Ok(id)
    }

    /// Apply a partial update; metadata is merged and `updated_at` refreshed
    pub fn update(&mut self, id: &RecordId, patch: TemplatePatch) -> Result<(), TemplateError> {
        let template = self
            .templates
            .get_mut(id)
            .ok_or_else(|| TemplateError::not_found(RecordKind::Template, id))?;
        patch.apply(template);
        tracing::info!(template = %id, "updated template");
        self.persist_templates()
    }

    /// Remove a template together with its version history
    pub fn delete(&mut self, id: &RecordId) -> Result<Template, TemplateError> {
        let template = self
            .templates
            .remove(id)
            .ok_or_else(|| TemplateError::not_found(RecordKind::Template, id))?;
        let had_history = self.versions.remove(id).is_some();
        self.outbox.discard(id);
        tracing::info!(template = %id, name = %template.name, "deleted template");
        self.persist_templates()?;
        if had_history {
            self.persist_versions()?;
        }
        Ok(template)
    }

    /// Owned copy; edits do not reach the store
    pub fn get(&self, id: &RecordId) -> Result<Template, TemplateError> {
        self.templates
            .get(id)
            .cloned()
            .ok_or_else(|| TemplateError::not_found(RecordKind::Template, id))
    }

    pub fn contains(&self, id: &RecordId) -> bool {
        self.templates.contains_key(id)
    }

    /// Resolve a full id, or a unique case-insensitive name
    pub fn resolve(&self, reference: &str) -> Result<RecordId, TemplateError> {
        if let Ok(id) = RecordId::parse_as(reference, IdPrefix::Tpl) {
            return if self.templates.contains_key(&id) {
                Ok(id)
            } else {
                Err(TemplateError::not_found(RecordKind::Template, id))
            };
        }
        let matches: Vec<&Template> = self
            .templates
            .values()
            .filter(|t| t.name.eq_ignore_ascii_case(reference))
            .collect();
        match matches.as_slice() {
            [only] => Ok(only.id),
            [] => Err(TemplateError::not_found(RecordKind::Template, reference)),
            _ => Err(TemplateError::Invalid(format!(
                "'{}' matches {} templates; use the id",
                reference,
                matches.len()
            ))),
        }
    }

    pub fn search(&self, query: &SearchQuery) -> Vec<Template> {
        query.apply(self.templates.values())
    }

    /// Most used first
    pub fn popular(&self, limit: usize) -> Vec<Template> {
        self.search(&SearchQuery::new().sort(SortBy::Usage, SortOrder::Desc).limit(limit))
    }

    /// All templates in creation order
    pub fn all(&self) -> Vec<Template> {
        self.templates.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    // ---- versions ----

    /// Bump the live template one patch version and snapshot it
    pub fn create_version(&mut self, template_id: &RecordId, changes: TemplateChanges) -> Result<RecordId, TemplateError> {
        let template = self
            .templates
            .get_mut(template_id)
            .ok_or_else(|| TemplateError::not_found(RecordKind::Template, template_id))?;

        let next = bump_patch(&template.metadata.version).map_err(|message| TemplateError::InvalidVersion {
            version: template.metadata.version.clone(),
            message,
        })?;
        TemplatePatch {
            metadata: Some(MetadataPatch {
                version: Some(next.clone()),
                ..Default::default()
            }),
            ..Default::default()
        }
        .apply(template);

        let version = Version {
            id: RecordId::new(IdPrefix::Ver),
            template_id: *template_id,
            version: next,
            changelog: changes.description,
            created_at: Utc::now(),
            author: template.metadata.author.clone(),
            template_data: template.clone(),
        };
        let version_id = version.id;
        tracing::info!(template = %template_id, version = %version.version, "recorded version");
        self.versions.entry(*template_id).or_default().push(version);

        self.persist_templates()?;
        self.persist_versions()?;
        Ok(version_id)
    }

    /// Oldest first; empty for templates without history
    pub fn version_history(&self, template_id: &RecordId) -> &[Version] {
        self.versions
            .get(template_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Copy a snapshot's content back onto the live template
    ///
    /// The live version number, usage count and creation time are kept and no
    /// new version is recorded.
    pub fn restore_version(&mut self, template_id: &RecordId, version_id: &RecordId) -> Result<(), TemplateError> {
        let snapshot = self
            .version_history(template_id)
            .iter()
            .find(|v| &v.id == version_id)
            .map(|v| v.template_data.clone())
            .ok_or_else(|| TemplateError::not_found(RecordKind::Version, version_id))?;
        self.update(template_id, TemplatePatch::from_snapshot(&snapshot))?;
        tracing::info!(template = %template_id, version = %version_id, "restored version");
        Ok(())
    }

    // ---- categories ----

    pub fn create_category(&mut self, draft: CategoryDraft) -> Result<RecordId, TemplateError> {
        if draft.name.trim().is_empty() {
            return Err(TemplateError::Invalid("category name must not be empty".into()));
        }
        let id = RecordId::new(IdPrefix::Cat);
        self.categories.insert(
            id,
            Category {
                id,
                name: draft.name,
                description: draft.description,
                icon: draft.icon,
                parent_id: draft.parent_id,
                sort_order: draft.sort_order,
                config: draft.config,
            },
        );
        self.persist_categories()?;
        Ok(id)
    }

    pub fn get_category(&self, id: &RecordId) -> Option<&Category> {
        self.categories.get(id)
    }

    pub fn find_category(&self, name: &str) -> Option<&Category> {
        self.categories.values().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Ordered by `sort_order`, then name
    pub fn list_categories(&self) -> Vec<&Category> {
        let mut categories: Vec<&Category> = self.categories.values().collect();
        categories.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then_with(|| a.name.cmp(&b.name)));
        categories
    }

    /// Templates referencing the category are left in place
    pub fn delete_category(&mut self, id: &RecordId) -> Result<Category, TemplateError> {
        let category = self
            .categories
            .remove(id)
            .ok_or_else(|| TemplateError::not_found(RecordKind::Category, id))?;
        let orphans = self
            .templates
            .values()
            .filter(|t| t.category.as_ref() == Some(id))
            .count();
        if orphans > 0 {
            tracing::warn!(category = %id, orphans, "deleted category still referenced by templates");
        }
        self.persist_categories()?;
        Ok(category)
    }

    /// Templates of a category in the category's own sort order
    pub fn templates_in_category(&self, id: &RecordId) -> Result<Vec<Template>, TemplateError> {
        let category = self
            .categories
            .get(id)
            .ok_or_else(|| TemplateError::not_found(RecordKind::Category, id))?;
        let by: SortBy = category.config.sort_policy.into();
        let order = match by {
            SortBy::Name => SortOrder::Asc,
            _ => SortOrder::Desc,
        };
        Ok(self.search(&SearchQuery::new().category(*id).sort(by, order)))
    }

    /// Remove the catalog-seeded templates of a category, with their histories
    ///
    /// Seeded templates left behind by a deleted category are removed too.
    pub(crate) fn remove_default_templates(&mut self, category: &RecordId) -> Result<usize, TemplateError> {
        let doomed: Vec<RecordId> = self
            .templates
            .values()
            .filter(|t| t.is_default())
            .filter(|t| match &t.category {
                Some(c) => c == category || !self.categories.contains_key(c),
                None => false,
            })
            .map(|t| t.id)
            .collect();
        for id in &doomed {
            self.templates.remove(id);
            self.versions.remove(id);
            self.outbox.discard(id);
        }
        if !doomed.is_empty() {
            self.persist_templates()?;
            self.persist_versions()?;
        }
        Ok(doomed.len())
    }

    // ---- instantiation ----

    /// Count a use of the template and build a new element from it
    ///
    /// Property precedence, lowest first: template default values, the
    /// template name, template properties, caller-supplied properties.
    pub fn instantiate(&mut self, id: &RecordId, config: InstantiationConfig) -> Result<PlacedElement, TemplateError> {
        let template = self
            .templates
            .get_mut(id)
            .ok_or_else(|| TemplateError::not_found(RecordKind::Template, id))?;
        template.metadata.usage_count += 1;

        let mut element = Element::new(RecordId::new(IdPrefix::El).to_string(), template.node_type.clone());
        let properties = &mut element.business_object.properties;
        properties.extend(template.template_config.default_values.clone());
        properties.insert("name".to_string(), template.name.clone().into());
        properties.extend(template.properties.clone());
        properties.extend(config.custom_properties);
        element.business_object.template = Some(link_for(template));

        tracing::debug!(template = %id, element = %element.id, "instantiated template");
        self.persist_templates()?;
        Ok(PlacedElement {
            element,
            position: config.position,
        })
    }

    // ---- persistence ----

    fn persist_templates(&self) -> Result<(), TemplateError> {
        let templates: Vec<&Template> = self.templates.values().collect();
        write_slot(self.backend.as_ref(), TEMPLATES_SLOT, &templates)
    }

    fn persist_categories(&self) -> Result<(), TemplateError> {
        let categories: Vec<&Category> = self.categories.values().collect();
        write_slot(self.backend.as_ref(), CATEGORIES_SLOT, &categories)
    }

    fn persist_versions(&self) -> Result<(), TemplateError> {
        write_slot(self.backend.as_ref(), VERSIONS_SLOT, &self.versions)
    }
}

/// Fill absent keys from the template, then record the template link
///
/// Template properties are applied before default values; neither replaces a
/// key the element already has.
pub fn apply_to_element(template: &Template, element: &mut Element) {
    let properties = &mut element.business_object.properties;
    for (key, value) in template
        .properties
        .iter()
        .chain(template.template_config.default_values.iter())
    {
        if !properties.contains_key(key) {
            properties.insert(key.clone(), value.clone());
        }
    }
    element.business_object.template = Some(link_for(template));
}

fn link_for(template: &Template) -> TemplateLink {
    TemplateLink {
        id: template.id,
        version: template.metadata.version.clone(),
        inherited: true,
    }
}

fn read_slot<T: DeserializeOwned + Default>(backend: &dyn KeyValueStore, slot: &str) -> T {
    let raw = match backend.get(slot) {
        Ok(Some(raw)) => raw,
        Ok(None) => return T::default(),
        Err(e) => {
            tracing::error!(slot, "failed to read store slot: {}", e);
            return T::default();
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(e) => {
            tracing::error!(slot, "ignoring unreadable store slot: {}", e);
            T::default()
        }
    }
}

fn write_slot<T: Serialize + ?Sized>(backend: &dyn KeyValueStore, slot: &'static str, value: &T) -> Result<(), TemplateError> {
    let result = serde_json::to_string(value)
        .map_err(|e| StoreError::Encoding(e.to_string()))
        .and_then(|raw| backend.set(slot, &raw));
    result.map_err(|source| {
        tracing::error!(slot, "failed to persist store slot: {}", source);
        TemplateError::Persistence { slot, source }
    })
}
