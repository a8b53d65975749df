//! Node templates - store, versions, search, catalog and publication

pub mod catalog;
pub mod loader;
pub mod model;
pub mod publish;
pub mod query;
pub mod scaffold;
pub mod store;
pub mod version;

pub use catalog::{Catalog, CatalogError, PackStatus, SeedReport, Staleness};
pub use model::{
    Category, CategoryConfig, CategoryDraft, DynamicFormConfig, InstantiationConfig, PlacedElement,
    SortPolicy, Template, TemplateChanges, TemplateDraft, TemplatePatch, Version,
};
pub use publish::{DrainResult, PublicationQueue};
pub use query::{SearchQuery, SortBy, SortOrder};
pub use scaffold::{ScaffoldContext, ScaffoldError, ScaffoldGenerator};
pub use store::{apply_to_element, RecordKind, TemplateError, TemplateStore};
