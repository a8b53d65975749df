//! Core module - fundamental types and utilities

pub mod config;
pub mod element;
pub mod identity;
pub mod kinds;
pub mod store;
pub mod value;
pub mod workspace;

pub use config::{Config, StoreBackend};
pub use element::{BusinessObject, Element, PropertyContext, TemplateLink};
pub use identity::{IdParseError, IdPrefix, RecordId};
pub use kinds::{ElementKind, EventKind, ListenerKind, TaskImplementation};
pub use store::{KeyValueStore, MemoryStore, SqliteStore, StoreError};
pub use value::{PropertyBag, PropertyValue};
pub use workspace::{Workspace, WorkspaceError};
