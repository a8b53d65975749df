//! Schema system - property model, registry and interactive editing

pub mod defaults;
pub mod property;
pub mod registry;
pub mod wizard;

pub use property::{
    DynamicPropertyConfig, HostError, PropertyConfig, PropertyExtension, PropertyGroup,
    PropertySchema, PropertyType, SelectOption, Visibility,
};
pub use registry::SchemaRegistry;
pub use wizard::{PropertyWizard, WizardResult};
