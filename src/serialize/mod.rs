//! Property serialization
//!
//! Element extension fragments plus JSON/XML/YAML/CSV interchange.

pub mod codec;
pub mod escape;
pub mod extension;
pub mod fragment;
pub mod interchange;

pub use extension::{FormConstraint, FormField, Listener, STANDARD_KEYS};
pub use fragment::{ExtensionFragment, ExtensionKind, ExtensionNode, FragmentBuilder};
pub use interchange::{ExportFormat, ExportOptions, SerializationError};

use crate::core::element::{Element, TemplateLink};
use crate::core::value::PropertyBag;
use crate::schema::property::PropertyConfig;

/// Serializer bound to one extension namespace
#[derive(Debug, Clone, Default)]
pub struct Serializer {
    builder: FragmentBuilder,
}

impl Serializer {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            builder: FragmentBuilder::new(namespace),
        }
    }

    pub fn namespace(&self) -> &str {
        self.builder.namespace()
    }

    pub fn builder(&self) -> &FragmentBuilder {
        &self.builder
    }

    pub fn serialize(&self, properties: &PropertyBag, configs: &[PropertyConfig]) -> Option<ExtensionFragment> {
        extension::serialize_to_fragment(properties, configs, &self.builder)
    }

    pub fn deserialize(&self, fragment: &ExtensionFragment, configs: &[PropertyConfig]) -> PropertyBag {
        extension::deserialize_from_fragment(fragment, configs)
    }

    /// Regenerate the element's fragment from its current properties
    pub fn write_to_element(&self, element: &mut Element, configs: &[PropertyConfig]) {
        extension::write_to_element(element, configs, &self.builder);
    }

    /// Properties stored in the element's fragment, empty when it has none
    pub fn read_from_element(&self, element: &Element, configs: &[PropertyConfig]) -> PropertyBag {
        element
            .business_object
            .extension
            .as_ref()
            .map(|fragment| self.deserialize(fragment, configs))
            .unwrap_or_default()
    }

    pub fn template_link(&self, fragment: &ExtensionFragment) -> Option<TemplateLink> {
        extension::read_template_link(fragment)
    }

    pub fn export(
        &self,
        properties: &PropertyBag,
        configs: &[PropertyConfig],
        format: ExportFormat,
        options: &ExportOptions,
    ) -> Result<String, SerializationError> {
        interchange::export_properties(properties, configs, format, options)
    }

    pub fn import(
        &self,
        data: &str,
        format: ExportFormat,
        configs: &[PropertyConfig],
    ) -> Result<PropertyBag, SerializationError> {
        interchange::import_properties(data, format, configs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::PropertyValue;

    #[test]
    fn test_element_round_trip_through_serializer() {
        let serializer = Serializer::new("camunda");
        let mut element = Element::new("Task_1", "bpmn:UserTask")
            .with_property("assignee", "bob")
            .with_property("costCenter", "CC-7");
        serializer.write_to_element(&mut element, &[]);

        let fragment = element.business_object.extension.as_ref().unwrap();
        assert!(fragment.values.iter().any(|n| n.tag == "camunda:Properties"));

        let read = serializer.read_from_element(&element, &[]);
        assert_eq!(read.get("assignee"), Some(&PropertyValue::from("bob")));
        assert_eq!(read.get("costCenter"), Some(&PropertyValue::from("CC-7")));
    }
}
