//! Element boundary shared with the diagram engine
//!
//! The toolkit never sees geometry or connections. It receives an element's
//! id and type together with its business object, and reads or writes the
//! property bag, template link and extension fragment stored there.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

use crate::core::identity::RecordId;
use crate::core::value::{PropertyBag, PropertyValue};
use crate::serialize::fragment::ExtensionFragment;

/// Link from an element back to the template it was created from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateLink {
    pub id: RecordId,
    pub version: String,
    pub inherited: bool,
}

/// The element's business object: everything the toolkit may touch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BusinessObject {
    #[serde(default)]
    pub properties: PropertyBag,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<TemplateLink>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<ExtensionFragment>,
}

/// A diagram element as seen across the boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub id: String,
    #[serde(rename = "type")]
    pub element_type: String,
    #[serde(default)]
    pub business_object: BusinessObject,
}

impl Element {
    pub fn new(id: impl Into<String>, element_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            element_type: element_type.into(),
            business_object: BusinessObject::default(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.business_object
            .properties
            .insert(key.into(), value.into());
        self
    }

    pub fn properties(&self) -> &PropertyBag {
        &self.business_object.properties
    }

    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.business_object.properties.get(key)
    }
}

/// Context handed to visibility predicates, transformers and host callbacks
#[derive(Debug, Clone, Copy)]
pub struct PropertyContext<'a> {
    pub element: &'a Element,
    pub element_type: &'a str,
    pub read_only: bool,
    pub custom_data: Option<&'a BTreeMap<String, JsonValue>>,
}

impl<'a> PropertyContext<'a> {
    pub fn for_element(element: &'a Element) -> Self {
        Self {
            element,
            element_type: &element.element_type,
            read_only: false,
            custom_data: None,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn with_custom_data(mut self, data: &'a BTreeMap<String, JsonValue>) -> Self {
        self.custom_data = Some(data);
        self
    }
}
