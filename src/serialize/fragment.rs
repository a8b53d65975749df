//! Extension fragment model
//!
//! A fragment is the structured sub-document attached to an element's
//! business object. Standard properties live in `attributes` (they map to the
//! element's native BPMN attributes); everything else is a tree of tagged
//! nodes under `bpmn:extensionElements`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write;

use crate::core::kinds::{EventKind, ListenerKind};
use crate::serialize::escape::xml_escape;

/// Namespace prefixes whose extension tags are understood
pub const KNOWN_NAMESPACES: &[&str] = &["zeebe", "camunda"];

/// One tagged node of an extension fragment
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExtensionNode {
    pub tag: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ExtensionNode>,
}

impl ExtensionNode {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    /// Set an attribute only when a value is present
    pub fn attr_opt(self, name: &str, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(v) => self.attr(name, v),
            None => self,
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn child(mut self, node: ExtensionNode) -> Self {
        self.children.push(node);
        self
    }

    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    /// Tag without its namespace prefix
    pub fn local_name(&self) -> &str {
        self.tag
            .split_once(':')
            .map(|(_, local)| local)
            .unwrap_or(&self.tag)
    }

    /// Children whose local name matches
    pub fn children_named<'a>(&'a self, local: &'a str) -> impl Iterator<Item = &'a ExtensionNode> + 'a {
        self.children.iter().filter(move |c| c.local_name() == local)
    }

    pub fn first_child(&self, local: &str) -> Option<&ExtensionNode> {
        self.children.iter().find(|c| c.local_name() == local)
    }

    fn write_xml(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);
        let _ = write!(out, "{}<{}", indent, self.tag);
        for (name, value) in &self.attrs {
            let _ = write!(out, " {}=\"{}\"", name, xml_escape(value));
        }
        match (&self.body, self.children.is_empty()) {
            (None, true) => {
                let _ = writeln!(out, " />");
            }
            (Some(body), true) => {
                let _ = writeln!(out, ">{}</{}>", xml_escape(body), self.tag);
            }
            (body, false) => {
                let _ = writeln!(out, ">");
                if let Some(body) = body {
                    let _ = writeln!(out, "{}  {}", indent, xml_escape(body));
                }
                for child in &self.children {
                    child.write_xml(out, depth + 1);
                }
                let _ = writeln!(out, "{}</{}>", indent, self.tag);
            }
        }
    }
}

/// Fragment attached to a business object
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExtensionFragment {
    /// Native attributes carrying the standard properties
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,

    /// Children of `bpmn:extensionElements`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<ExtensionNode>,
}

impl ExtensionFragment {
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.values.is_empty()
    }

    /// Render the fragment as the XML of the element it belongs to
    pub fn to_xml(&self, element_id: &str, element_type: &str) -> String {
        let mut root = ExtensionNode::new(element_type).attr("id", element_id);
        for (name, value) in &self.attributes {
            root.attrs.insert(name.clone(), value.clone());
        }
        if !self.values.is_empty() {
            let mut ext = ExtensionNode::new("bpmn:extensionElements");
            ext.children = self.values.clone();
            root.children.push(ext);
        }
        let mut out = String::new();
        root.write_xml(&mut out, 0);
        out
    }
}

/// What a fragment child means, decided from its tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionKind {
    Properties,
    FormData,
    EventDefinition(EventKind),
    Listeners(ListenerKind),
    TemplateInfo,
}

impl ExtensionKind {
    /// `None` for tags outside the known vocabulary
    pub fn classify(tag: &str) -> Option<Self> {
        if let Some(kind) = EventKind::from_definition_tag(tag) {
            return Some(ExtensionKind::EventDefinition(kind));
        }
        let (prefix, local) = tag.split_once(':')?;
        if !KNOWN_NAMESPACES.contains(&prefix) {
            return None;
        }
        match local {
            "Properties" => Some(ExtensionKind::Properties),
            "FormData" => Some(ExtensionKind::FormData),
            "TemplateInfo" => Some(ExtensionKind::TemplateInfo),
            _ => ListenerKind::all()
                .iter()
                .find(|k| k.container_name() == local)
                .map(|k| ExtensionKind::Listeners(*k)),
        }
    }
}

/// Creates namespaced nodes for one extension namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentBuilder {
    namespace: String,
}

impl Default for FragmentBuilder {
    fn default() -> Self {
        Self::new("zeebe")
    }
}

impl FragmentBuilder {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn tag(&self, local: &str) -> String {
        format!("{}:{}", self.namespace, local)
    }

    pub fn create(&self, local: &str) -> ExtensionNode {
        ExtensionNode::new(self.tag(local))
    }

    /// `<ns:Properties>` holding one `<ns:Property name value/>` per entry
    pub fn properties<'a, I>(&self, entries: I) -> ExtensionNode
    where
        I: IntoIterator<Item = (&'a str, String)>,
    {
        let mut node = self.create("Properties");
        for (name, value) in entries {
            node.children
                .push(self.create("Property").attr("name", name).attr("value", value));
        }
        node
    }
}
