//! Property bag <-> extension fragment
//!
//! Standard keys become native attributes. Custom keys go into a generic
//! `Properties` node; form fields, event definitions and listeners each get
//! their own node. Unknown nodes are skipped when reading and preserved when
//! an element's fragment is rewritten.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashSet};

use crate::core::element::{Element, TemplateLink};
use crate::core::identity::{IdPrefix, RecordId};
use crate::core::kinds::{EventKind, ListenerKind};
use crate::core::value::{PropertyBag, PropertyValue};
use crate::schema::property::PropertyConfig;
use crate::serialize::codec::{find_config, restore_value};
use crate::serialize::fragment::{ExtensionFragment, ExtensionKind, ExtensionNode, FragmentBuilder};

/// Keys written as native element attributes
pub const STANDARD_KEYS: &[&str] = &[
    "id",
    "name",
    "documentation",
    "assignee",
    "candidateUsers",
    "candidateGroups",
    "dueDate",
    "priority",
    "defaultFlow",
    "conditionExpression",
];

pub const FORM_FIELDS_KEY: &str = "formFields";
pub const EVENT_TYPE_KEY: &str = "eventType";

/// A field of a user task form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormField {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "type", default)]
    pub field_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<PropertyValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validation: Vec<FormConstraint>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormConstraint {
    #[serde(rename = "type")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<PropertyValue>,
    #[serde(default)]
    pub message: String,
}

/// An execution or task listener entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listener {
    #[serde(default)]
    pub event: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub value: String,
}

/// Build the fragment for a property bag; `None` when nothing needs writing
pub fn serialize_to_fragment(
    properties: &PropertyBag,
    _configs: &[PropertyConfig],
    builder: &FragmentBuilder,
) -> Option<ExtensionFragment> {
    let mut fragment = ExtensionFragment::default();
    let mut consumed: HashSet<&str> = HashSet::from([FORM_FIELDS_KEY]);

    for key in STANDARD_KEYS {
        match properties.get(*key) {
            Some(value) if !matches!(value, PropertyValue::Null) => {
                fragment.attributes.insert(key.to_string(), value.to_text());
            }
            _ => {}
        }
    }

    let event = event_definition(properties, &mut consumed);
    let listeners: Vec<ExtensionNode> = ListenerKind::all()
        .iter()
        .filter_map(|kind| listener_node(properties, *kind, builder, &mut consumed))
        .collect();

    let custom: Vec<(&str, String)> = properties
        .iter()
        .filter(|(key, value)| {
            !STANDARD_KEYS.contains(&key.as_str())
                && !key.starts_with('_')
                && !consumed.contains(key.as_str())
                && !matches!(value, PropertyValue::Null)
        })
        .map(|(key, value)| (key.as_str(), value.to_text()))
        .collect();
    if !custom.is_empty() {
        fragment.values.push(builder.properties(custom));
    }

    if let Some(node) = form_data_node(properties, builder) {
        fragment.values.push(node);
    }
    fragment.values.extend(event);
    fragment.values.extend(listeners);

    (!fragment.is_empty()).then_some(fragment)
}

/// Read a property bag back out of a fragment
///
/// Standard and custom values are restored using the declared config types;
/// unrecognized nodes are logged and skipped.
pub fn deserialize_from_fragment(fragment: &ExtensionFragment, configs: &[PropertyConfig]) -> PropertyBag {
    let mut properties = PropertyBag::new();

    for (key, text) in &fragment.attributes {
        properties.insert(key.clone(), restore_value(text, find_config(configs, key)));
    }

    for node in &fragment.values {
        match ExtensionKind::classify(&node.tag) {
            Some(ExtensionKind::Properties) => {
                for prop in node.children_named("Property") {
                    let Some(name) = prop.get_attr("name") else {
                        continue;
                    };
                    let text = prop.get_attr("value").unwrap_or_default();
                    properties.insert(name.to_string(), restore_value(text, find_config(configs, name)));
                }
            }
            Some(ExtensionKind::FormData) => {
                let fields = parse_form_data(node);
                match serde_json::to_value(&fields) {
                    Ok(json) => {
                        properties.insert(FORM_FIELDS_KEY.to_string(), PropertyValue::Structured(json));
                    }
                    Err(e) => tracing::warn!("could not encode form fields: {}", e),
                }
            }
            Some(ExtensionKind::EventDefinition(kind)) => {
                properties.insert(EVENT_TYPE_KEY.to_string(), kind.as_str().into());
                properties.insert(kind.payload_key().to_string(), parse_event_payload(kind, node).into());
            }
            Some(ExtensionKind::Listeners(kind)) => {
                let listeners: Vec<Listener> = node
                    .children_named(kind.listener_name())
                    .map(|l| Listener {
                        event: l.get_attr("event").unwrap_or_default().to_string(),
                        kind: l.get_attr("type").unwrap_or_default().to_string(),
                        value: l.get_attr("value").unwrap_or_default().to_string(),
                    })
                    .collect();
                if let Ok(json) = serde_json::to_value(&listeners) {
                    properties.insert(kind.property_key().to_string(), PropertyValue::Structured(json));
                }
            }
            Some(ExtensionKind::TemplateInfo) => {}
            None => {
                tracing::debug!(tag = %node.tag, "skipping unknown extension element");
            }
        }
    }

    properties
}

/// Rewrite an element's fragment from its property bag and template link
///
/// Known nodes are regenerated; unknown nodes of the previous fragment are
/// kept in their original order after the regenerated ones. The fragment is
/// removed when nothing remains.
pub fn write_to_element(element: &mut Element, configs: &[PropertyConfig], builder: &FragmentBuilder) {
    let business_object = &mut element.business_object;
    let mut fragment =
        serialize_to_fragment(&business_object.properties, configs, builder).unwrap_or_default();

    if let Some(link) = &business_object.template {
        fragment.values.push(template_info_node(link, builder));
    }

    if let Some(previous) = business_object.extension.take() {
        fragment.values.extend(
            previous
                .values
                .into_iter()
                .filter(|node| ExtensionKind::classify(&node.tag).is_none()),
        );
    }

    business_object.extension = (!fragment.is_empty()).then_some(fragment);
}

/// Template link recorded in a fragment, if any
pub fn read_template_link(fragment: &ExtensionFragment) -> Option<TemplateLink> {
    let node = fragment
        .values
        .iter()
        .find(|n| ExtensionKind::classify(&n.tag) == Some(ExtensionKind::TemplateInfo))?;
    let id = match RecordId::parse_as(node.get_attr("id")?, IdPrefix::Tpl) {
        Ok(id) => id,
        Err(e) => {
            tracing::debug!("ignoring template info with bad id: {}", e);
            return None;
        }
    };
    Some(TemplateLink {
        id,
        version: node.get_attr("version").unwrap_or_default().to_string(),
        inherited: node.get_attr("inherited") == Some("true"),
    })
}

fn template_info_node(link: &TemplateLink, builder: &FragmentBuilder) -> ExtensionNode {
    builder
        .create("TemplateInfo")
        .attr("id", link.id.to_string())
        .attr("version", link.version.clone())
        .attr("inherited", link.inherited.to_string())
}

/// Reference element and attribute carrying an event definition's payload;
/// timers use an expression body instead
fn event_reference(kind: EventKind) -> Option<(&'static str, &'static str)> {
    match kind {
        EventKind::Message => Some(("bpmn:Message", "name")),
        EventKind::Error => Some(("bpmn:Error", "errorCode")),
        EventKind::Signal => Some(("bpmn:Signal", "name")),
        EventKind::Escalation => Some(("bpmn:Escalation", "escalationCode")),
        EventKind::Timer => None,
    }
}

fn event_definition<'a>(properties: &'a PropertyBag, consumed: &mut HashSet<&'a str>) -> Option<ExtensionNode> {
    let event_type = properties.get(EVENT_TYPE_KEY)?.as_str()?;
    if event_type.is_empty() {
        return None;
    }
    let kind: EventKind = match event_type.parse() {
        Ok(kind) => kind,
        Err(e) => {
            tracing::warn!("{}; kept as a plain property", e);
            return None;
        }
    };
    consumed.insert(EVENT_TYPE_KEY);
    consumed.insert(kind.payload_key());

    let payload = properties
        .get(kind.payload_key())
        .map(PropertyValue::to_text)
        .unwrap_or_default();
    let mut node = ExtensionNode::new(kind.definition_tag());
    match event_reference(kind) {
        Some((tag, attr)) => node = node.child(ExtensionNode::new(tag).attr(attr, payload)),
        None if payload.is_empty() => {}
        None => {
            // ISO 8601 durations start with P; anything else is a cycle
            let tag = if payload.starts_with('P') {
                "bpmn:timeDuration"
            } else {
                "bpmn:timeCycle"
            };
            node = node.child(
                ExtensionNode::new(tag)
                    .attr("xsi:type", "bpmn:tFormalExpression")
                    .with_body(payload),
            );
        }
    }
    Some(node)
}

fn parse_event_payload(kind: EventKind, node: &ExtensionNode) -> String {
    match event_reference(kind) {
        Some((tag, attr)) => node
            .children
            .iter()
            .find(|c| c.tag == tag)
            .and_then(|c| c.get_attr(attr))
            .unwrap_or_default()
            .to_string(),
        None => node
            .first_child("timeDuration")
            .or_else(|| node.first_child("timeCycle"))
            .and_then(|c| c.body.clone())
            .unwrap_or_default(),
    }
}

fn listener_node<'a>(
    properties: &'a PropertyBag,
    kind: ListenerKind,
    builder: &FragmentBuilder,
    consumed: &mut HashSet<&'a str>,
) -> Option<ExtensionNode> {
    let value = properties.get(kind.property_key())?;
    let listeners: Vec<Listener> = match serde_json::from_value(value.to_json()) {
        Ok(listeners) => listeners,
        Err(e) => {
            tracing::warn!(key = kind.property_key(), "listeners kept as a plain property: {}", e);
            return None;
        }
    };
    consumed.insert(kind.property_key());
    if listeners.is_empty() {
        return None;
    }
    let mut node = builder.create(kind.container_name());
    for listener in listeners {
        node.children.push(
            builder
                .create(kind.listener_name())
                .attr("event", listener.event)
                .attr("type", listener.kind)
                .attr("value", listener.value),
        );
    }
    Some(node)
}

fn form_data_node(properties: &PropertyBag, builder: &FragmentBuilder) -> Option<ExtensionNode> {
    let value = properties.get(FORM_FIELDS_KEY)?;
    let fields: Vec<FormField> = match serde_json::from_value(value.to_json()) {
        Ok(fields) => fields,
        Err(e) => {
            tracing::warn!("skipping malformed form fields: {}", e);
            return None;
        }
    };
    if fields.is_empty() {
        return None;
    }

    let mut form = builder.create("FormData");
    for field in fields {
        let mut node = builder
            .create("FormField")
            .attr("id", field.id)
            .attr("label", field.label)
            .attr("type", field.field_type)
            .attr_opt(
                "defaultValue",
                field
                    .default_value
                    .as_ref()
                    .filter(|v| !v.is_empty())
                    .map(PropertyValue::to_text),
            );
        if !field.validation.is_empty() {
            let mut validation = builder.create("Validation");
            for rule in field.validation {
                validation.children.push(
                    builder
                        .create("Constraint")
                        .attr("name", rule.name)
                        .attr_opt("config", rule.value.as_ref().map(PropertyValue::to_text))
                        .attr_opt("message", (!rule.message.is_empty()).then_some(rule.message)),
                );
            }
            node.children.push(validation);
        }
        if !field.properties.is_empty() {
            node.children.push(builder.properties(
                field.properties.iter().map(|(k, v)| (k.as_str(), v.clone())),
            ));
        }
        form.children.push(node);
    }
    Some(form)
}

fn parse_form_data(node: &ExtensionNode) -> Vec<FormField> {
    node.children_named("FormField")
        .map(|field| FormField {
            id: field.get_attr("id").unwrap_or_default().to_string(),
            label: field.get_attr("label").unwrap_or_default().to_string(),
            field_type: field.get_attr("type").unwrap_or_default().to_string(),
            default_value: field.get_attr("defaultValue").map(PropertyValue::from),
            validation: field
                .first_child("Validation")
                .map(|v| {
                    v.children_named("Constraint")
                        .map(|c| FormConstraint {
                            name: c.get_attr("name").unwrap_or_default().to_string(),
                            value: c.get_attr("config").map(loose_value),
                            message: c.get_attr("message").unwrap_or_default().to_string(),
                        })
                        .collect()
                })
                .unwrap_or_default(),
            properties: field
                .first_child("Properties")
                .map(|p| {
                    p.children_named("Property")
                        .filter_map(|prop| {
                            Some((
                                prop.get_attr("name")?.to_string(),
                                prop.get_attr("value").unwrap_or_default().to_string(),
                            ))
                        })
                        .collect()
                })
                .unwrap_or_default(),
        })
        .collect()
}

/// Constraint configs are numbers more often than not
fn loose_value(text: &str) -> PropertyValue {
    match serde_json::from_str::<JsonValue>(text) {
        Ok(json @ (JsonValue::Number(_) | JsonValue::Bool(_))) => PropertyValue::from(json),
        _ => PropertyValue::from(text),
    }
}
