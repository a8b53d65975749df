//! Deferred publication of template form declarations into the schema registry
//!
//! `create` only enqueues; the queue is drained separately, so a registry
//! query made between the two observes the schema as it was before.

use std::collections::VecDeque;

use crate::core::identity::RecordId;
use crate::core::value::PropertyValue;
use crate::schema::property::{PropertyConfig, PropertyGroup, PropertyType, SelectOption};
use crate::schema::registry::SchemaRegistry;
use crate::template::model::{DynamicField, DynamicFormConfig, FieldType, Template};
use crate::validation::rules::ValidationRule;

/// Groups one template contributes to its node type's schema
#[derive(Debug, Clone)]
pub struct Publication {
    pub template_id: RecordId,
    pub template_name: String,
    pub node_type: String,
    pub groups: Vec<PropertyGroup>,
}

/// Result of a drain
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainResult {
    pub claimed: usize,
    pub published: usize,
    pub groups: usize,
}

#[derive(Debug, Default)]
pub struct PublicationQueue {
    pending: VecDeque<Publication>,
}

impl PublicationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the template's form sections; templates without any are ignored
    pub fn enqueue(&mut self, template: &Template) -> bool {
        let Some(form) = template.dynamic_form.as_ref().filter(|f| !f.is_empty()) else {
            return false;
        };
        self.pending.push_back(Publication {
            template_id: template.id,
            template_name: template.name.clone(),
            node_type: template.node_type.clone(),
            groups: form_groups(&template.name, form),
        });
        true
    }

    /// Drop queued publications of a template that no longer exists
    pub fn discard(&mut self, template_id: &RecordId) -> usize {
        let before = self.pending.len();
        self.pending.retain(|p| &p.template_id != template_id);
        before - self.pending.len()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Merge every queued publication into the registry, oldest first
    pub fn drain_into(&mut self, registry: &mut SchemaRegistry) -> DrainResult {
        let mut result = DrainResult::default();
        while let Some(publication) = self.pending.pop_front() {
            result.claimed += 1;
            let count = publication.groups.len();
            if count == 0 {
                continue;
            }
            tracing::debug!(
                template = %publication.template_id,
                node_type = %publication.node_type,
                groups = count,
                "publishing template form into schema"
            );
            registry.merge_template_groups(&publication.node_type, publication.groups);
            result.published += 1;
            result.groups += count;
        }
        result
    }
}

/// One group per form section, keyed `"{template} - {section}"`
pub fn form_groups(template_name: &str, form: &DynamicFormConfig) -> Vec<PropertyGroup> {
    form.sections
        .iter()
        .filter(|section| !section.fields.is_empty())
        .enumerate()
        .map(|(index, section)| {
            let key = format!("{} - {}", template_name, section.title);
            let mut group = PropertyGroup::new(key.clone(), key).with_order(100 + index as u32);
            group.properties = section
                .fields
                .iter()
                .enumerate()
                .map(|(order, field)| field_config(field, order as u32))
                .collect();
            group
        })
        .collect()
}

pub fn property_type_for(field_type: FieldType) -> PropertyType {
    match field_type {
        FieldType::Text | FieldType::Textarea | FieldType::File => PropertyType::Text,
        FieldType::Select => PropertyType::Select,
        FieldType::Checkbox => PropertyType::Boolean,
        FieldType::Number => PropertyType::Number,
        FieldType::Date => PropertyType::Date,
    }
}

fn field_config(field: &DynamicField, order: u32) -> PropertyConfig {
    let mut config = PropertyConfig::new(field.key.clone(), field.label.clone(), property_type_for(field.field_type))
        .with_order(order);
    if field.required {
        config = config.required();
    }
    if let Some(description) = &field.description {
        config = config.with_description(description.clone());
    }
    if !field.options.is_empty() {
        config = config.with_options(
            field
                .options
                .iter()
                .map(|o| SelectOption::new(o.clone(), o.clone()))
                .collect(),
        );
    }
    if let Some(validation) = &field.validation {
        if let Some(pattern) = &validation.pattern {
            config = config.with_rule(ValidationRule::pattern(
                pattern.clone(),
                format!("{} has an invalid format", field.label),
            ));
        }
        if let Some(min) = validation.min {
            config = config.with_rule(ValidationRule::min(
                min,
                format!("{} must be at least {}", field.label, PropertyValue::Number(min)),
            ));
        }
        if let Some(max) = validation.max {
            config = config.with_rule(ValidationRule::max(
                max,
                format!("{} must be at most {}", field.label, PropertyValue::Number(max)),
            ));
        }
    }
    config
}
