//! Base schemas installed for the common BPMN element types

use crate::core::kinds::{ElementKind, EventKind};
use crate::schema::property::{
    PropertyConfig, PropertyGroup, PropertySchema, PropertyType, SelectOption,
};

/// Element types that receive a base schema
pub const DEFAULT_ELEMENT_TYPES: &[&str] = &[
    "bpmn:StartEvent",
    "bpmn:EndEvent",
    "bpmn:UserTask",
    "bpmn:ServiceTask",
    "bpmn:ExclusiveGateway",
    "bpmn:SequenceFlow",
    "bpmn:Process",
];

/// Build the base schema for an element type: a `basic` group plus one
/// group for the element's kind
pub fn default_schema(element_type: &str) -> PropertySchema {
    let mut schema = PropertySchema::new(element_type).with_group(basic_group());
    match ElementKind::of(element_type) {
        ElementKind::Task => schema.groups.push(task_group()),
        ElementKind::Gateway => schema.groups.push(gateway_group()),
        ElementKind::Event => schema.groups.push(event_group()),
        ElementKind::Flow if element_type == "bpmn:SequenceFlow" => {
            schema.groups.push(flow_group())
        }
        _ => {}
    }
    schema
}

fn basic_group() -> PropertyGroup {
    PropertyGroup::new("basic", "General")
        .with_icon("fas fa-info-circle")
        .with_order(1)
        .with_property(PropertyConfig::text("id", "ID").required().read_only())
        .with_property(PropertyConfig::text("name", "Name"))
        .with_property(PropertyConfig::new(
            "documentation",
            "Documentation",
            PropertyType::Textarea,
        ))
}

fn task_group() -> PropertyGroup {
    PropertyGroup::new("task", "Task")
        .with_icon("fas fa-tasks")
        .with_order(2)
        .with_property(PropertyConfig::text("assignee", "Assignee"))
        .with_property(
            PropertyConfig::text("candidateUsers", "Candidate users")
                .with_description("Comma-separated user ids")
                .with_transformer("stringToArray"),
        )
        .with_property(
            PropertyConfig::text("candidateGroups", "Candidate groups")
                .with_description("Comma-separated group ids")
                .with_transformer("stringToArray"),
        )
        .with_property(PropertyConfig::new("dueDate", "Due date", PropertyType::Datetime))
        .with_property(
            PropertyConfig::new("priority", "Priority", PropertyType::Select).with_options(vec![
                SelectOption::new("Low", 1),
                SelectOption::new("Normal", 2),
                SelectOption::new("High", 3),
                SelectOption::new("Urgent", 4),
            ]),
        )
}

fn gateway_group() -> PropertyGroup {
    PropertyGroup::new("gateway", "Gateway")
        .with_icon("fas fa-code-branch")
        .with_order(2)
        .with_property(PropertyConfig::new("defaultFlow", "Default flow", PropertyType::Select))
        .with_property(
            PropertyConfig::new("gatewayDirection", "Direction", PropertyType::Select)
                .with_options(vec![
                    SelectOption::new("Unspecified", "Unspecified"),
                    SelectOption::new("Converging", "Converging"),
                    SelectOption::new("Diverging", "Diverging"),
                    SelectOption::new("Mixed", "Mixed"),
                ]),
        )
}

fn event_group() -> PropertyGroup {
    let mut options = vec![SelectOption::new("None", "")];
    options.extend(EventKind::all().iter().map(|kind| {
        let name = kind.as_str();
        let mut label = name.to_string();
        label[..1].make_ascii_uppercase();
        SelectOption::new(label, name)
    }));
    PropertyGroup::new("event", "Event")
        .with_icon("fas fa-bolt")
        .with_order(2)
        .with_property(
            PropertyConfig::new("eventType", "Event type", PropertyType::Select)
                .with_options(options),
        )
        .with_property(
            PropertyConfig::new("cancelActivity", "Cancel activity", PropertyType::Boolean)
                .with_default(true),
        )
}

fn flow_group() -> PropertyGroup {
    PropertyGroup::new("flow", "Flow")
        .with_icon("fas fa-route")
        .with_order(2)
        .with_property(
            PropertyConfig::new(
                "conditionExpression",
                "Condition expression",
                PropertyType::Textarea,
            )
            .with_description("For example: ${amount > 1000}"),
        )
        .with_property(
            PropertyConfig::new("isImmediate", "Immediate", PropertyType::Boolean)
                .with_default(false),
        )
}
