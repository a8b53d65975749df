//! Closed element, event and task vocabularies
//!
//! Diagram element types arrive as strings such as `bpmn:UserTask`. Code that
//! needs to branch on them goes through these enums instead of comparing
//! strings, so adding a kind means adding a variant and its match arms.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Broad family of a diagram element type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Task,
    Event,
    Gateway,
    Flow,
    Process,
    Other,
}

impl ElementKind {
    /// Classify an element type name such as `bpmn:ServiceTask`
    pub fn of(element_type: &str) -> Self {
        let local = element_type
            .split_once(':')
            .map(|(_, l)| l)
            .unwrap_or(element_type);
        if local.ends_with("Task") {
            ElementKind::Task
        } else if local.ends_with("Event") {
            ElementKind::Event
        } else if local.ends_with("Gateway") {
            ElementKind::Gateway
        } else if local.ends_with("Flow") {
            ElementKind::Flow
        } else if local == "Process" || local == "SubProcess" {
            ElementKind::Process
        } else {
            ElementKind::Other
        }
    }
}

/// Event definition attached to an event element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Message,
    Timer,
    Error,
    Signal,
    Escalation,
}

impl EventKind {
    pub fn all() -> &'static [EventKind] {
        &[
            EventKind::Message,
            EventKind::Timer,
            EventKind::Error,
            EventKind::Signal,
            EventKind::Escalation,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Message => "message",
            EventKind::Timer => "timer",
            EventKind::Error => "error",
            EventKind::Signal => "signal",
            EventKind::Escalation => "escalation",
        }
    }

    /// Tag of the event definition element in an extension fragment
    pub fn definition_tag(&self) -> &'static str {
        match self {
            EventKind::Message => "bpmn:MessageEventDefinition",
            EventKind::Timer => "bpmn:TimerEventDefinition",
            EventKind::Error => "bpmn:ErrorEventDefinition",
            EventKind::Signal => "bpmn:SignalEventDefinition",
            EventKind::Escalation => "bpmn:EscalationEventDefinition",
        }
    }

    pub fn from_definition_tag(tag: &str) -> Option<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|k| k.definition_tag() == tag)
    }

    /// Property key holding the definition's payload (message name, timer
    /// expression, error code, ...)
    pub fn payload_key(&self) -> &'static str {
        match self {
            EventKind::Message => "messageName",
            EventKind::Timer => "timerExpression",
            EventKind::Error => "errorCode",
            EventKind::Signal => "signalName",
            EventKind::Escalation => "escalationCode",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "message" => Ok(EventKind::Message),
            "timer" => Ok(EventKind::Timer),
            "error" => Ok(EventKind::Error),
            "signal" => Ok(EventKind::Signal),
            "escalation" => Ok(EventKind::Escalation),
            _ => Err(format!("Unknown event type: {}", s)),
        }
    }
}

/// How a task's behaviour is bound at execution time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum TaskImplementation {
    #[default]
    Implementation,
    Class,
    Expression,
    DelegateExpression,
}

impl fmt::Display for TaskImplementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskImplementation::Implementation => write!(f, "implementation"),
            TaskImplementation::Class => write!(f, "class"),
            TaskImplementation::Expression => write!(f, "expression"),
            TaskImplementation::DelegateExpression => write!(f, "delegateExpression"),
        }
    }
}

/// Listener families carried in extension fragments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerKind {
    Execution,
    Task,
}

impl ListenerKind {
    pub fn all() -> &'static [ListenerKind] {
        &[ListenerKind::Execution, ListenerKind::Task]
    }

    /// Property key holding the listener list
    pub fn property_key(&self) -> &'static str {
        match self {
            ListenerKind::Execution => "executionListeners",
            ListenerKind::Task => "taskListeners",
        }
    }

    /// Local name of the container element (namespace added by the builder)
    pub fn container_name(&self) -> &'static str {
        match self {
            ListenerKind::Execution => "ExecutionListeners",
            ListenerKind::Task => "TaskListeners",
        }
    }

    pub fn listener_name(&self) -> &'static str {
        match self {
            ListenerKind::Execution => "ExecutionListener",
            ListenerKind::Task => "TaskListener",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_kind_classification() {
        assert_eq!(ElementKind::of("bpmn:UserTask"), ElementKind::Task);
        assert_eq!(ElementKind::of("bpmn:StartEvent"), ElementKind::Event);
        assert_eq!(ElementKind::of("bpmn:ExclusiveGateway"), ElementKind::Gateway);
        assert_eq!(ElementKind::of("bpmn:SequenceFlow"), ElementKind::Flow);
        assert_eq!(ElementKind::of("bpmn:Process"), ElementKind::Process);
        assert_eq!(ElementKind::of("bpmn:TextAnnotation"), ElementKind::Other);
        assert_eq!(ElementKind::of("ServiceTask"), ElementKind::Task);
    }

    #[test]
    fn test_event_kind_tags() {
        for kind in EventKind::all() {
            assert_eq!(EventKind::from_definition_tag(kind.definition_tag()), Some(*kind));
            assert_eq!(kind.as_str().parse::<EventKind>().unwrap(), *kind);
        }
        assert_eq!(EventKind::from_definition_tag("bpmn:LinkEventDefinition"), None);
    }
}
