//! Named, reversible value transformers

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::core::element::PropertyContext;
use crate::core::value::{parse_date, PropertyValue};

/// A pure, reversible conversion between the edited and the stored form of a
/// value
pub trait Transformer: Send + Sync {
    fn name(&self) -> &str;

    /// Edited form to stored form
    fn transform(&self, value: &PropertyValue, ctx: &PropertyContext<'_>) -> PropertyValue;

    /// Stored form back to edited form
    fn reverse(&self, value: &PropertyValue, ctx: &PropertyContext<'_>) -> PropertyValue;
}

impl fmt::Debug for dyn Transformer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Transformer({})", self.name())
    }
}

type TransformFn = Arc<dyn Fn(&PropertyValue, &PropertyContext<'_>) -> PropertyValue + Send + Sync>;

/// Transformer assembled from two closures, for host-defined conversions
#[derive(Clone)]
pub struct FnTransformer {
    name: String,
    forward: TransformFn,
    backward: TransformFn,
}

impl FnTransformer {
    pub fn new<F, R>(name: impl Into<String>, forward: F, backward: R) -> Self
    where
        F: Fn(&PropertyValue, &PropertyContext<'_>) -> PropertyValue + Send + Sync + 'static,
        R: Fn(&PropertyValue, &PropertyContext<'_>) -> PropertyValue + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            forward: Arc::new(forward),
            backward: Arc::new(backward),
        }
    }
}

impl Transformer for FnTransformer {
    fn name(&self) -> &str {
        &self.name
    }

    fn transform(&self, value: &PropertyValue, ctx: &PropertyContext<'_>) -> PropertyValue {
        (self.forward)(value, ctx)
    }

    fn reverse(&self, value: &PropertyValue, ctx: &PropertyContext<'_>) -> PropertyValue {
        (self.backward)(value, ctx)
    }
}

/// Comma-separated string <-> list of trimmed, non-empty items
pub struct StringToArray;

impl Transformer for StringToArray {
    fn name(&self) -> &str {
        "stringToArray"
    }

    fn transform(&self, value: &PropertyValue, _ctx: &PropertyContext<'_>) -> PropertyValue {
        match value {
            PropertyValue::String(s) => PropertyValue::List(
                s.split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(String::from)
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    fn reverse(&self, value: &PropertyValue, _ctx: &PropertyContext<'_>) -> PropertyValue {
        match value {
            PropertyValue::List(items) => PropertyValue::String(items.join(", ")),
            other => other.clone(),
        }
    }
}

pub struct NumberToString;

impl Transformer for NumberToString {
    fn name(&self) -> &str {
        "numberToString"
    }

    fn transform(&self, value: &PropertyValue, _ctx: &PropertyContext<'_>) -> PropertyValue {
        match value {
            PropertyValue::Number(_) => PropertyValue::String(value.to_text()),
            other => other.clone(),
        }
    }

    fn reverse(&self, value: &PropertyValue, _ctx: &PropertyContext<'_>) -> PropertyValue {
        match value.numeric() {
            Some(n) if matches!(value, PropertyValue::String(_)) => PropertyValue::Number(n),
            _ => value.clone(),
        }
    }
}

pub struct BooleanToString;

impl Transformer for BooleanToString {
    fn name(&self) -> &str {
        "booleanToString"
    }

    fn transform(&self, value: &PropertyValue, _ctx: &PropertyContext<'_>) -> PropertyValue {
        match value {
            PropertyValue::Bool(b) => PropertyValue::String(b.to_string()),
            other => other.clone(),
        }
    }

    fn reverse(&self, value: &PropertyValue, _ctx: &PropertyContext<'_>) -> PropertyValue {
        match value.as_str() {
            Some("true") => PropertyValue::Bool(true),
            Some("false") => PropertyValue::Bool(false),
            _ => value.clone(),
        }
    }
}

pub struct DateToString;

impl Transformer for DateToString {
    fn name(&self) -> &str {
        "dateToString"
    }

    fn transform(&self, value: &PropertyValue, _ctx: &PropertyContext<'_>) -> PropertyValue {
        match value {
            PropertyValue::Date(_) => PropertyValue::String(value.to_text()),
            other => other.clone(),
        }
    }

    fn reverse(&self, value: &PropertyValue, _ctx: &PropertyContext<'_>) -> PropertyValue {
        match value.as_str().and_then(parse_date) {
            Some(d) => PropertyValue::Date(d),
            None => value.clone(),
        }
    }
}

/// Transformers keyed by name; registering a name again replaces the entry
#[derive(Default, Clone)]
pub struct TransformerRegistry {
    entries: HashMap<String, Arc<dyn Transformer>>,
}

impl TransformerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in conversions
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(StringToArray));
        registry.register(Arc::new(NumberToString));
        registry.register(Arc::new(BooleanToString));
        registry.register(Arc::new(DateToString));
        registry
    }

    pub fn register(&mut self, transformer: Arc<dyn Transformer>) {
        self.entries
            .insert(transformer.name().to_string(), transformer);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Transformer>> {
        self.entries.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for TransformerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformerRegistry")
            .field("names", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::element::Element;

    #[test]
    fn test_string_to_array_both_ways() {
        let element = Element::new("Task_1", "bpmn:UserTask");
        let ctx = PropertyContext::for_element(&element);
        let list = StringToArray.transform(&"alice, bob,, carol ".into(), &ctx);
        assert_eq!(
            list,
            PropertyValue::List(vec!["alice".into(), "bob".into(), "carol".into()])
        );
        assert_eq!(
            StringToArray.reverse(&list, &ctx),
            PropertyValue::from("alice, bob, carol")
        );
    }

    #[test]
    fn test_number_and_boolean_reverse() {
        let element = Element::new("Task_1", "bpmn:UserTask");
        let ctx = PropertyContext::for_element(&element);
        assert_eq!(NumberToString.reverse(&"42".into(), &ctx), PropertyValue::Number(42.0));
        assert_eq!(NumberToString.reverse(&"abc".into(), &ctx), PropertyValue::from("abc"));
        assert_eq!(BooleanToString.reverse(&"true".into(), &ctx), PropertyValue::Bool(true));
        assert_eq!(BooleanToString.reverse(&"yes".into(), &ctx), PropertyValue::from("yes"));
    }

    #[test]
    fn test_builtins_registered() {
        let registry = TransformerRegistry::with_builtins();
        assert_eq!(
            registry.names(),
            vec!["booleanToString", "dateToString", "numberToString", "stringToArray"]
        );
    }
}
