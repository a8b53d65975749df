//! Rule evaluation and value transformation

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use regex::Regex;
use url::Url;

use crate::core::element::PropertyContext;
use crate::core::value::{parse_date, PropertyBag, PropertyValue};
use crate::schema::property::{PropertyConfig, PropertyType};
use crate::validation::rules::{RuleKind, ValidationFailure, ValidationResult, ValidationRule};
use crate::validation::transform::{Transformer, TransformerRegistry};

/// Result of looking up and applying a transformer
#[derive(Debug, Clone, PartialEq)]
pub struct Transformed {
    pub value: PropertyValue,
    /// Set when the transformer was missing and the value passed through
    pub warning: Option<String>,
}

/// Evaluates declarative rules and hosts the transformer registry
///
/// Evaluation never mutates state; the only mutable part is the registry.
#[derive(Debug, Clone)]
pub struct ValidationEngine {
    transformers: TransformerRegistry,
}

impl Default for ValidationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationEngine {
    /// Engine with the built-in transformers registered
    pub fn new() -> Self {
        Self {
            transformers: TransformerRegistry::with_builtins(),
        }
    }

    pub fn register_transformer(&mut self, transformer: Arc<dyn Transformer>) {
        tracing::debug!(name = transformer.name(), "registering transformer");
        self.transformers.register(transformer);
    }

    pub fn transformers(&self) -> &TransformerRegistry {
        &self.transformers
    }

    /// Validate one value against its config
    ///
    /// An empty value yields at most a single `required` failure and skips
    /// every other rule and the type check.
    pub fn validate_property(
        &self,
        value: &PropertyValue,
        config: &PropertyConfig,
        ctx: &PropertyContext<'_>,
    ) -> ValidationResult {
        if value.is_empty() {
            if config.is_required() {
                let message = config
                    .validation
                    .iter()
                    .find(|rule| matches!(rule.kind, RuleKind::Required))
                    .map(|rule| rule.message.clone())
                    .unwrap_or_else(|| format!("{} is required", config.label));
                return ValidationResult::from_parts(
                    vec![failure(config, value, &message, "required")],
                    Vec::new(),
                );
            }
            return ValidationResult::success();
        }

        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        for rule in &config.validation {
            if matches!(rule.kind, RuleKind::Required) {
                continue;
            }
            match self.check_rule(value, rule, config, ctx) {
                Ok(true) => {}
                Ok(false) => errors.push(failure(
                    config,
                    value,
                    &rule.message,
                    rule.kind.type_name(),
                )),
                Err(problem) => {
                    warnings.push(problem);
                    errors.push(failure(
                        config,
                        value,
                        &rule.message,
                        rule.kind.type_name(),
                    ));
                }
            }
        }

        if let Some(message) = type_mismatch(value, config) {
            errors.push(failure(config, value, &message, config.property_type.as_str()));
        }

        ValidationResult::from_parts(errors, warnings)
    }

    /// Validate every config against the bag; missing keys count as empty
    pub fn validate_properties(
        &self,
        properties: &PropertyBag,
        configs: &[PropertyConfig],
        ctx: &PropertyContext<'_>,
    ) -> ValidationResult {
        let mut result = ValidationResult::success();
        for config in configs {
            let value = properties.get(&config.key).unwrap_or(&PropertyValue::Null);
            result.merge(self.validate_property(value, config, ctx));
        }
        result
    }

    /// Apply a named transformer, passing the value through if it is missing
    pub fn transform_value(
        &self,
        value: &PropertyValue,
        name: &str,
        ctx: &PropertyContext<'_>,
    ) -> Transformed {
        match self.transformers.get(name) {
            Some(transformer) => Transformed {
                value: transformer.transform(value, ctx),
                warning: None,
            },
            None => missing_transformer(value, name),
        }
    }

    pub fn reverse_transform_value(
        &self,
        value: &PropertyValue,
        name: &str,
        ctx: &PropertyContext<'_>,
    ) -> Transformed {
        match self.transformers.get(name) {
            Some(transformer) => Transformed {
                value: transformer.reverse(value, ctx),
                warning: None,
            },
            None => missing_transformer(value, name),
        }
    }

    /// `Err` carries a warning for a rule that could not be evaluated
    fn check_rule(
        &self,
        value: &PropertyValue,
        rule: &ValidationRule,
        config: &PropertyConfig,
        ctx: &PropertyContext<'_>,
    ) -> Result<bool, String> {
        let passed = match &rule.kind {
            RuleKind::Required => !value.is_empty(),
            RuleKind::MinLength(min) => length_of(value).map_or(true, |len| len >= *min),
            RuleKind::MaxLength(max) => length_of(value).map_or(true, |len| len <= *max),
            RuleKind::Min(min) => value.numeric().map_or(true, |n| n >= *min),
            RuleKind::Max(max) => value.numeric().map_or(true, |n| n <= *max),
            RuleKind::Pattern(pattern) => match value.as_str() {
                Some(text) => match compiled_pattern(pattern) {
                    Ok(re) => re.is_match(text),
                    Err(e) => {
                        tracing::warn!(property = %config.key, %pattern, "invalid pattern: {}", e);
                        return Err(format!(
                            "{}: invalid pattern '{}'",
                            config.key, pattern
                        ));
                    }
                },
                None => true,
            },
            RuleKind::Email => value.as_str().map_or(true, is_email),
            RuleKind::Url => value.as_str().map_or(true, is_url),
            RuleKind::Custom(check) => check(value, config, ctx),
        };
        Ok(passed)
    }
}

fn failure(config: &PropertyConfig, value: &PropertyValue, message: &str, rule: &str) -> ValidationFailure {
    ValidationFailure {
        property: config.key.clone(),
        message: message.to_string(),
        value: value.clone(),
        rule: rule.to_string(),
    }
}

fn missing_transformer(value: &PropertyValue, name: &str) -> Transformed {
    tracing::warn!(transformer = name, "transformer not found, value passed through");
    Transformed {
        value: value.clone(),
        warning: Some(format!("Transformer '{}' not found", name)),
    }
}

fn length_of(value: &PropertyValue) -> Option<usize> {
    match value {
        PropertyValue::String(s) => Some(s.chars().count()),
        PropertyValue::List(items) => Some(items.len()),
        _ => None,
    }
}

/// Type-consistency message for the config's declared type, if violated
fn type_mismatch(value: &PropertyValue, config: &PropertyConfig) -> Option<String> {
    let label = &config.label;
    match config.property_type {
        PropertyType::Number if value.numeric().is_none() => {
            Some(format!("{} must be a number", label))
        }
        PropertyType::Boolean => match value {
            PropertyValue::Bool(_) => None,
            PropertyValue::String(s) if s == "true" || s == "false" => None,
            _ => Some(format!("{} must be true or false", label)),
        },
        PropertyType::Date | PropertyType::Datetime => match value {
            PropertyValue::Date(_) => None,
            PropertyValue::String(s) if parse_date(s).is_some() => None,
            _ => Some(format!("{} must be a valid date", label)),
        },
        PropertyType::Email => match value.as_str() {
            Some(s) if !is_email(s) => Some(format!("{} must be a valid email address", label)),
            _ => None,
        },
        PropertyType::Url => match value.as_str() {
            Some(s) if !is_url(s) => Some(format!("{} must be a valid URL", label)),
            _ => None,
        },
        PropertyType::Json => match value.as_str() {
            Some(s) if serde_json::from_str::<serde_json::Value>(s).is_err() => {
                Some(format!("{} must be valid JSON", label))
            }
            _ => None,
        },
        _ => None,
    }
}

const EMAIL_PATTERN: &str = r"^[^\s@]+@[^\s@]+\.[^\s@]+$";

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(EMAIL_PATTERN).expect("valid email pattern"))
}

/// Fixed-form address check: `local@domain.tld`, no whitespace, a single `@`
pub fn is_email(s: &str) -> bool {
    email_pattern().is_match(s)
}

fn pattern_cache() -> &'static RwLock<HashMap<String, Regex>> {
    static CACHE: OnceLock<RwLock<HashMap<String, Regex>>> = OnceLock::new();
    CACHE.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Compile a rule pattern once per pattern string
fn compiled_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    if let Some(re) = pattern_cache()
        .read()
        .ok()
        .and_then(|cache| cache.get(pattern).cloned())
    {
        return Ok(re);
    }
    let re = Regex::new(pattern)?;
    if let Ok(mut cache) = pattern_cache().write() {
        cache.insert(pattern.to_string(), re.clone());
    }
    Ok(re)
}

pub fn is_url(s: &str) -> bool {
    Url::parse(s).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::element::Element;
    use chrono::Utc;

    fn ctx_for(element: &Element) -> PropertyContext<'_> {
        PropertyContext::for_element(element)
    }

    fn code_config() -> PropertyConfig {
        PropertyConfig::text("code", "Code")
            .with_rule(ValidationRule::min_length(5, "too short"))
            .with_rule(ValidationRule::pattern("^[A-Z]+$", "uppercase only"))
            .with_rule(ValidationRule::email("not an email"))
    }

    #[test]
    fn test_all_failing_rules_reported() {
        let engine = ValidationEngine::new();
        let element = Element::new("Task_1", "bpmn:UserTask");
        let result = engine.validate_property(&"ab".into(), &code_config(), &ctx_for(&element));
        assert!(!result.is_valid);
        let rules: Vec<&str> = result.errors.iter().map(|e| e.rule.as_str()).collect();
        assert_eq!(rules, vec!["minLength", "pattern", "email"]);
    }

    #[test]
    fn test_empty_optional_value_skips_rules() {
        let engine = ValidationEngine::new();
        let element = Element::new("Task_1", "bpmn:UserTask");
        for empty in [PropertyValue::Null, "".into(), PropertyValue::List(vec![])] {
            let result = engine.validate_property(&empty, &code_config(), &ctx_for(&element));
            assert!(result.is_valid);
            assert!(result.errors.is_empty());
        }
    }

    #[test]
    fn test_required_short_circuits() {
        let engine = ValidationEngine::new();
        let element = Element::new("Task_1", "bpmn:UserTask");
        let config = code_config().required();
        let result = engine.validate_property(&"".into(), &config, &ctx_for(&element));
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].rule, "required");
        assert_eq!(result.errors[0].message, "Code is required");
    }

    #[test]
    fn test_required_rule_message_used() {
        let engine = ValidationEngine::new();
        let element = Element::new("Task_1", "bpmn:UserTask");
        let config = PropertyConfig::text("name", "Name")
            .with_rule(ValidationRule::required("Please name this task"));
        let result = engine.validate_property(&PropertyValue::Null, &config, &ctx_for(&element));
        assert_eq!(result.errors[0].message, "Please name this task");
    }

    #[test]
    fn test_number_type_and_bounds() {
        let engine = ValidationEngine::new();
        let element = Element::new("Task_1", "bpmn:UserTask");
        let config = PropertyConfig::new("priority", "Priority", PropertyType::Number)
            .with_rule(ValidationRule::min(0.0, "min 0"))
            .with_rule(ValidationRule::max(100.0, "max 100"));
        let ctx = ctx_for(&element);
        assert!(engine.validate_property(&PropertyValue::Number(50.0), &config, &ctx).is_valid);
        assert!(engine.validate_property(&"75".into(), &config, &ctx).is_valid);
        let over = engine.validate_property(&PropertyValue::Number(150.0), &config, &ctx);
        assert_eq!(over.errors.len(), 1);
        assert_eq!(over.errors[0].rule, "max");
        let text = engine.validate_property(&"high".into(), &config, &ctx);
        assert_eq!(text.errors.len(), 1);
        assert_eq!(text.errors[0].message, "Priority must be a number");
    }

    #[test]
    fn test_type_checks() {
        let engine = ValidationEngine::new();
        let element = Element::new("Task_1", "bpmn:UserTask");
        let ctx = ctx_for(&element);
        let date = PropertyConfig::new("dueDate", "Due", PropertyType::Date);
        assert!(engine.validate_property(&"2024-05-01".into(), &date, &ctx).is_valid);
        assert!(engine.validate_property(&Utc::now().into(), &date, &ctx).is_valid);
        assert!(!engine.validate_property(&"someday".into(), &date, &ctx).is_valid);

        let json = PropertyConfig::new("payload", "Payload", PropertyType::Json);
        assert!(engine.validate_property(&r#"{"a":1}"#.into(), &json, &ctx).is_valid);
        assert!(!engine.validate_property(&"{a:1".into(), &json, &ctx).is_valid);

        let url = PropertyConfig::new("endpoint", "Endpoint", PropertyType::Url);
        assert!(engine.validate_property(&"https://example.com/x".into(), &url, &ctx).is_valid);
        assert!(!engine.validate_property(&"not a url".into(), &url, &ctx).is_valid);

        let flag = PropertyConfig::new("async", "Async", PropertyType::Boolean);
        assert!(engine.validate_property(&"true".into(), &flag, &ctx).is_valid);
        assert!(!engine.validate_property(&"yes".into(), &flag, &ctx).is_valid);
    }

    #[test]
    fn test_email_form() {
        assert!(is_email("a@b.co"));
        assert!(is_email("first.last@mail.example.org"));
        assert!(!is_email("a@b"));
        assert!(!is_email("a@.b"));
        assert!(!is_email("a@b."));
        assert!(!is_email("a b@c.d"));
        assert!(!is_email("a@b@c.d"));
        assert!(!is_email("@b.c"));
        assert!(email_pattern().as_str() == EMAIL_PATTERN);
    }

    #[test]
    fn test_patterns_are_compiled_once() {
        let engine = ValidationEngine::new();
        let element = Element::new("Task_1", "bpmn:UserTask");
        let pattern = "^INV-[0-9]{4}$";
        let config = PropertyConfig::text("invoice", "Invoice")
            .with_rule(ValidationRule::pattern(pattern, "bad invoice"));

        assert!(engine.validate_property(&"INV-0042".into(), &config, &ctx_for(&element)).is_valid);
        let first = pattern_cache().read().unwrap().get(pattern).cloned().unwrap();
        assert!(!engine.validate_property(&"INV-42".into(), &config, &ctx_for(&element)).is_valid);
        let second = pattern_cache().read().unwrap().get(pattern).cloned().unwrap();
        assert_eq!(first.as_str(), second.as_str());

        assert!(compiled_pattern("([a-z").is_err());
        assert!(!pattern_cache().read().unwrap().contains_key("([a-z"));
    }

    #[test]
    fn test_invalid_pattern_fails_rule() {
        let engine = ValidationEngine::new();
        let element = Element::new("Task_1", "bpmn:UserTask");
        let config = PropertyConfig::text("code", "Code")
            .with_rule(ValidationRule::pattern("([a-z", "bad"));
        let result = engine.validate_property(&"abc".into(), &config, &ctx_for(&element));
        assert!(!result.is_valid);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_custom_rule_sees_context() {
        let engine = ValidationEngine::new();
        let element = Element::new("Task_1", "bpmn:UserTask");
        let config = PropertyConfig::text("owner", "Owner").with_rule(ValidationRule::custom(
            |value, _, ctx| value.as_str() != Some(ctx.element.id.as_str()),
            "owner cannot be the element id",
        ));
        let ctx = ctx_for(&element);
        assert!(!engine.validate_property(&"Task_1".into(), &config, &ctx).is_valid);
        assert!(engine.validate_property(&"alice".into(), &config, &ctx).is_valid);
    }

    #[test]
    fn test_missing_transformer_passes_through() {
        let engine = ValidationEngine::new();
        let element = Element::new("Task_1", "bpmn:UserTask");
        let out = engine.transform_value(&"a,b".into(), "nope", &ctx_for(&element));
        assert_eq!(out.value, PropertyValue::from("a,b"));
        assert!(out.warning.is_some());

        let out = engine.transform_value(&"a,b".into(), "stringToArray", &ctx_for(&element));
        assert_eq!(out.value, PropertyValue::List(vec!["a".into(), "b".into()]));
        assert!(out.warning.is_none());
    }

    #[test]
    fn test_reverse_transform() {
        let engine = ValidationEngine::new();
        let element = Element::new("Task_1", "bpmn:UserTask");
        let list = PropertyValue::List(vec!["a".into(), "b".into()]);
        let out = engine.reverse_transform_value(&list, "stringToArray", &ctx_for(&element));
        assert_eq!(out.value, PropertyValue::from("a, b"));

        let out = engine.reverse_transform_value(&"42".into(), "numberToString", &ctx_for(&element));
        assert_eq!(out.value, PropertyValue::Number(42.0));

        let out = engine.reverse_transform_value(&list, "nope", &ctx_for(&element));
        assert_eq!(out.value, list);
        assert!(out.warning.is_some());
    }

    #[test]
    fn test_validate_properties_collects_across_configs() {
        let engine = ValidationEngine::new();
        let element = Element::new("Task_1", "bpmn:UserTask");
        let configs = vec![
            PropertyConfig::text("name", "Name").required(),
            PropertyConfig::new("priority", "Priority", PropertyType::Number),
        ];
        let mut bag = PropertyBag::new();
        bag.insert("priority".into(), "high".into());
        let result = engine.validate_properties(&bag, &configs, &ctx_for(&element));
        assert_eq!(result.errors.len(), 2);
        assert_eq!(result.errors[0].property, "name");
        assert_eq!(result.errors[1].property, "priority");
    }
}
