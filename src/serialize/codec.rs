//! Type-directed restoration of flattened text values

use serde_json::Value as JsonValue;

use crate::core::value::{parse_date, PropertyValue};
use crate::schema::property::{PropertyConfig, PropertyType};

pub fn find_config<'a>(configs: &'a [PropertyConfig], key: &str) -> Option<&'a PropertyConfig> {
    configs.iter().find(|c| c.key == key)
}

/// Turn text back into a typed value using the declared property type
///
/// Without a config, or when the text does not fit the declared type, the
/// value stays a string.
pub fn restore_value(text: &str, config: Option<&PropertyConfig>) -> PropertyValue {
    let Some(config) = config else {
        return PropertyValue::String(text.to_string());
    };
    if text.is_empty() {
        return PropertyValue::String(String::new());
    }
    match config.property_type {
        PropertyType::Number => match text.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => PropertyValue::Number(n),
            _ => PropertyValue::String(text.to_string()),
        },
        PropertyType::Boolean => PropertyValue::Bool(text == "true" || text == "1"),
        PropertyType::Date | PropertyType::Datetime => match parse_date(text) {
            Some(d) => PropertyValue::Date(d),
            None => PropertyValue::String(text.to_string()),
        },
        PropertyType::Json => match serde_json::from_str::<JsonValue>(text) {
            Ok(v) => PropertyValue::from(v),
            Err(_) => PropertyValue::String(text.to_string()),
        },
        PropertyType::Select => config
            .options
            .iter()
            .find(|o| option_text(&o.value) == text)
            .map(|o| PropertyValue::from(o.value.clone()))
            .unwrap_or_else(|| PropertyValue::String(text.to_string())),
        PropertyType::MultiSelect => PropertyValue::List(
            text.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
        ),
        _ => PropertyValue::String(text.to_string()),
    }
}

fn option_text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::property::SelectOption;

    #[test]
    fn test_restore_by_declared_type() {
        let number = PropertyConfig::new("n", "N", PropertyType::Number);
        assert_eq!(restore_value("3", Some(&number)), PropertyValue::Number(3.0));
        assert_eq!(restore_value("three", Some(&number)), PropertyValue::from("three"));

        let flag = PropertyConfig::new("b", "B", PropertyType::Boolean);
        assert_eq!(restore_value("1", Some(&flag)), PropertyValue::Bool(true));
        assert_eq!(restore_value("no", Some(&flag)), PropertyValue::Bool(false));

        let date = PropertyConfig::new("d", "D", PropertyType::Datetime);
        assert!(matches!(
            restore_value("2024-03-01T09:30:00.000Z", Some(&date)),
            PropertyValue::Date(_)
        ));

        let json = PropertyConfig::new("j", "J", PropertyType::Json);
        assert!(matches!(
            restore_value(r#"{"a":1}"#, Some(&json)),
            PropertyValue::Structured(_)
        ));
    }

    #[test]
    fn test_select_restores_option_value() {
        let priority = PropertyConfig::new("priority", "Priority", PropertyType::Select)
            .with_options(vec![SelectOption::new("Low", 1), SelectOption::new("High", 3)]);
        assert_eq!(restore_value("3", Some(&priority)), PropertyValue::Number(3.0));
        assert_eq!(restore_value("7", Some(&priority)), PropertyValue::from("7"));
    }

    #[test]
    fn test_undeclared_stays_string() {
        assert_eq!(restore_value("42", None), PropertyValue::from("42"));
    }
}
