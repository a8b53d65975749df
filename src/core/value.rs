//! Property values and property bags

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;

/// Keyed property values attached to one element
pub type PropertyBag = BTreeMap<String, PropertyValue>;

/// A single property value
///
/// Serializes through its JSON form, so a bag round-trips losslessly through
/// JSON except for `Date`, which comes back as an RFC 3339 string.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "JsonValue", into = "JsonValue")]
pub enum PropertyValue {
    #[default]
    Null,
    String(String),
    Number(f64),
    Bool(bool),
    Date(DateTime<Utc>),
    List(Vec<String>),
    Structured(JsonValue),
}

impl PropertyValue {
    /// Null, empty string and empty list count as empty
    pub fn is_empty(&self) -> bool {
        match self {
            PropertyValue::Null => true,
            PropertyValue::String(s) => s.is_empty(),
            PropertyValue::List(items) => items.is_empty(),
            PropertyValue::Structured(JsonValue::Array(items)) => items.is_empty(),
            PropertyValue::Structured(JsonValue::Null) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Numeric value of a number or a string that parses as one
    pub fn numeric(&self) -> Option<f64> {
        match self {
            PropertyValue::Number(n) => Some(*n),
            PropertyValue::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        }
    }

    /// Flat text form used inside extension fragments and interchange files
    pub fn to_text(&self) -> String {
        match self {
            PropertyValue::Null => String::new(),
            PropertyValue::String(s) => s.clone(),
            PropertyValue::Number(n) => format_number(*n),
            PropertyValue::Bool(b) => b.to_string(),
            PropertyValue::Date(d) => d.to_rfc3339_opts(SecondsFormat::Millis, true),
            PropertyValue::List(items) => items.join(","),
            PropertyValue::Structured(v) => v.to_string(),
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            PropertyValue::Null => JsonValue::Null,
            PropertyValue::String(s) => JsonValue::String(s.clone()),
            PropertyValue::Number(n) => number_to_json(*n),
            PropertyValue::Bool(b) => JsonValue::Bool(*b),
            PropertyValue::Date(d) => {
                JsonValue::String(d.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
            PropertyValue::List(items) => {
                JsonValue::Array(items.iter().cloned().map(JsonValue::String).collect())
            }
            PropertyValue::Structured(v) => v.clone(),
        }
    }

    /// Name of the value shape, used in diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            PropertyValue::Null => "null",
            PropertyValue::String(_) => "string",
            PropertyValue::Number(_) => "number",
            PropertyValue::Bool(_) => "boolean",
            PropertyValue::Date(_) => "date",
            PropertyValue::List(_) => "list",
            PropertyValue::Structured(_) => "object",
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_text())
    }
}

impl From<JsonValue> for PropertyValue {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => PropertyValue::Null,
            JsonValue::Bool(b) => PropertyValue::Bool(b),
            JsonValue::Number(n) => match n.as_f64() {
                Some(f) => PropertyValue::Number(f),
                None => PropertyValue::Structured(JsonValue::Number(n)),
            },
            JsonValue::String(s) => PropertyValue::String(s),
            JsonValue::Array(items) if items.iter().all(JsonValue::is_string) => {
                PropertyValue::List(
                    items
                        .into_iter()
                        .filter_map(|v| v.as_str().map(String::from))
                        .collect(),
                )
            }
            other => PropertyValue::Structured(other),
        }
    }
}

impl From<PropertyValue> for JsonValue {
    fn from(value: PropertyValue) -> Self {
        value.to_json()
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::String(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::String(s)
    }
}

impl From<f64> for PropertyValue {
    fn from(n: f64) -> Self {
        PropertyValue::Number(n)
    }
}

impl From<i64> for PropertyValue {
    fn from(n: i64) -> Self {
        PropertyValue::Number(n as f64)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        PropertyValue::Bool(b)
    }
}

impl From<DateTime<Utc>> for PropertyValue {
    fn from(d: DateTime<Utc>) -> Self {
        PropertyValue::Date(d)
    }
}

impl From<Vec<String>> for PropertyValue {
    fn from(items: Vec<String>) -> Self {
        PropertyValue::List(items)
    }
}

/// Convert a JSON object into a property bag; non-objects yield an empty bag
pub fn bag_from_json(value: JsonValue) -> PropertyBag {
    match value {
        JsonValue::Object(map) => map
            .into_iter()
            .map(|(k, v)| (k, PropertyValue::from(v)))
            .collect(),
        _ => PropertyBag::new(),
    }
}

pub fn bag_to_json(bag: &PropertyBag) -> JsonValue {
    JsonValue::Object(bag.iter().map(|(k, v)| (k.clone(), v.to_json())).collect())
}

/// Parse the date forms accepted by date and datetime properties
pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(d) = DateTime::parse_from_rfc3339(s) {
        return Some(d.with_timezone(&Utc));
    }
    for fmt in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

fn number_to_json(n: f64) -> JsonValue {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        JsonValue::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_emptiness() {
        assert!(PropertyValue::Null.is_empty());
        assert!(PropertyValue::from("").is_empty());
        assert!(PropertyValue::List(vec![]).is_empty());
        assert!(!PropertyValue::from(0.0).is_empty());
        assert!(!PropertyValue::from(false).is_empty());
        assert!(!PropertyValue::from(" ").is_empty());
    }

    #[test]
    fn test_json_conversion_shapes() {
        assert_eq!(
            PropertyValue::from(json!(["a", "b"])),
            PropertyValue::List(vec!["a".into(), "b".into()])
        );
        assert!(matches!(
            PropertyValue::from(json!([{"event": "start"}])),
            PropertyValue::Structured(_)
        ));
        assert_eq!(PropertyValue::from(json!(3)), PropertyValue::Number(3.0));
    }

    #[test]
    fn test_text_form() {
        assert_eq!(PropertyValue::from(3.0).to_text(), "3");
        assert_eq!(PropertyValue::from(2.5).to_text(), "2.5");
        assert_eq!(PropertyValue::from(true).to_text(), "true");
        assert_eq!(
            PropertyValue::List(vec!["a".into(), "b".into()]).to_text(),
            "a,b"
        );
        let d = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        assert_eq!(PropertyValue::from(d).to_text(), "2024-03-01T09:30:00.000Z");
    }

    #[test]
    fn test_integral_numbers_serialize_without_fraction() {
        assert_eq!(PropertyValue::from(3.0).to_json(), json!(3));
        assert_eq!(PropertyValue::from(0.25).to_json(), json!(0.25));
    }

    #[test]
    fn test_parse_date_forms() {
        assert!(parse_date("2024-03-01").is_some());
        assert!(parse_date("2024-03-01T10:00").is_some());
        assert!(parse_date("2024-03-01T10:00:00Z").is_some());
        assert!(parse_date("2024-03-01T10:00:00.000Z").is_some());
        assert!(parse_date("yesterday").is_none());
        assert!(parse_date("").is_none());
    }

    #[test]
    fn test_bag_json_roundtrip() {
        let mut bag = PropertyBag::new();
        bag.insert("assignee".into(), "alice".into());
        bag.insert("priority".into(), PropertyValue::from(3.0));
        let back = bag_from_json(bag_to_json(&bag));
        assert_eq!(bag, back);
    }
}
