//! Interchange formats for property bags
//!
//! JSON keeps structured values intact. XML, YAML and CSV flatten every value
//! to text and restore types on import from the declared property configs.

use chrono::{SecondsFormat, Utc};
use miette::Diagnostic;
use regex::Regex;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

use crate::core::value::{bag_from_json, bag_to_json, PropertyBag, PropertyValue};
use crate::schema::property::{PropertyConfig, PropertyType};
use crate::serialize::codec::{find_config, restore_value};
use crate::serialize::escape::{xml_escape, xml_unescape, yaml_key, yaml_quote};

pub const EXPORT_VERSION: &str = "1.0";

#[derive(Debug, Error, Diagnostic)]
pub enum SerializationError {
    #[error("Unsupported format: {0}")]
    #[diagnostic(
        code(ntk::serialize::unsupported_format),
        help("Supported formats are json, xml, yaml and csv")
    )]
    UnsupportedFormat(String),

    #[error("Malformed {format} input: {message}")]
    #[diagnostic(code(ntk::serialize::malformed))]
    Malformed { format: ExportFormat, message: String },
}

impl SerializationError {
    fn malformed(format: ExportFormat, message: impl fmt::Display) -> Self {
        SerializationError::Malformed {
            format,
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Json,
    Xml,
    Yaml,
    Csv,
}

impl ExportFormat {
    pub fn all() -> &'static [ExportFormat] {
        &[
            ExportFormat::Json,
            ExportFormat::Xml,
            ExportFormat::Yaml,
            ExportFormat::Csv,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Xml => "xml",
            ExportFormat::Yaml => "yaml",
            ExportFormat::Csv => "csv",
        }
    }

    /// Guess the format from a file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "yml" => Some(ExportFormat::Yaml),
            other => other.parse().ok(),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = SerializationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ExportFormat::all()
            .iter()
            .copied()
            .find(|f| f.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| SerializationError::UnsupportedFormat(s.to_string()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    pub include_metadata: bool,
}

impl ExportOptions {
    pub fn with_metadata() -> Self {
        Self {
            include_metadata: true,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonExport<'a> {
    properties: JsonValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<JsonMetadata<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonMetadata<'a> {
    export_time: String,
    version: &'static str,
    configs: Vec<ConfigSummary<'a>>,
}

#[derive(Serialize)]
struct ConfigSummary<'a> {
    key: &'a str,
    label: &'a str,
    #[serde(rename = "type")]
    property_type: PropertyType,
    required: bool,
}

fn export_time() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Render a property bag in the chosen format
pub fn export_properties(
    properties: &PropertyBag,
    configs: &[PropertyConfig],
    format: ExportFormat,
    options: &ExportOptions,
) -> Result<String, SerializationError> {
    match format {
        ExportFormat::Json => export_json(properties, configs, options),
        ExportFormat::Xml => Ok(export_xml(properties, options)),
        ExportFormat::Yaml => Ok(export_yaml(properties, options)),
        ExportFormat::Csv => export_csv(properties, configs),
    }
}

/// Parse interchange text back into a property bag
pub fn import_properties(
    data: &str,
    format: ExportFormat,
    configs: &[PropertyConfig],
) -> Result<PropertyBag, SerializationError> {
    match format {
        ExportFormat::Json => import_json(data, configs),
        ExportFormat::Xml => import_xml(data, configs),
        ExportFormat::Yaml => import_yaml(data, configs),
        ExportFormat::Csv => import_csv(data, configs),
    }
}

fn export_json(
    properties: &PropertyBag,
    configs: &[PropertyConfig],
    options: &ExportOptions,
) -> Result<String, SerializationError> {
    let metadata = options.include_metadata.then(|| JsonMetadata {
        export_time: export_time(),
        version: EXPORT_VERSION,
        configs: configs
            .iter()
            .map(|c| ConfigSummary {
                key: &c.key,
                label: &c.label,
                property_type: c.property_type,
                required: c.is_required(),
            })
            .collect(),
    });
    let export = JsonExport {
        properties: bag_to_json(properties),
        metadata,
    };
    serde_json::to_string_pretty(&export).map_err(|e| SerializationError::malformed(ExportFormat::Json, e))
}

fn import_json(data: &str, configs: &[PropertyConfig]) -> Result<PropertyBag, SerializationError> {
    let parsed: JsonValue =
        serde_json::from_str(data).map_err(|e| SerializationError::malformed(ExportFormat::Json, e))?;
    let body = match parsed {
        JsonValue::Object(mut map) => match map.remove("properties") {
            Some(props @ JsonValue::Object(_)) => props,
            Some(other) => {
                map.insert("properties".to_string(), other);
                JsonValue::Object(map)
            }
            None => JsonValue::Object(map),
        },
        other => {
            return Err(SerializationError::malformed(
                ExportFormat::Json,
                format!("expected an object, found {}", json_kind(&other)),
            ))
        }
    };

    // dates have no JSON form of their own
    let mut bag = bag_from_json(body);
    for (key, value) in bag.iter_mut() {
        let Some(config) = find_config(configs, key) else {
            continue;
        };
        if let (PropertyType::Date | PropertyType::Datetime, PropertyValue::String(text)) =
            (config.property_type, &*value)
        {
            *value = restore_value(text, Some(config));
        }
    }
    Ok(bag)
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

fn export_xml(properties: &PropertyBag, options: &ExportOptions) -> String {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<properties>\n");
    if options.include_metadata {
        xml.push_str("  <metadata>\n");
        xml.push_str(&format!("    <exportTime>{}</exportTime>\n", export_time()));
        xml.push_str(&format!("    <version>{}</version>\n", EXPORT_VERSION));
        xml.push_str("  </metadata>\n");
    }
    xml.push_str("  <data>\n");
    for (key, value) in properties {
        xml.push_str(&format!(
            "    <property key=\"{}\">{}</property>\n",
            xml_escape(key),
            xml_escape(&value.to_text())
        ));
    }
    xml.push_str("  </data>\n</properties>");
    xml
}

const PROPERTY_PATTERN: &str = r#"<property key="([^"]*)">([^<]*)</property>"#;

fn property_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(PROPERTY_PATTERN).expect("valid property pattern"))
}

fn import_xml(data: &str, configs: &[PropertyConfig]) -> Result<PropertyBag, SerializationError> {
    if !data.contains("<properties") {
        return Err(SerializationError::malformed(
            ExportFormat::Xml,
            "missing <properties> root element",
        ));
    }
    let mut bag = PropertyBag::new();
    for caps in property_pattern().captures_iter(data) {
        let key = xml_unescape(&caps[1]);
        let text = xml_unescape(&caps[2]);
        let value = restore_value(&text, find_config(configs, &key));
        bag.insert(key, value);
    }
    Ok(bag)
}

fn export_yaml(properties: &PropertyBag, options: &ExportOptions) -> String {
    let mut yaml = String::new();
    if options.include_metadata {
        yaml.push_str("metadata:\n");
        yaml.push_str(&format!("  exportTime: {}\n", export_time()));
        yaml.push_str(&format!("  version: \"{}\"\n", EXPORT_VERSION));
        yaml.push('\n');
    }
    if properties.is_empty() {
        yaml.push_str("properties: {}\n");
        return yaml;
    }
    yaml.push_str("properties:\n");
    for (key, value) in properties {
        yaml.push_str(&format!("  {}: {}\n", yaml_key(key), yaml_quote(&value.to_text())));
    }
    yaml
}

fn import_yaml(data: &str, configs: &[PropertyConfig]) -> Result<PropertyBag, SerializationError> {
    let doc: serde_yml::Value =
        serde_yml::from_str(data).map_err(|e| SerializationError::malformed(ExportFormat::Yaml, e))?;
    let properties = match doc.get("properties") {
        Some(serde_yml::Value::Mapping(map)) => map,
        Some(serde_yml::Value::Null) => return Ok(PropertyBag::new()),
        Some(_) => {
            return Err(SerializationError::malformed(
                ExportFormat::Yaml,
                "`properties` must be a mapping",
            ))
        }
        None => {
            return Err(SerializationError::malformed(
                ExportFormat::Yaml,
                "missing `properties` block",
            ))
        }
    };

    let mut bag = PropertyBag::new();
    for (key, value) in properties {
        let key = yaml_key_text(key).ok_or_else(|| {
            SerializationError::malformed(ExportFormat::Yaml, "property keys must be scalars")
        })?;
        let text = yaml_scalar_text(value).ok_or_else(|| {
            SerializationError::malformed(ExportFormat::Yaml, format!("value of '{}' is not a scalar", key))
        })?;
        let restored = restore_value(&text, find_config(configs, &key));
        bag.insert(key, restored);
    }
    Ok(bag)
}

/// Hand-written files may carry unquoted keys the parser re-typed
fn yaml_key_text(key: &serde_yml::Value) -> Option<String> {
    match key {
        serde_yml::Value::Null => Some("null".to_string()),
        other => yaml_scalar_text(other),
    }
}

fn yaml_scalar_text(value: &serde_yml::Value) -> Option<String> {
    match value {
        serde_yml::Value::String(s) => Some(s.clone()),
        serde_yml::Value::Number(n) => Some(n.to_string()),
        serde_yml::Value::Bool(b) => Some(b.to_string()),
        serde_yml::Value::Null => Some(String::new()),
        _ => None,
    }
}

pub const CSV_HEADER: &str = "key,value,type,label";

fn export_csv(properties: &PropertyBag, configs: &[PropertyConfig]) -> Result<String, SerializationError> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    for (key, value) in properties {
        let config = find_config(configs, key);
        let kind = config.map(|c| c.property_type.as_str()).unwrap_or_default();
        let label = config.map(|c| c.label.as_str()).unwrap_or_default();
        let text = value.to_text();
        writer
            .write_record([key.as_str(), text.as_str(), kind, label])
            .map_err(|e| SerializationError::malformed(ExportFormat::Csv, e))?;
    }

    let body = writer
        .into_inner()
        .map_err(|e| SerializationError::malformed(ExportFormat::Csv, e))?;
    let body = String::from_utf8(body).map_err(|e| SerializationError::malformed(ExportFormat::Csv, e))?;
    Ok(format!("{}\n{}", CSV_HEADER, body))
}

fn import_csv(data: &str, configs: &[PropertyConfig]) -> Result<PropertyBag, SerializationError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(data.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| SerializationError::malformed(ExportFormat::Csv, e))?;
    if headers.get(0) != Some("key") || headers.get(1) != Some("value") {
        return Err(SerializationError::malformed(
            ExportFormat::Csv,
            format!("expected header '{}'", CSV_HEADER),
        ));
    }

    let mut bag = PropertyBag::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|e| SerializationError::malformed(ExportFormat::Csv, e))?;
        let (Some(key), Some(text)) = (record.get(0), record.get(1)) else {
            return Err(SerializationError::malformed(
                ExportFormat::Csv,
                format!("row {} needs a key and a value", line + 2),
            ));
        };
        if key.is_empty() {
            continue;
        }
        bag.insert(key.to_string(), restore_value(text, find_config(configs, key)));
    }
    Ok(bag)
}
