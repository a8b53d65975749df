//! YAML parse and pack-schema diagnostics with source spans

use miette::{Diagnostic, NamedSource, SourceSpan};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;

/// YAML syntax or shape error pointing into the offending document
#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
#[diagnostic(code(ntk::yaml::syntax))]
pub struct YamlSyntaxError {
    #[source_code]
    src: NamedSource<String>,

    #[label("here")]
    span: SourceSpan,

    #[help]
    help: Option<String>,

    message: String,
}

impl YamlSyntaxError {
    pub fn from_serde_error(err: &serde_yml::Error, source: &str, filename: &str) -> Self {
        let (line, column) = err
            .location()
            .map(|loc| (loc.line(), loc.column()))
            .unwrap_or((1, 1));
        let message = err.to_string();
        let help = generate_help(&message);
        Self::at_location(message, source, filename, line, column, help)
    }

    pub fn at_location(
        message: impl Into<String>,
        source: &str,
        filename: &str,
        line: usize,
        column: usize,
        help: Option<String>,
    ) -> Self {
        let offset = line_col_to_offset(source, line, column);
        Self {
            src: NamedSource::new(filename, source.to_string()),
            span: SourceSpan::from(offset..offset.saturating_add(1)),
            help,
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A document that parsed but failed its JSON schema
#[derive(Debug, Error, Diagnostic)]
#[error("{filename}: {} schema violation(s)", violations.len())]
#[diagnostic(code(ntk::yaml::schema))]
pub struct SchemaViolations {
    pub filename: String,

    #[related]
    pub violations: Vec<SchemaViolation>,
}

#[derive(Debug, Error, Diagnostic)]
#[error("{path}: {message}")]
pub struct SchemaViolation {
    pub path: String,
    pub message: String,
}

#[derive(Debug, Error, Diagnostic)]
pub enum YamlError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Syntax(#[from] YamlSyntaxError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Schema(#[from] SchemaViolations),

    #[error("could not read {path}: {source}")]
    #[diagnostic(code(ntk::yaml::io))]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Deserialize `source`, mapping failures to a spanned diagnostic
pub fn parse_document<T: DeserializeOwned>(source: &str, filename: &str) -> Result<T, YamlSyntaxError> {
    serde_yml::from_str(source).map_err(|e| YamlSyntaxError::from_serde_error(&e, source, filename))
}

/// Parse `source` and check it against `validator` before deserializing
pub fn parse_validated<T: DeserializeOwned>(
    source: &str,
    filename: &str,
    validator: &jsonschema::Validator,
) -> Result<T, YamlError> {
    let document: JsonValue = parse_document(source, filename)?;
    let violations: Vec<SchemaViolation> = validator
        .iter_errors(&document)
        .map(|e| SchemaViolation {
            path: display_path(&e.instance_path.to_string()),
            message: e.to_string(),
        })
        .collect();
    if !violations.is_empty() {
        return Err(SchemaViolations {
            filename: filename.to_string(),
            violations,
        }
        .into());
    }
    serde_json::from_value(document).map_err(|e| {
        YamlError::Syntax(YamlSyntaxError::at_location(e.to_string(), source, filename, 1, 1, None))
    })
}

fn display_path(pointer: &str) -> String {
    if pointer.is_empty() {
        "document root".to_string()
    } else {
        pointer.to_string()
    }
}

fn line_col_to_offset(source: &str, line: usize, column: usize) -> usize {
    let line_start = if line <= 1 {
        0
    } else {
        match source.match_indices('\n').nth(line - 2) {
            Some((i, _)) => i + 1,
            None => return source.len(),
        }
    };
    let rest = &source[line_start..];
    let line_len = rest.find('\n').unwrap_or(rest.len());
    let byte_col = rest[..line_len]
        .char_indices()
        .nth(column.saturating_sub(1))
        .map(|(i, _)| i)
        .unwrap_or(line_len);
    line_start + byte_col
}

fn generate_help(message: &str) -> Option<String> {
    let msg = message.to_lowercase();

    if msg.contains("tab") {
        return Some("YAML indentation must use spaces, not tabs".to_string());
    }
    if msg.contains("duplicate") {
        return Some("Each key may appear once per mapping".to_string());
    }
    if msg.contains("missing field") {
        return Some("Templates need at least `name` and `nodeType`".to_string());
    }
    if msg.contains("unknown variant") {
        return Some("Check the spelling of enum values such as field `type` or `shape`".to_string());
    }
    if msg.contains("mapping values are not allowed") || msg.contains("unexpected ':'") {
        return Some("Quote values that contain ':'".to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Doc {
        name: String,
    }

    #[test]
    fn test_line_col_to_offset() {
        let source = "line1\nline2\nline3";
        assert_eq!(line_col_to_offset(source, 1, 1), 0);
        assert_eq!(line_col_to_offset(source, 2, 1), 6);
        assert_eq!(line_col_to_offset(source, 3, 3), 14);
        assert_eq!(line_col_to_offset(source, 9, 1), source.len());
    }

    #[test]
    fn test_parse_document() {
        let doc: Doc = parse_document("name: Approval\n", "a.yaml").unwrap();
        assert_eq!(doc.name, "Approval");

        let err = parse_document::<Doc>("title: x\n", "a.yaml").unwrap_err();
        assert!(err.message().contains("name"));
        assert!(err.help.is_some());
    }

    #[test]
    fn test_parse_validated_reports_violations() {
        let schema = serde_json::json!({
            "type": "object",
            "required": ["name"],
            "properties": { "name": { "type": "string", "minLength": 1 } }
        });
        let validator = jsonschema::validator_for(&schema).unwrap();

        let doc: Doc = parse_validated("name: ok\n", "a.yaml", &validator).unwrap();
        assert_eq!(doc.name, "ok");

        match parse_validated::<Doc>("name: ''\n", "a.yaml", &validator) {
            Err(YamlError::Schema(e)) => {
                assert_eq!(e.violations.len(), 1);
                assert_eq!(e.violations[0].path, "/name");
            }
            other => panic!("expected schema error, got {:?}", other),
        }
    }
}
