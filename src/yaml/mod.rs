//! YAML document handling

pub mod diagnostics;

pub use diagnostics::{parse_document, parse_validated, YamlError, YamlSyntaxError};
