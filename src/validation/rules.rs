//! Declarative validation rules and validation results

use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::core::element::PropertyContext;
use crate::core::value::PropertyValue;
use crate::schema::property::PropertyConfig;

/// Host-supplied check used by [`RuleKind::Custom`]
pub type CustomCheck =
    Arc<dyn Fn(&PropertyValue, &PropertyConfig, &PropertyContext<'_>) -> bool + Send + Sync>;

/// What a rule checks
#[derive(Clone)]
pub enum RuleKind {
    Required,
    MinLength(usize),
    MaxLength(usize),
    Min(f64),
    Max(f64),
    Pattern(String),
    Email,
    Url,
    Custom(CustomCheck),
}

impl RuleKind {
    /// Stable rule type name, as used in interchange data
    pub fn type_name(&self) -> &'static str {
        match self {
            RuleKind::Required => "required",
            RuleKind::MinLength(_) => "minLength",
            RuleKind::MaxLength(_) => "maxLength",
            RuleKind::Min(_) => "min",
            RuleKind::Max(_) => "max",
            RuleKind::Pattern(_) => "pattern",
            RuleKind::Email => "email",
            RuleKind::Url => "url",
            RuleKind::Custom(_) => "custom",
        }
    }
}

impl fmt::Debug for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleKind::Required => write!(f, "Required"),
            RuleKind::MinLength(n) => write!(f, "MinLength({})", n),
            RuleKind::MaxLength(n) => write!(f, "MaxLength({})", n),
            RuleKind::Min(n) => write!(f, "Min({})", n),
            RuleKind::Max(n) => write!(f, "Max({})", n),
            RuleKind::Pattern(p) => write!(f, "Pattern({:?})", p),
            RuleKind::Email => write!(f, "Email"),
            RuleKind::Url => write!(f, "Url"),
            RuleKind::Custom(_) => write!(f, "Custom(<fn>)"),
        }
    }
}

/// A rule plus the message reported when it fails
#[derive(Debug, Clone)]
pub struct ValidationRule {
    pub kind: RuleKind,
    pub message: String,
}

impl ValidationRule {
    pub fn new(kind: RuleKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn required(message: impl Into<String>) -> Self {
        Self::new(RuleKind::Required, message)
    }

    pub fn min_length(n: usize, message: impl Into<String>) -> Self {
        Self::new(RuleKind::MinLength(n), message)
    }

    pub fn max_length(n: usize, message: impl Into<String>) -> Self {
        Self::new(RuleKind::MaxLength(n), message)
    }

    pub fn min(n: f64, message: impl Into<String>) -> Self {
        Self::new(RuleKind::Min(n), message)
    }

    pub fn max(n: f64, message: impl Into<String>) -> Self {
        Self::new(RuleKind::Max(n), message)
    }

    pub fn pattern(pattern: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(RuleKind::Pattern(pattern.into()), message)
    }

    pub fn email(message: impl Into<String>) -> Self {
        Self::new(RuleKind::Email, message)
    }

    pub fn url(message: impl Into<String>) -> Self {
        Self::new(RuleKind::Url, message)
    }

    pub fn custom<F>(check: F, message: impl Into<String>) -> Self
    where
        F: Fn(&PropertyValue, &PropertyConfig, &PropertyContext<'_>) -> bool + Send + Sync + 'static,
    {
        Self::new(RuleKind::Custom(Arc::new(check)), message)
    }
}

/// One failed check
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationFailure {
    pub property: String,
    pub message: String,
    pub value: PropertyValue,
    /// Rule type name (`required`, `min`, `pattern`, ...)
    pub rule: String,
}

/// Outcome of validating one value or a whole bag
///
/// Callers inspect `is_valid`; a failed validation is data, not an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationFailure>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn success() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn from_parts(errors: Vec<ValidationFailure>, warnings: Vec<String>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    /// Append another result's errors and warnings
    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
        self.is_valid = self.errors.is_empty();
    }

    pub fn has_issues(&self) -> bool {
        !self.errors.is_empty() || !self.warnings.is_empty()
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::success()
    }
}
