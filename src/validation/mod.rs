//! Validation engine - rule evaluation and value transformers

pub mod engine;
pub mod rules;
pub mod transform;

pub use engine::{Transformed, ValidationEngine};
pub use rules::{RuleKind, ValidationFailure, ValidationResult, ValidationRule};
pub use transform::{FnTransformer, Transformer, TransformerRegistry};
