//! NTK: Node Template Kit
//!
//! Reusable node templates for BPMN diagrams, with schema-driven element
//! properties, validation, transformation and extension serialization.

pub mod cli;
pub mod core;
pub mod schema;
pub mod serialize;
pub mod template;
pub mod toolkit;
pub mod validation;
pub mod yaml;

pub use toolkit::Toolkit;
