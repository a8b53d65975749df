//! Command implementations

pub mod catalog;
pub mod category;
pub mod completions;
pub mod init;
pub mod props;
pub mod schema;
pub mod template;
pub mod version;
