//! Workspace discovery and layout

use miette::Diagnostic;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the directory that marks a workspace root
pub const WORKSPACE_DIR: &str = ".ntk";

/// A directory tree managed by ntk
#[derive(Debug, Clone)]
pub struct Workspace {
    /// Parent of `.ntk/`
    root: PathBuf,
}

impl Workspace {
    /// Find the workspace by walking up from the current directory
    pub fn discover() -> Result<Self, WorkspaceError> {
        let current = std::env::current_dir().map_err(|e| WorkspaceError::Io(e.to_string()))?;
        Self::discover_from(&current)
    }

    /// Find the workspace by walking up from the given directory
    pub fn discover_from(start: &Path) -> Result<Self, WorkspaceError> {
        let mut current = start
            .canonicalize()
            .map_err(|e| WorkspaceError::Io(e.to_string()))?;

        loop {
            if current.join(WORKSPACE_DIR).is_dir() {
                return Ok(Self { root: current });
            }
            if !current.pop() {
                return Err(WorkspaceError::NotFound {
                    searched_from: start.to_path_buf(),
                });
            }
        }
    }

    /// Create `.ntk/` with a default config; `force` rewrites the config of an
    /// existing workspace
    pub fn init(path: &Path, force: bool) -> Result<Self, WorkspaceError> {
        let root = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        let dir = root.join(WORKSPACE_DIR);
        if dir.exists() && !force {
            return Err(WorkspaceError::AlreadyExists(root));
        }

        std::fs::create_dir_all(dir.join("templates")).map_err(|e| WorkspaceError::Io(e.to_string()))?;
        std::fs::write(dir.join("config.yaml"), Self::default_config())
            .map_err(|e| WorkspaceError::Io(e.to_string()))?;

        Ok(Self { root })
    }

    fn default_config() -> &'static str {
        r#"# ntk workspace configuration

# Author stamped on new templates and versions (default: git user.name)
# author: ""

# Template store backend: sqlite or memory
store: sqlite

# Namespace prefix for extension fragments (zeebe or camunda)
namespace: zeebe

# Default interchange format for `ntk props export` (json, xml, yaml, csv)
# default_format: json
"#
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The `.ntk/` directory
    pub fn ntk_dir(&self) -> PathBuf {
        self.root.join(WORKSPACE_DIR)
    }

    pub fn config_path(&self) -> PathBuf {
        self.ntk_dir().join("config.yaml")
    }

    /// SQLite file backing the template store
    pub fn store_path(&self) -> PathBuf {
        self.ntk_dir().join("store.db")
    }

    /// Directory scanned for template YAML files
    pub fn templates_dir(&self) -> PathBuf {
        self.ntk_dir().join("templates")
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum WorkspaceError {
    #[error("not an ntk workspace (searched from {searched_from:?})")]
    #[diagnostic(code(ntk::workspace::not_found), help("run 'ntk init' to create one"))]
    NotFound { searched_from: PathBuf },

    #[error("ntk workspace already exists at {0:?}")]
    #[diagnostic(code(ntk::workspace::exists), help("use --force to rewrite its config"))]
    AlreadyExists(PathBuf),

    #[error("IO error: {0}")]
    #[diagnostic(code(ntk::workspace::io))]
    Io(String),
}
