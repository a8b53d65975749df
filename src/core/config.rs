//! Configuration management with layered hierarchy

use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::core::Workspace;

/// Which key-value store backs the template store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    Memory,
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreBackend::Sqlite => write!(f, "sqlite"),
            StoreBackend::Memory => write!(f, "memory"),
        }
    }
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" => Ok(StoreBackend::Sqlite),
            "memory" => Ok(StoreBackend::Memory),
            _ => Err(format!("Unknown store backend: {}", s)),
        }
    }
}

/// ntk configuration with layered hierarchy
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Author stamped on new templates and versions
    pub author: Option<String>,

    pub store: Option<StoreBackend>,

    /// Extension namespace prefix (`zeebe`, `camunda`)
    pub namespace: Option<String>,

    /// Default interchange format for exports
    pub default_format: Option<String>,
}

impl Config {
    /// Load configuration from all sources, merging in priority order
    pub fn load() -> Self {
        let workspace = Workspace::discover().ok();
        Self::load_for(workspace.as_ref())
    }

    /// Same as [`Config::load`] with an explicit workspace
    pub fn load_for(workspace: Option<&Workspace>) -> Self {
        let mut config = Config::default();

        // global user config (~/.config/ntk/config.yaml)
        if let Some(global_path) = Self::global_config_path() {
            if let Some(global) = Self::read_file(&global_path) {
                config.merge(global);
            }
        }

        // workspace config (.ntk/config.yaml)
        if let Some(ws) = workspace {
            if let Some(local) = Self::read_file(&ws.config_path()) {
                config.merge(local);
            }
        }

        if let Ok(author) = std::env::var("NTK_AUTHOR") {
            config.author = Some(author);
        }
        if let Ok(store) = std::env::var("NTK_STORE") {
            match store.parse() {
                Ok(backend) => config.store = Some(backend),
                Err(e) => tracing::warn!("ignoring NTK_STORE: {}", e),
            }
        }

        config
    }

    fn read_file(path: &std::path::Path) -> Option<Config> {
        if !path.exists() {
            return None;
        }
        let contents = std::fs::read_to_string(path).ok()?;
        match serde_yml::from_str::<Config>(&contents) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!(path = %path.display(), "ignoring unreadable config: {}", e);
                None
            }
        }
    }

    fn global_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "ntk").map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Merge another config into this one (other takes precedence)
    fn merge(&mut self, other: Config) {
        if other.author.is_some() {
            self.author = other.author;
        }
        if other.store.is_some() {
            self.store = other.store;
        }
        if other.namespace.is_some() {
            self.namespace = other.namespace;
        }
        if other.default_format.is_some() {
            self.default_format = other.default_format;
        }
    }

    /// Get the author name, falling back to git config or username
    pub fn author(&self) -> String {
        if let Some(ref author) = self.author {
            return author.clone();
        }

        if let Ok(output) = std::process::Command::new("git")
            .args(["config", "user.name"])
            .output()
        {
            if output.status.success() {
                let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !name.is_empty() {
                    return name;
                }
            }
        }

        std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "unknown".to_string())
    }

    pub fn store_backend(&self) -> StoreBackend {
        self.store.unwrap_or_default()
    }

    pub fn namespace(&self) -> &str {
        self.namespace.as_deref().unwrap_or("zeebe")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_prefers_later_layer() {
        let mut base: Config = serde_yml::from_str("author: alice\nnamespace: camunda\n").unwrap();
        let local: Config = serde_yml::from_str("author: bob\nstore: memory\n").unwrap();
        base.merge(local);
        assert_eq!(base.author.as_deref(), Some("bob"));
        assert_eq!(base.namespace(), "camunda");
        assert_eq!(base.store_backend(), StoreBackend::Memory);
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.namespace(), "zeebe");
        assert_eq!(config.store_backend(), StoreBackend::Sqlite);
    }
}
