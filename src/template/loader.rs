//! Loading template drafts from YAML files on disk

use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::template::model::TemplateDraft;
use crate::yaml::diagnostics::{parse_document, YamlError};

#[derive(Debug)]
pub struct LoadedDraft {
    pub path: PathBuf,
    pub draft: TemplateDraft,
}

#[derive(Debug, Default)]
pub struct LoadReport {
    pub drafts: Vec<LoadedDraft>,
    pub failures: Vec<(PathBuf, YamlError)>,
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"))
}

/// Parse one template file
pub fn load_draft(path: &Path) -> Result<TemplateDraft, YamlError> {
    let content = fs::read_to_string(path).map_err(|source| YamlError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(parse_document(&content, &filename)?)
}

/// Load every `.yaml`/`.yml` file under `root`, in path order
///
/// A missing directory yields an empty report. Files that fail to parse are
/// collected in `failures` and do not stop the walk.
pub fn load_dir(root: &Path) -> LoadReport {
    let mut report = LoadReport::default();
    if !root.exists() {
        return report;
    }

    for entry in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !entry.file_type().is_file() || !is_yaml(path) {
            continue;
        }
        match load_draft(path) {
            Ok(draft) => report.drafts.push(LoadedDraft {
                path: path.to_path_buf(),
                draft,
            }),
            Err(e) => {
                tracing::warn!(path = %path.display(), "skipping template file: {}", e);
                report.failures.push((path.to_path_buf(), e));
            }
        }
    }
    report
}
