//! File diff produced by the scanner collaborator.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Classifies every file relative to the previous scan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanDiff {
    pub added: Vec<PathBuf>,
    pub modified: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
    pub unchanged: Vec<PathBuf>,
    /// Scanner-side problems; carried through for reporting only.
    #[serde(default)]
    pub errors: Vec<String>,
}

impl ScanDiff {
    /// Returns true if nothing was added, modified, or removed.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }

    /// Number of files that need work.
    pub fn changed_count(&self) -> usize {
        self.added.len() + self.modified.len() + self.removed.len()
    }

    pub fn added_keys(&self) -> Vec<String> {
        self.added.iter().map(|p| path_key(p)).collect()
    }

    pub fn modified_keys(&self) -> Vec<String> {
        self.modified.iter().map(|p| path_key(p)).collect()
    }

    pub fn removed_keys(&self) -> Vec<String> {
        self.removed.iter().map(|p| path_key(p)).collect()
    }
}

/// Normalize a path into the `/`-separated key used throughout the graph.
pub fn path_key(path: &Path) -> String {
    normalize_path_str(&path.to_string_lossy())
}

/// Normalize separators, strip a leading `./`, and collapse `//`.
pub fn normalize_path_str(path: &str) -> String {
    let mut result = path.replace('\\', "/");
    while result.contains("//") {
        result = result.replace("//", "/");
    }
    while let Some(stripped) = result.strip_prefix("./") {
        result = stripped.to_string();
    }
    if result.len() > 1 && result.ends_with('/') {
        result.pop();
    }
    result
}
