use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::types::clean_name;
use crate::{AssetError, AssetResult, AssetsConfig};

/// Locates static sources under a list of local roots. When two roots hold
/// the same relative name, the earlier root wins.
#[derive(Debug, Clone, Default)]
pub struct StaticFinder {
    roots: Vec<PathBuf>,
}

impl StaticFinder {
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_config(config: &AssetsConfig) -> Self {
        Self::new(config.static_dirs.iter().cloned())
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Absolute location of the first file matching `name`
    pub fn find(&self, name: &str) -> Option<PathBuf> {
        let name = clean_name(name);
        let relative = name.trim_start_matches('/');
        self.roots
            .iter()
            .map(|root| root.join(relative))
            .find(|candidate| candidate.is_file())
    }

    /// Every file under the roots keyed by its forward-slash relative name
    pub fn list(&self) -> AssetResult<BTreeMap<String, PathBuf>> {
        let mut files = BTreeMap::new();
        for root in &self.roots {
            if !root.is_dir() {
                tracing::debug!(root = %root.display(), "static root missing, skipped");
                continue;
            }
            for entry in WalkDir::new(root).follow_links(true) {
                let entry = entry.map_err(|e| walk_error(root, e))?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let Ok(relative) = entry.path().strip_prefix(root) else {
                    continue;
                };
                files
                    .entry(relative_name(relative))
                    .or_insert_with(|| entry.path().to_path_buf());
            }
        }
        Ok(files)
    }
}

fn relative_name(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn walk_error(root: &Path, err: walkdir::Error) -> AssetError {
    match err.into_io_error() {
        Some(io) => AssetError::from(io),
        None => AssetError::configuration(format!("filesystem loop under {}", root.display())),
    }
}
