use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::types::clean_name;
use crate::{AssetError, AssetResult, AssetsConfig};

/// Format version written to and accepted from manifest files
pub const MANIFEST_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct ManifestDocument {
    version: u32,
    paths: BTreeMap<String, String>,
}

/// Mapping of original static names to their hashed names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    paths: BTreeMap<String, String>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<O: Into<String>, H: Into<String>>(&mut self, original: O, hashed: H) {
        self.paths.insert(original.into(), hashed.into());
    }

    pub fn get(&self, original: &str) -> Option<&str> {
        self.paths.get(original).map(String::as_str)
    }

    /// Original name recorded for `hashed`. When several originals map to it
    /// the first forward-slash key wins.
    pub fn original_for(&self, hashed: &str) -> Option<&str> {
        let mut originals = self
            .paths
            .iter()
            .filter(|(_, v)| v.as_str() == hashed)
            .map(|(k, _)| k.as_str());
        let first = originals.next()?;
        if !first.contains('\\') {
            return Some(first);
        }
        Some(originals.find(|k| !k.contains('\\')).unwrap_or(first))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.paths.keys().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.paths.values().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.paths.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Every original and hashed name
    pub fn names(&self) -> BTreeSet<String> {
        self.paths
            .iter()
            .flat_map(|(k, v)| [k.clone(), v.clone()])
            .collect()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Adds a forward-slash key for every key written with `\`
    fn add_canonical_keys(&mut self) {
        let windows: Vec<(String, String)> = self
            .paths
            .iter()
            .filter(|(k, _)| k.contains('\\'))
            .map(|(k, v)| (clean_name(k), v.clone()))
            .collect();
        for (key, value) in windows {
            self.paths.insert(key, value);
        }
    }
}

impl FromIterator<(String, String)> for Manifest {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        let mut manifest = Manifest::new();
        for (original, hashed) in iter {
            manifest.insert(original, hashed);
        }
        manifest
    }
}

/// Local file holding the [`Manifest`] between collection runs
#[derive(Debug, Clone)]
pub struct ManifestStore {
    path: PathBuf,
}

impl ManifestStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn from_config(config: &AssetsConfig) -> Self {
        Self::new(config.manifest_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn exists(&self) -> AssetResult<bool> {
        Ok(tokio::fs::try_exists(&self.path).await?)
    }

    /// Raw manifest text, `None` when no manifest was written yet
    pub async fn read(&self) -> AssetResult<Option<String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn load(&self) -> AssetResult<Option<Manifest>> {
        let Some(content) = self.read().await? else {
            return Ok(None);
        };
        let document: ManifestDocument = serde_json::from_str(&content).map_err(|e| {
            AssetError::manifest_invalid(format!("{}: {e}", self.path.display()))
        })?;
        if document.version != MANIFEST_VERSION {
            return Err(AssetError::manifest_invalid(format!(
                "{}: unsupported version {}",
                self.path.display(),
                document.version
            )));
        }
        Ok(Some(document.paths.into_iter().collect()))
    }

    /// Replace the stored manifest with `manifest`
    pub async fn save(&self, manifest: &Manifest) -> AssetResult<()> {
        let mut manifest = manifest.clone();
        manifest.add_canonical_keys();
        let document = ManifestDocument {
            version: MANIFEST_VERSION,
            paths: manifest.paths,
        };
        let contents = serde_json::to_vec(&document)?;

        if self.exists().await? {
            tokio::fs::remove_file(&self.path).await?;
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, contents).await?;
        tracing::info!(path = %self.path.display(), entries = document.paths.len(), "manifest saved");
        Ok(())
    }
}
