use std::collections::BTreeMap;
use std::fs::File;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::css::{is_stylesheet, rewrite_urls};
use crate::finder::StaticFinder;
use crate::fingerprint::{self, fingerprint_reader, split_url_suffix};
use crate::manifest::{Manifest, ManifestStore};
use crate::static_files::StaticStorage;
use crate::types::clean_name;
use crate::{AssetError, AssetResult};

#[derive(Debug, Clone, Copy, Default)]
pub struct PostProcessOptions {
    /// Save every hashed file without probing for it first
    pub skip_existence_check: bool,
    /// Compute hashed names only
    pub dry_run: bool,
}

/// One file handled by [`HashedStaticStorage::post_process`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostProcessed {
    pub original: String,
    pub hashed: String,
    pub uploaded: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CollectOptions {
    /// Also store every source under its unhashed name
    pub upload_unhashed: bool,
    pub dry_run: bool,
}

/// What a collection run did
#[derive(Debug, Clone, Default)]
pub struct CollectReport {
    /// Sources stored under their unhashed names
    pub copied: Vec<String>,
    pub post_processed: Vec<PostProcessed>,
    pub dry_run: bool,
}

impl CollectReport {
    /// Number of hashed files that actually had to be uploaded
    pub fn uploaded(&self) -> usize {
        self.post_processed.iter().filter(|p| p.uploaded).count()
    }

    pub fn summary(&self) -> String {
        let noun = if self.copied.len() == 1 { "file" } else { "files" };
        format!(
            "{} static {noun} copied, {} post-processed.",
            self.copied.len(),
            self.post_processed.len()
        )
    }
}

/// Static storage that stores every file under a content-hashed name and
/// records the mapping in a local manifest.
pub struct HashedStaticStorage {
    storage: StaticStorage,
    manifest_store: ManifestStore,
    finder: Option<StaticFinder>,
    hashed_files: Mutex<Option<Manifest>>,
}

impl HashedStaticStorage {
    pub fn new(storage: StaticStorage, manifest_store: ManifestStore) -> Self {
        Self {
            storage,
            manifest_store,
            finder: None,
            hashed_files: Mutex::new(None),
        }
    }

    /// Storage, manifest location and local finder taken from the storage's configuration
    pub fn from_storage(storage: StaticStorage) -> Self {
        let config = storage.config().current();
        let manifest_store = ManifestStore::from_config(&config);
        let finder = StaticFinder::from_config(&config);
        Self::new(storage, manifest_store).with_finder(finder)
    }

    pub fn with_finder(mut self, finder: StaticFinder) -> Self {
        self.finder = Some(finder);
        self
    }

    pub fn storage(&self) -> &StaticStorage {
        &self.storage
    }

    pub fn manifest_store(&self) -> &ManifestStore {
        &self.manifest_store
    }

    /// Hashed name of `name`. Without `content` the local source is located
    /// through the finder and fingerprinted.
    pub fn hashed_name(&self, name: &str, content: Option<&[u8]>) -> AssetResult<String> {
        if let Some(content) = content {
            return Ok(fingerprint::hashed_name(name, content));
        }

        let decoded = urlencoding::decode(name)
            .map(|d| d.into_owned())
            .unwrap_or_else(|_| name.to_string());
        let (path, _) = split_url_suffix(&decoded);
        let cleaned = clean_name(path.trim());

        let location = self
            .finder
            .as_ref()
            .and_then(|finder| finder.find(&cleaned))
            .ok_or_else(|| AssetError::not_found(cleaned.clone()))?;
        let digest = {
            let mut file = File::open(&location).map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => AssetError::not_found(cleaned.clone()),
                _ => AssetError::from(e),
            })?;
            fingerprint_reader(&mut file)?
        };
        Ok(fingerprint::hashed_name_with(name, &digest))
    }

    /// Store each file under its hashed name and record it in the in-memory
    /// manifest. Stylesheets go last so their `url()` references can be
    /// rewritten to the hashed names of the other files.
    pub async fn post_process(
        &self,
        files: &[(String, Bytes)],
        options: PostProcessOptions,
    ) -> AssetResult<Vec<PostProcessed>> {
        let static_url = self.storage.config().current().static_url.clone();
        let (stylesheets, others): (Vec<_>, Vec<_>) =
            files.iter().partition(|(name, _)| is_stylesheet(name));

        let mut hashed_names = BTreeMap::new();
        let mut processed = Vec::with_capacity(files.len());
        for (name, content) in others {
            let name = clean_name(name);
            processed.push(self.process_one(name, content.clone(), options, &mut hashed_names).await?);
        }
        for (name, content) in stylesheets {
            let name = clean_name(name);
            let content = match std::str::from_utf8(content) {
                Ok(text) => {
                    let rewritten = rewrite_urls(&name, text, &static_url, |target| {
                        hashed_names.get(target).cloned().or_else(|| self.recorded_hashed(target))
                    })?;
                    Bytes::from(rewritten)
                }
                Err(_) => content.clone(),
            };
            processed.push(self.process_one(name, content, options, &mut hashed_names).await?);
        }
        Ok(processed)
    }

    async fn process_one(
        &self,
        name: String,
        content: Bytes,
        options: PostProcessOptions,
        hashed_names: &mut BTreeMap<String, String>,
    ) -> AssetResult<PostProcessed> {
        let hashed = self.hashed_name(&name, Some(content.as_ref()))?;
        let mut uploaded = false;

        if !options.dry_run {
            let present = !options.skip_existence_check && self.storage.exists(&hashed).await?;
            if !present {
                uploaded = self.storage.save_with_outcome(&hashed, content).await?.uploaded;
            }
            self.hashed_files
                .lock()
                .get_or_insert_with(Manifest::new)
                .insert(name.clone(), hashed.clone());
        }
        hashed_names.insert(name.clone(), hashed.clone());

        tracing::debug!(original = %name, hashed = %hashed, uploaded, "post-processed");
        Ok(PostProcessed {
            original: name,
            hashed,
            uploaded,
        })
    }

    fn recorded_hashed(&self, name: &str) -> Option<String> {
        self.hashed_files
            .lock()
            .as_ref()
            .and_then(|manifest| manifest.get(name).map(String::from))
    }

    /// Persist the in-memory manifest
    pub async fn save_manifest(&self) -> AssetResult<()> {
        let manifest = self.hashed_files.lock().clone().unwrap_or_default();
        self.manifest_store.save(&manifest).await
    }

    /// Collect every local source: optionally store the unhashed copies, then
    /// store the hashed ones and replace the manifest.
    pub async fn collect(&self, options: CollectOptions) -> AssetResult<CollectReport> {
        let finder = self
            .finder
            .as_ref()
            .ok_or_else(|| AssetError::configuration("no static source directories configured"))?;

        let mut files = Vec::new();
        for (name, location) in finder.list()? {
            let content = tokio::fs::read(&location).await?;
            files.push((name, Bytes::from(content)));
        }
        tracing::info!(sources = files.len(), dry_run = options.dry_run, "collecting static files");

        let mut report = CollectReport {
            dry_run: options.dry_run,
            ..CollectReport::default()
        };
        if options.upload_unhashed {
            for (name, content) in &files {
                if !options.dry_run {
                    self.storage.save(name, content.clone()).await?;
                }
                report.copied.push(name.clone());
            }
        }

        if !options.dry_run {
            *self.hashed_files.lock() = Some(Manifest::new());
        }
        report.post_processed = self
            .post_process(
                &files,
                PostProcessOptions {
                    skip_existence_check: true,
                    dry_run: options.dry_run,
                },
            )
            .await?;

        if !options.dry_run {
            self.save_manifest().await?;
        }
        tracing::info!(uploaded = report.uploaded(), "{}", report.summary());
        Ok(report)
    }

    /// Raw manifest text, `None` when collection never ran
    pub async fn read_manifest(&self) -> AssetResult<Option<String>> {
        self.manifest_store.read().await
    }

    pub async fn load_manifest(&self) -> AssetResult<Option<Manifest>> {
        self.manifest_store.load().await
    }

    /// The manifest in use, loaded from disk on first access
    pub async fn manifest(&self) -> AssetResult<Manifest> {
        let cached = self.hashed_files.lock().clone();
        if let Some(manifest) = cached {
            return Ok(manifest);
        }
        let loaded = self.manifest_store.load().await?.unwrap_or_default();
        Ok(self.hashed_files.lock().get_or_insert(loaded).clone())
    }

    /// Prefixed hashed name recorded for `name`
    pub async fn stored_name(&self, name: &str) -> AssetResult<String> {
        let cleaned = clean_name(name);
        let manifest = self.manifest().await?;
        let hashed = manifest
            .get(&cleaned)
            .ok_or_else(|| AssetError::not_found(cleaned.clone()))?;
        Ok(self.storage.stored_name(hashed))
    }

    pub async fn url(&self, name: &str) -> AssetResult<String> {
        if self.storage.config().current().debug {
            return Ok(self.storage.url(name));
        }
        let cleaned = clean_name(name);
        let manifest = self.manifest().await?;
        let hashed = manifest
            .get(&cleaned)
            .ok_or_else(|| AssetError::not_found(cleaned.clone()))?;
        Ok(self.storage.url(hashed))
    }
}
