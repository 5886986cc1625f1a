use std::collections::BTreeSet;
use std::sync::Arc;

use bytes::Bytes;

use crate::index::RemoteIndex;
use crate::remote::{DestroyResult, RemoteApi, UploadRequest};
use crate::types::{directory_path, normalise_name, prepend_prefix};
use crate::validators::validate_video;
use crate::{Asset, AssetError, AssetResult, ConfigHandle, ResourceKind};

/// Media storage for one resource kind.
///
/// Names are stored under the configured `prefix` and every upload carries the
/// storage's tag, which is what orphan cleanup later enumerates by.
#[derive(Clone)]
pub struct MediaStorage {
    remote: Arc<dyn RemoteApi>,
    config: ConfigHandle,
    kind: ResourceKind,
    tag: Option<String>,
}

impl MediaStorage {
    pub fn new(remote: Arc<dyn RemoteApi>, config: ConfigHandle, kind: ResourceKind) -> Self {
        Self {
            remote,
            config,
            kind,
            tag: None,
        }
    }

    /// Tag uploads with `tag` instead of the configured media tag
    pub fn with_tag<S: Into<String>>(mut self, tag: S) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn resource_kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn tag(&self) -> String {
        self.tag
            .clone()
            .unwrap_or_else(|| self.config.current().media_tag.clone())
    }

    fn prefixed(&self, name: &str) -> String {
        prepend_prefix(&self.config.current().prefix, name)
    }

    fn index(&self) -> RemoteIndex {
        RemoteIndex::new(self.remote.clone()).with_batch_size(self.config.current().list_batch_size)
    }

    /// Upload `content` under `name` and return the identifier the service assigned
    pub async fn save<B: Into<Bytes>>(&self, name: &str, content: B) -> AssetResult<String> {
        let name = self.prefixed(&normalise_name(name));
        let (folder, filename) = match name.rsplit_once('/') {
            Some((folder, filename)) => (Some(folder), filename),
            None => (None, name.as_str()),
        };

        let mut request = UploadRequest::new(content, self.kind)
            .with_filename(filename)
            .with_tag(self.tag());
        if let Some(folder) = folder.filter(|f| !f.is_empty()) {
            request = request.with_folder(folder);
        }

        let result = self.remote.upload(request).await?;
        tracing::info!(kind = %self.kind, name = %name, public_id = %result.public_id, "media uploaded");
        Ok(result.public_id)
    }

    pub async fn open(&self, name: &str) -> AssetResult<Bytes> {
        self.remote
            .fetch(&self.url(name))
            .await?
            .ok_or_else(|| AssetError::not_found(name))
    }

    pub async fn exists(&self, name: &str) -> AssetResult<bool> {
        Ok(self.remote.head(&self.url(name)).await?.is_some())
    }

    /// Content length reported by the service; `None` when it did not answer
    /// with the object.
    pub async fn size(&self, name: &str) -> AssetResult<Option<u64>> {
        match self.remote.head(&self.url(name)).await {
            Ok(head) => Ok(head.and_then(|h| h.size_bytes)),
            Err(AssetError::Transport { status: Some(_), .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Destroy the object with CDN invalidation; `true` only when the service
    /// confirmed the removal.
    pub async fn delete(&self, public_id: &str) -> AssetResult<bool> {
        let result = self.remote.destroy(public_id, self.kind, true).await?;
        tracing::info!(kind = %self.kind, public_id, ?result, "media destroy");
        Ok(result == DestroyResult::Ok)
    }

    pub fn url(&self, name: &str) -> String {
        self.remote.resource_url(&self.prefixed(name), self.kind)
    }

    /// Immediate subdirectories and files under `path` among this storage's
    /// tagged objects.
    pub async fn listdir(&self, path: &str) -> AssetResult<(Vec<String>, Vec<String>)> {
        let path = directory_path(path);
        let resources = self.index().list_by_prefix(self.kind, &self.tag(), &path).await?;

        let mut directories = BTreeSet::new();
        let mut files = Vec::new();
        for resource in resources {
            let tail = resource.strip_prefix(path.as_str()).unwrap_or(&resource);
            match tail.split_once('/') {
                Some((directory, _)) => {
                    directories.insert(directory.to_string());
                }
                None => files.push(tail.to_string()),
            }
        }
        Ok((directories.into_iter().collect(), files))
    }

    /// The service assigns its own unique identifiers, so a name only needs
    /// to fit `max_length`.
    pub fn get_available_name(&self, name: &str, max_length: Option<usize>) -> String {
        match max_length {
            Some(max) => name.chars().take(max).collect(),
            None => name.to_string(),
        }
    }

    /// Every identifier of this kind carrying the storage's tag
    pub async fn list_tagged(&self) -> AssetResult<Vec<String>> {
        self.index().list_by_tag(self.kind, &self.tag()).await
    }

    /// `path` under this storage's namespace
    pub fn exclusion_prefix(&self, path: &str) -> String {
        self.prefixed(path)
    }
}

/// One [`MediaStorage`] per resource kind sharing a remote client, a
/// configuration handle and a tag.
#[derive(Clone)]
pub struct MediaStorages {
    config: ConfigHandle,
    image: MediaStorage,
    raw: MediaStorage,
    video: MediaStorage,
}

impl MediaStorages {
    pub fn new(remote: Arc<dyn RemoteApi>, config: ConfigHandle) -> Self {
        Self {
            image: MediaStorage::new(remote.clone(), config.clone(), ResourceKind::Image),
            raw: MediaStorage::new(remote.clone(), config.clone(), ResourceKind::Raw),
            video: MediaStorage::new(remote, config.clone(), ResourceKind::Video),
            config,
        }
    }

    pub fn with_tag<S: Into<String>>(self, tag: S) -> Self {
        let tag = tag.into();
        Self {
            config: self.config,
            image: self.image.with_tag(tag.clone()),
            raw: self.raw.with_tag(tag.clone()),
            video: self.video.with_tag(tag),
        }
    }

    pub fn get(&self, kind: ResourceKind) -> &MediaStorage {
        match kind {
            ResourceKind::Image => &self.image,
            ResourceKind::Raw => &self.raw,
            ResourceKind::Video => &self.video,
        }
    }

    pub fn config(&self) -> &ConfigHandle {
        &self.config
    }

    /// Store an asset in the storage of its kind; video content is checked first
    pub async fn save_asset(&self, asset: Asset) -> AssetResult<String> {
        if asset.kind == ResourceKind::Video {
            validate_video(&asset.content, &self.config.current().invalid_video_error_message)?;
        }
        let storage = self.get(asset.kind);
        match asset.tag {
            Some(tag) => storage.clone().with_tag(tag).save(&asset.name, asset.content).await,
            None => storage.save(&asset.name, asset.content).await,
        }
    }
}
