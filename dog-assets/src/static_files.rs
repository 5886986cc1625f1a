use std::sync::Arc;

use bytes::Bytes;

use crate::fingerprint::fingerprint;
use crate::index::RemoteIndex;
use crate::remote::{DestroyResult, RemoteApi, UploadRequest};
use crate::types::{clean_name, file_extension, prepend_prefix};
use crate::{AssetError, AssetResult, ConfigHandle, EtagMatch, ResourceKind};

/// Result of a deduplicating static save
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    /// Prefixed name the asset is stored under
    pub stored_name: String,
    /// Whether the content had to be uploaded
    pub uploaded: bool,
}

/// Storage for build-time static assets.
///
/// The resource kind is inferred from each file's extension and uploads are
/// skipped when the remote copy already has the same content.
#[derive(Clone)]
pub struct StaticStorage {
    remote: Arc<dyn RemoteApi>,
    config: ConfigHandle,
}

impl StaticStorage {
    pub fn new(remote: Arc<dyn RemoteApi>, config: ConfigHandle) -> Self {
        Self { remote, config }
    }

    pub fn config(&self) -> &ConfigHandle {
        &self.config
    }

    pub fn tag(&self) -> String {
        self.config.current().static_tag.clone()
    }

    pub fn kind_for(&self, name: &str) -> ResourceKind {
        let Some(extension) = file_extension(name) else {
            return ResourceKind::Raw;
        };
        let config = self.config.current();
        if config.static_images_extensions.contains(&extension) {
            ResourceKind::Image
        } else if config.static_videos_extensions.contains(&extension) {
            ResourceKind::Video
        } else {
            ResourceKind::Raw
        }
    }

    /// Image and video identifiers carry no extension; delivery URLs add the
    /// format back.
    pub fn remove_extension_for_non_raw(&self, name: &str) -> String {
        if self.kind_for(name) == ResourceKind::Raw {
            return name.to_string();
        }
        match name.rsplit_once('.') {
            Some((stem, _)) => stem.to_string(),
            None => name.to_string(),
        }
    }

    /// `name` under the static namespace
    pub fn stored_name(&self, name: &str) -> String {
        prepend_prefix(&self.config.current().static_url, name)
    }

    /// Identifier an upload of `name` is stored under
    pub fn public_id_for(&self, name: &str) -> String {
        self.remove_extension_for_non_raw(&self.stored_name(&clean_name(name)))
    }

    fn delivery_url(&self, name: &str) -> String {
        self.remote.resource_url(&self.stored_name(name), self.kind_for(name))
    }

    pub fn url(&self, name: &str) -> String {
        let config = self.config.current();
        if config.debug {
            format!("{}{name}", config.static_url)
        } else {
            self.delivery_url(name)
        }
    }

    /// Whether the remote copy of `name` exists with the same content
    pub async fn exists_with_etag(&self, name: &str, content: &[u8]) -> AssetResult<bool> {
        let Some(head) = self.remote.head(&self.delivery_url(name)).await? else {
            return Ok(false);
        };
        let Some(etag) = head.etag else {
            tracing::debug!(name, "remote copy has no ETag");
            return Ok(false);
        };

        let digest = fingerprint(content);
        Ok(match self.config.current().etag_match {
            EtagMatch::Exact => etag.eq_ignore_ascii_case(digest.as_str()),
            EtagMatch::Prefix => etag.to_ascii_lowercase().starts_with(digest.short()),
        })
    }

    /// Upload `content` unless an identical copy is already stored
    pub async fn save_with_outcome<B: Into<Bytes>>(&self, name: &str, content: B) -> AssetResult<SaveOutcome> {
        let name = clean_name(name);
        let content = content.into();
        let stored_name = self.stored_name(&name);

        if self.exists_with_etag(&name, &content).await? {
            tracing::debug!(name = %stored_name, "static asset unchanged");
            return Ok(SaveOutcome {
                stored_name,
                uploaded: false,
            });
        }

        let kind = self.kind_for(&name);
        let request = UploadRequest::new(content, kind)
            .with_public_id(self.remove_extension_for_non_raw(&stored_name))
            .with_tag(self.tag())
            .invalidate();
        let result = self.remote.upload(request).await?;
        tracing::info!(%kind, name = %stored_name, public_id = %result.public_id, "static asset uploaded");

        Ok(SaveOutcome {
            stored_name,
            uploaded: true,
        })
    }

    pub async fn save<B: Into<Bytes>>(&self, name: &str, content: B) -> AssetResult<String> {
        Ok(self.save_with_outcome(name, content).await?.stored_name)
    }

    pub async fn exists(&self, name: &str) -> AssetResult<bool> {
        Ok(self.remote.head(&self.delivery_url(name)).await?.is_some())
    }

    pub async fn open(&self, name: &str) -> AssetResult<Bytes> {
        self.remote
            .fetch(&self.delivery_url(name))
            .await?
            .ok_or_else(|| AssetError::not_found(name))
    }

    pub async fn size(&self, name: &str) -> AssetResult<Option<u64>> {
        match self.remote.head(&self.delivery_url(name)).await {
            Ok(head) => Ok(head.and_then(|h| h.size_bytes)),
            Err(AssetError::Transport { status: Some(_), .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Delete the object stored for the static file `name`
    pub async fn delete(&self, name: &str) -> AssetResult<bool> {
        let kind = self.kind_for(name);
        self.delete_object(kind, &self.public_id_for(name)).await
    }

    /// Destroy a remote object by identifier
    pub async fn delete_object(&self, kind: ResourceKind, public_id: &str) -> AssetResult<bool> {
        let result = self.remote.destroy(public_id, kind, true).await?;
        tracing::info!(%kind, public_id, ?result, "static destroy");
        Ok(result == DestroyResult::Ok)
    }

    /// Static assets mix resource kinds, so one prefix listing cannot cover them
    pub async fn listdir(&self, _path: &str) -> AssetResult<(Vec<String>, Vec<String>)> {
        Err(AssetError::Unsupported { operation: "listdir" })
    }

    /// Every identifier of `kind` carrying the static tag
    pub async fn list_tagged(&self, kind: ResourceKind) -> AssetResult<Vec<String>> {
        RemoteIndex::new(self.remote.clone())
            .with_batch_size(self.config.current().list_batch_size)
            .list_by_tag(kind, &self.tag())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AssetsConfig, MemoryRemote};

    fn setup(config: AssetsConfig) -> (Arc<MemoryRemote>, StaticStorage) {
        let remote = Arc::new(MemoryRemote::new());
        let storage = StaticStorage::new(remote.clone(), ConfigHandle::new(config).unwrap());
        (remote, storage)
    }

    fn config() -> AssetsConfig {
        AssetsConfig::new("demo", "key", "secret")
    }

    #[test]
    fn test_kind_inferred_from_extension() {
        let (_, storage) = setup(config());
        assert_eq!(storage.kind_for("img/logo.PNG"), ResourceKind::Image);
        assert_eq!(storage.kind_for("video/intro.mp4"), ResourceKind::Video);
        assert_eq!(storage.kind_for("css/site.css"), ResourceKind::Raw);
        assert_eq!(storage.kind_for("LICENSE"), ResourceKind::Raw);
    }

    #[test]
    fn test_public_id_strips_extension_for_images_only() {
        let (_, storage) = setup(config());
        assert_eq!(storage.public_id_for("img/logo.png"), "static/img/logo");
        assert_eq!(storage.public_id_for("css\\site.css"), "static/css/site.css");
    }

    #[test]
    fn test_url_in_debug_mode() {
        let (_, storage) = setup(config().with_debug(true));
        assert_eq!(storage.url("css/site.css"), "/static/css/site.css");

        let (_, storage) = setup(config());
        assert_eq!(storage.url("css/site.css"), "memory://raw/upload/static/css/site.css");
    }

    #[tokio::test]
    async fn test_save_skips_identical_content() {
        let (remote, storage) = setup(config());
        let first = storage.save_with_outcome("img/logo.png", &b"png"[..]).await.unwrap();
        assert_eq!(first.stored_name, "static/img/logo.png");
        assert!(first.uploaded);
        assert!(remote.contains(ResourceKind::Image, "static/img/logo"));

        let second = storage.save_with_outcome("img/logo.png", &b"png"[..]).await.unwrap();
        assert!(!second.uploaded);

        let third = storage.save_with_outcome("img/logo.png", &b"changed"[..]).await.unwrap();
        assert!(third.uploaded);
        assert_eq!(remote.calls().uploads, 2);
    }

    #[tokio::test]
    async fn test_delete_uses_public_id() {
        let (remote, storage) = setup(config());
        storage.save("img/logo.png", &b"png"[..]).await.unwrap();
        assert!(storage.delete("img/logo.png").await.unwrap());
        assert!(!remote.contains(ResourceKind::Image, "static/img/logo"));
    }

    #[tokio::test]
    async fn test_listdir_is_unsupported() {
        let (_, storage) = setup(config());
        assert!(matches!(
            storage.listdir("").await,
            Err(AssetError::Unsupported { operation: "listdir" })
        ));
    }
}
