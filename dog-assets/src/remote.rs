use async_trait::async_trait;
use bytes::Bytes;

use crate::{AssetResult, ResourceKind};

/// Operations consumed from the remote blob service
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Upload content, returning the identifier the service assigned
    async fn upload(&self, request: UploadRequest) -> AssetResult<UploadResult>;

    /// Remove an object, optionally invalidating CDN caches
    async fn destroy(
        &self,
        public_id: &str,
        kind: ResourceKind,
        invalidate: bool,
    ) -> AssetResult<DestroyResult>;

    /// Fetch one page of the remote catalog
    async fn list_resources(&self, query: &ListQuery) -> AssetResult<ResourcePage>;

    /// HEAD probe; `None` when the service answers 404
    async fn head(&self, url: &str) -> AssetResult<Option<ObjectHead>>;

    /// GET the full content; `None` when the service answers 404
    async fn fetch(&self, url: &str) -> AssetResult<Option<Bytes>>;

    /// Public delivery URL of an object
    fn resource_url(&self, public_id: &str, kind: ResourceKind) -> String;
}

/// Request to upload content
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub content: Bytes,
    pub kind: ResourceKind,
    /// Exact identifier to store under; the service picks one when absent
    pub public_id: Option<String>,
    /// Original file name, used when the service derives the identifier
    pub filename: Option<String>,
    pub folder: Option<String>,
    pub use_filename: bool,
    pub tags: Vec<String>,
    pub invalidate: bool,
}

impl UploadRequest {
    pub fn new<B: Into<Bytes>>(content: B, kind: ResourceKind) -> Self {
        Self {
            content: content.into(),
            kind,
            public_id: None,
            filename: None,
            folder: None,
            use_filename: false,
            tags: Vec::new(),
            invalidate: false,
        }
    }

    pub fn with_public_id<S: Into<String>>(mut self, public_id: S) -> Self {
        self.public_id = Some(public_id.into());
        self
    }

    /// Let the service derive the identifier from `filename`
    pub fn with_filename<S: Into<String>>(mut self, filename: S) -> Self {
        self.filename = Some(filename.into());
        self.use_filename = true;
        self
    }

    pub fn with_folder<S: Into<String>>(mut self, folder: S) -> Self {
        self.folder = Some(folder.into());
        self
    }

    pub fn with_tag<S: Into<String>>(mut self, tag: S) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn invalidate(mut self) -> Self {
        self.invalidate = true;
        self
    }
}

/// Result of a successful upload
#[derive(Debug, Clone)]
pub struct UploadResult {
    pub public_id: String,
    pub etag: Option<String>,
    pub size_bytes: Option<u64>,
}

/// Outcome of a destroy call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestroyResult {
    Ok,
    NotFound,
}

impl DestroyResult {
    /// Maps the service's `result` field
    pub fn from_result(result: &str) -> Self {
        if result == "ok" {
            DestroyResult::Ok
        } else {
            DestroyResult::NotFound
        }
    }
}

/// What a catalog page is scoped by
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListFilter {
    /// Objects carrying the tag
    Tag(String),
    /// Objects whose identifier starts with the prefix, tags included in the answer
    Prefix(String),
}

/// One paginated catalog request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub kind: ResourceKind,
    pub filter: ListFilter,
    pub max_results: u32,
    pub next_cursor: Option<String>,
}

/// An object as the catalog reports it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteResource {
    pub public_id: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ResourcePage {
    pub resources: Vec<RemoteResource>,
    pub next_cursor: Option<String>,
}

/// Headers of a successful HEAD probe
#[derive(Debug, Clone, Default)]
pub struct ObjectHead {
    pub size_bytes: Option<u64>,
    /// ETag with quotes and weak marker removed
    pub etag: Option<String>,
}

/// Strips `W/` and surrounding quotes from an ETag header value
pub fn parse_etag(header: &str) -> Option<String> {
    let value = header.trim();
    let value = value.strip_prefix("W/").unwrap_or(value);
    let value = value.trim_matches('"');
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_etag() {
        assert_eq!(parse_etag("\"abc123\""), Some("abc123".to_string()));
        assert_eq!(parse_etag("W/\"abc123\""), Some("abc123".to_string()));
        assert_eq!(parse_etag("abc123"), Some("abc123".to_string()));
        assert_eq!(parse_etag("\"\""), None);
    }

    #[test]
    fn test_destroy_result_from_result() {
        assert_eq!(DestroyResult::from_result("ok"), DestroyResult::Ok);
        assert_eq!(DestroyResult::from_result("not found"), DestroyResult::NotFound);
    }
}
