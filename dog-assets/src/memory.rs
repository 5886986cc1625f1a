use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use crate::remote::{
    DestroyResult, ListFilter, ListQuery, ObjectHead, RemoteApi, RemoteResource, ResourcePage,
    UploadRequest, UploadResult,
};
use crate::{fingerprint, AssetError, AssetResult, ResourceKind};

const URL_SCHEME: &str = "memory://";

/// Counts of calls made against a [`MemoryRemote`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoteCalls {
    pub uploads: usize,
    pub destroys: usize,
    pub list_requests: usize,
    pub heads: usize,
    pub fetches: usize,
}

#[derive(Debug, Clone)]
struct StoredObject {
    content: Bytes,
    tags: Vec<String>,
    etag: String,
}

#[derive(Default)]
struct MemoryState {
    objects: BTreeMap<(ResourceKind, String), StoredObject>,
    calls: RemoteCalls,
    fail_next_destroy: Option<String>,
    fail_heads: Option<u16>,
}

/// In-process remote service.
///
/// Mimics the parts of the service the storages rely on: identifiers derived
/// from file names with a random suffix, extensionless identifiers for image
/// and video uploads, MD5 ETags and cursor-paginated listings capped at a
/// server-side page size.
pub struct MemoryRemote {
    state: Mutex<MemoryState>,
    page_size: u32,
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::with_page_size(500)
    }

    /// Cap each listing page at `page_size` whatever the client asks for
    pub fn with_page_size(page_size: u32) -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            page_size: page_size.max(1),
        }
    }

    /// Store an object directly, bypassing upload accounting
    pub fn insert<S: Into<String>, B: Into<Bytes>>(
        &self,
        kind: ResourceKind,
        public_id: S,
        content: B,
        tags: &[&str],
    ) {
        let content = content.into();
        let object = StoredObject {
            etag: fingerprint::fingerprint(&content).to_string(),
            content,
            tags: tags.iter().map(|t| t.to_string()).collect(),
        };
        self.state.lock().objects.insert((kind, public_id.into()), object);
    }

    pub fn contains(&self, kind: ResourceKind, public_id: &str) -> bool {
        self.state
            .lock()
            .objects
            .contains_key(&(kind, public_id.to_string()))
    }

    pub fn content(&self, kind: ResourceKind, public_id: &str) -> Option<Bytes> {
        self.state
            .lock()
            .objects
            .get(&(kind, public_id.to_string()))
            .map(|o| o.content.clone())
    }

    /// Identifiers stored for a kind, sorted
    pub fn public_ids(&self, kind: ResourceKind) -> Vec<String> {
        self.state
            .lock()
            .objects
            .keys()
            .filter(|(k, _)| *k == kind)
            .map(|(_, id)| id.clone())
            .collect()
    }

    pub fn calls(&self) -> RemoteCalls {
        self.state.lock().calls
    }

    pub fn reset_calls(&self) {
        self.state.lock().calls = RemoteCalls::default();
    }

    /// Make the next destroy of `public_id` fail with a transport error
    pub fn fail_next_destroy<S: Into<String>>(&self, public_id: S) {
        self.state.lock().fail_next_destroy = Some(public_id.into());
    }

    /// Make every HEAD probe answer with `status` (`None` restores normal behaviour)
    pub fn fail_heads(&self, status: Option<u16>) {
        self.state.lock().fail_heads = status;
    }

    fn assign_public_id(request: &UploadRequest) -> String {
        if let Some(public_id) = &request.public_id {
            return public_id.clone();
        }

        let filename = request.filename.clone().unwrap_or_default();
        let (stem, ext) = match filename.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => (stem.to_string(), Some(ext.to_string())),
            _ => (filename.clone(), None),
        };
        let random = uuid::Uuid::new_v4().simple().to_string();
        let mut id = if request.use_filename && !stem.is_empty() {
            format!("{stem}_{}", &random[..6])
        } else {
            random[..20].to_string()
        };
        if request.kind == ResourceKind::Raw {
            if let Some(ext) = ext {
                id = format!("{id}.{ext}");
            }
        }
        match request.folder.as_deref().filter(|f| !f.is_empty()) {
            Some(folder) => format!("{}/{id}", folder.trim_end_matches('/')),
            None => id,
        }
    }

    /// Splits `memory://{kind}/upload/{public_id}`
    fn parse_url(url: &str) -> AssetResult<(ResourceKind, String)> {
        let invalid = || AssetError::transport(Some(400), format!("malformed memory url: {url}"));
        let rest = url.strip_prefix(URL_SCHEME).ok_or_else(invalid)?;
        let (kind, rest) = rest.split_once('/').ok_or_else(invalid)?;
        let public_id = rest.strip_prefix("upload/").ok_or_else(invalid)?;
        let kind = kind.parse::<ResourceKind>().map_err(|_| invalid())?;
        let public_id = urlencoding::decode(public_id)
            .map(|s| s.into_owned())
            .map_err(|_| invalid())?;
        Ok((kind, public_id))
    }

    /// Delivery resolves image and video identifiers with a format extension.
    fn lookup<'a>(
        objects: &'a BTreeMap<(ResourceKind, String), StoredObject>,
        kind: ResourceKind,
        public_id: &str,
    ) -> Option<&'a StoredObject> {
        objects.get(&(kind, public_id.to_string())).or_else(|| {
            if kind == ResourceKind::Raw {
                return None;
            }
            let (stem, _) = public_id.rsplit_once('.')?;
            objects.get(&(kind, stem.to_string()))
        })
    }
}

#[async_trait]
impl RemoteApi for MemoryRemote {
    async fn upload(&self, request: UploadRequest) -> AssetResult<UploadResult> {
        let public_id = Self::assign_public_id(&request);
        let etag = fingerprint::fingerprint(&request.content).to_string();
        let size = request.content.len() as u64;

        let mut state = self.state.lock();
        state.calls.uploads += 1;
        state.objects.insert(
            (request.kind, public_id.clone()),
            StoredObject {
                content: request.content,
                tags: request.tags,
                etag: etag.clone(),
            },
        );

        Ok(UploadResult {
            public_id,
            etag: Some(etag),
            size_bytes: Some(size),
        })
    }

    async fn destroy(
        &self,
        public_id: &str,
        kind: ResourceKind,
        _invalidate: bool,
    ) -> AssetResult<DestroyResult> {
        let mut state = self.state.lock();
        state.calls.destroys += 1;
        if state.fail_next_destroy.as_deref() == Some(public_id) {
            state.fail_next_destroy = None;
            return Err(AssetError::transport(Some(500), format!("destroy of {public_id} failed")));
        }
        Ok(match state.objects.remove(&(kind, public_id.to_string())) {
            Some(_) => DestroyResult::Ok,
            None => DestroyResult::NotFound,
        })
    }

    async fn list_resources(&self, query: &ListQuery) -> AssetResult<ResourcePage> {
        let mut state = self.state.lock();
        state.calls.list_requests += 1;

        let matching: Vec<RemoteResource> = state
            .objects
            .iter()
            .filter(|((kind, id), object)| {
                *kind == query.kind
                    && match &query.filter {
                        ListFilter::Tag(tag) => object.tags.iter().any(|t| t == tag),
                        ListFilter::Prefix(prefix) => id.starts_with(prefix.as_str()),
                    }
            })
            .map(|((_, id), object)| RemoteResource {
                public_id: id.clone(),
                tags: match query.filter {
                    ListFilter::Tag(_) => Vec::new(),
                    ListFilter::Prefix(_) => object.tags.clone(),
                },
            })
            .collect();

        let start = match &query.next_cursor {
            Some(cursor) => cursor
                .parse::<usize>()
                .map_err(|_| AssetError::transport(Some(400), format!("invalid cursor: {cursor}")))?,
            None => 0,
        };
        let limit = query.max_results.min(self.page_size).max(1) as usize;
        let end = (start + limit).min(matching.len());
        let resources = matching.get(start..end).map(<[_]>::to_vec).unwrap_or_default();
        let next_cursor = (end < matching.len()).then(|| end.to_string());

        Ok(ResourcePage {
            resources,
            next_cursor,
        })
    }

    async fn head(&self, url: &str) -> AssetResult<Option<ObjectHead>> {
        let (kind, public_id) = Self::parse_url(url)?;
        let mut state = self.state.lock();
        state.calls.heads += 1;
        if let Some(status) = state.fail_heads {
            return Err(AssetError::transport(Some(status), format!("HEAD {url} failed")));
        }
        Ok(Self::lookup(&state.objects, kind, &public_id).map(|object| ObjectHead {
            size_bytes: Some(object.content.len() as u64),
            etag: Some(object.etag.clone()),
        }))
    }

    async fn fetch(&self, url: &str) -> AssetResult<Option<Bytes>> {
        let (kind, public_id) = Self::parse_url(url)?;
        let mut state = self.state.lock();
        state.calls.fetches += 1;
        Ok(Self::lookup(&state.objects, kind, &public_id).map(|o| o.content.clone()))
    }

    fn resource_url(&self, public_id: &str, kind: ResourceKind) -> String {
        let encoded = public_id
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        format!("{URL_SCHEME}{kind}/upload/{encoded}")
    }
}
