use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, CONTENT_LENGTH, ETAG};
use reqwest::{multipart, Client, StatusCode};
use serde::Deserialize;
use sha1::Sha1;
use sha2::{Digest, Sha256};

use crate::remote::{
    parse_etag, DestroyResult, ListFilter, ListQuery, ObjectHead, RemoteApi, RemoteResource,
    ResourcePage, UploadRequest, UploadResult,
};
use crate::{AssetError, AssetResult, AssetsConfig, ResourceKind, SignatureAlgorithm};

const DEFAULT_API_BASE: &str = "https://api.cloudinary.com/v1_1";
const DEFAULT_DELIVERY_HOST: &str = "res.cloudinary.com";

#[derive(Deserialize)]
struct UploadResponse {
    public_id: String,
    etag: Option<String>,
    bytes: Option<u64>,
}

#[derive(Deserialize)]
struct DestroyResponse {
    result: String,
}

#[derive(Deserialize)]
struct ResourcesResponse {
    #[serde(default)]
    resources: Vec<ResourceItem>,
    next_cursor: Option<String>,
}

#[derive(Deserialize)]
struct ResourceItem {
    public_id: String,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorMessage,
}

#[derive(Deserialize)]
struct ErrorMessage {
    message: String,
}

/// Cloudinary-compatible remote service over HTTP.
///
/// Uploads and destroys are signed over the sorted request parameters with the
/// configured [`SignatureAlgorithm`] (SHA-1 unless the account opted into
/// SHA-256). Catalog listing goes through the Admin API with basic auth.
pub struct CloudinaryClient {
    cloud_name: String,
    api_key: String,
    api_secret: String,
    signature_algorithm: SignatureAlgorithm,
    api_base: String,
    delivery_base: String,
    http_client: Client,
}

impl CloudinaryClient {
    /// Build a client; fails before any request when credentials are missing
    pub fn new(config: &AssetsConfig) -> AssetResult<Self> {
        config.validate()?;
        let http_client = Client::builder()
            .build()
            .map_err(|e| AssetError::configuration(format!("failed to create HTTP client: {e}")))?;

        let scheme = if config.secure { "https" } else { "http" };
        let delivery_base = config
            .delivery_base_url
            .clone()
            .unwrap_or_else(|| format!("{scheme}://{DEFAULT_DELIVERY_HOST}/{}", config.cloud_name));

        Ok(Self {
            cloud_name: config.cloud_name.clone(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            signature_algorithm: config.signature_algorithm,
            api_base: config
                .api_base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            delivery_base,
            http_client,
        })
    }

    fn trim_base(&self) -> &str {
        self.api_base.trim_end_matches('/')
    }

    fn endpoint(&self, kind: ResourceKind, action: &str) -> String {
        format!("{}/{}/{}/{}", self.trim_base(), self.cloud_name, kind, action)
    }

    fn timestamp() -> String {
        chrono::Utc::now().timestamp().to_string()
    }

    /// Hex digest of `k1=v1&k2=v2…` (keys sorted, empty values skipped) followed by the secret
    fn sign(&self, params: &BTreeMap<&str, String>) -> String {
        let to_sign = params
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        match self.signature_algorithm {
            SignatureAlgorithm::Sha1 => hex_digest::<Sha1>(&to_sign, &self.api_secret),
            SignatureAlgorithm::Sha256 => hex_digest::<Sha256>(&to_sign, &self.api_secret),
        }
    }

    async fn error_from_response(context: &str, resp: reqwest::Response) -> AssetError {
        let status = resp.status();
        let body = resp.bytes().await.unwrap_or_default();
        error_from_body(context, status, &body)
    }
}

fn hex_digest<D: Digest>(to_sign: &str, secret: &str) -> String {
    let mut hasher = D::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Service error message from a JSON `{"error": {"message": …}}` body, or the status reason
fn error_from_body(context: &str, status: StatusCode, body: &[u8]) -> AssetError {
    let message = match serde_json::from_slice::<ErrorBody>(body) {
        Ok(body) => body.error.message,
        Err(_) => status.canonical_reason().unwrap_or("unknown error").to_string(),
    };
    AssetError::transport(Some(status.as_u16()), format!("{context} failed: {message}"))
}

/// 404 is absence, 2xx carries the object headers, anything else is a transport error
fn head_from_parts(url: &str, status: StatusCode, headers: &HeaderMap) -> AssetResult<Option<ObjectHead>> {
    match status {
        StatusCode::NOT_FOUND => Ok(None),
        status if status.is_success() => {
            let size_bytes = headers
                .get(CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok());
            let etag = headers
                .get(ETAG)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_etag);
            Ok(Some(ObjectHead { size_bytes, etag }))
        }
        status => Err(AssetError::transport(
            Some(status.as_u16()),
            format!("HEAD {url} failed"),
        )),
    }
}

/// `false` when the object is absent
fn fetch_status(url: &str, status: StatusCode) -> AssetResult<bool> {
    match status {
        StatusCode::NOT_FOUND => Ok(false),
        status if status.is_success() => Ok(true),
        status => Err(AssetError::transport(
            Some(status.as_u16()),
            format!("GET {url} failed"),
        )),
    }
}

impl From<ResourcesResponse> for ResourcePage {
    fn from(body: ResourcesResponse) -> Self {
        Self {
            resources: body
                .resources
                .into_iter()
                .map(|r| RemoteResource {
                    public_id: r.public_id,
                    tags: r.tags,
                })
                .collect(),
            next_cursor: body.next_cursor.filter(|c| !c.is_empty()),
        }
    }
}

fn encode_public_id(public_id: &str) -> String {
    public_id
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[async_trait]
impl RemoteApi for CloudinaryClient {
    async fn upload(&self, request: UploadRequest) -> AssetResult<UploadResult> {
        let mut params: BTreeMap<&'static str, String> = BTreeMap::new();
        params.insert("timestamp", Self::timestamp());
        if let Some(public_id) = &request.public_id {
            params.insert("public_id", public_id.clone());
        }
        if let Some(folder) = request.folder.as_ref().filter(|f| !f.is_empty()) {
            params.insert("folder", folder.clone());
        }
        if request.use_filename {
            params.insert("use_filename", "true".to_string());
        }
        if !request.tags.is_empty() {
            params.insert("tags", request.tags.join(","));
        }
        if request.invalidate {
            params.insert("invalidate", "true".to_string());
        }
        let signature = self.sign(&params);

        let filename = request.filename.clone().unwrap_or_else(|| "file".to_string());
        let mut form = multipart::Form::new()
            .part("file", multipart::Part::bytes(request.content.to_vec()).file_name(filename))
            .text("api_key", self.api_key.clone())
            .text("signature", signature);
        for (key, value) in params {
            form = form.text(key, value);
        }

        let url = self.endpoint(request.kind, "upload");
        tracing::debug!(%url, public_id = ?request.public_id, "uploading to remote service");
        let resp = self.http_client.post(&url).multipart(form).send().await?;
        if !resp.status().is_success() {
            return Err(Self::error_from_response("upload", resp).await);
        }

        let body: UploadResponse = resp.json().await?;
        Ok(UploadResult {
            public_id: body.public_id,
            etag: body.etag,
            size_bytes: body.bytes,
        })
    }

    async fn destroy(
        &self,
        public_id: &str,
        kind: ResourceKind,
        invalidate: bool,
    ) -> AssetResult<DestroyResult> {
        let mut params: BTreeMap<&str, String> = BTreeMap::new();
        params.insert("public_id", public_id.to_string());
        params.insert("timestamp", Self::timestamp());
        if invalidate {
            params.insert("invalidate", "true".to_string());
        }
        let signature = self.sign(&params);

        let mut form: Vec<(&str, String)> = params.into_iter().collect();
        form.push(("api_key", self.api_key.clone()));
        form.push(("signature", signature));

        let resp = self
            .http_client
            .post(self.endpoint(kind, "destroy"))
            .form(&form)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Self::error_from_response("destroy", resp).await);
        }

        let body: DestroyResponse = resp.json().await?;
        Ok(DestroyResult::from_result(&body.result))
    }

    async fn list_resources(&self, query: &ListQuery) -> AssetResult<ResourcePage> {
        let (url, mut params) = match &query.filter {
            ListFilter::Tag(tag) => (
                format!(
                    "{}/{}/resources/{}/tags/{}",
                    self.trim_base(),
                    self.cloud_name,
                    query.kind,
                    urlencoding::encode(tag)
                ),
                Vec::new(),
            ),
            ListFilter::Prefix(prefix) => (
                format!(
                    "{}/{}/resources/{}/upload",
                    self.trim_base(),
                    self.cloud_name,
                    query.kind
                ),
                vec![("prefix", prefix.clone()), ("tags", "true".to_string())],
            ),
        };
        params.push(("max_results", query.max_results.to_string()));
        if let Some(cursor) = &query.next_cursor {
            params.push(("next_cursor", cursor.clone()));
        }

        let resp = self
            .http_client
            .get(&url)
            .basic_auth(&self.api_key, Some(&self.api_secret))
            .query(&params)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Self::error_from_response("resource listing", resp).await);
        }

        let body: ResourcesResponse = resp.json().await?;
        Ok(body.into())
    }

    async fn head(&self, url: &str) -> AssetResult<Option<ObjectHead>> {
        let resp = self.http_client.head(url).send().await?;
        head_from_parts(url, resp.status(), resp.headers())
    }

    async fn fetch(&self, url: &str) -> AssetResult<Option<Bytes>> {
        let resp = self.http_client.get(url).send().await?;
        if fetch_status(url, resp.status())? {
            Ok(Some(resp.bytes().await?))
        } else {
            Ok(None)
        }
    }

    fn resource_url(&self, public_id: &str, kind: ResourceKind) -> String {
        format!(
            "{}/{}/upload/{}",
            self.delivery_base.trim_end_matches('/'),
            kind,
            encode_public_id(public_id)
        )
    }
}
