use std::sync::Arc;

use crate::remote::{ListFilter, ListQuery, RemoteApi};
use crate::{AssetError, AssetResult, ResourceKind};

/// Page size requested from the service unless configured otherwise
pub const DEFAULT_BATCH_SIZE: u32 = 500;

/// Enumerates remote objects, following continuation cursors until the
/// service reports none. Every call re-pages from the start.
#[derive(Clone)]
pub struct RemoteIndex {
    remote: Arc<dyn RemoteApi>,
    batch_size: u32,
}

impl RemoteIndex {
    pub fn new(remote: Arc<dyn RemoteApi>) -> Self {
        Self {
            remote,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Identifiers of every object of `kind` tagged with `tag`
    pub async fn list_by_tag(&self, kind: ResourceKind, tag: &str) -> AssetResult<Vec<String>> {
        self.collect(kind, ListFilter::Tag(tag.to_string()), None).await
    }

    /// Identifiers of objects of `kind` under `prefix` that carry `tag`
    pub async fn list_by_prefix(
        &self,
        kind: ResourceKind,
        tag: &str,
        prefix: &str,
    ) -> AssetResult<Vec<String>> {
        self.collect(kind, ListFilter::Prefix(prefix.to_string()), Some(tag))
            .await
    }

    async fn collect(
        &self,
        kind: ResourceKind,
        filter: ListFilter,
        required_tag: Option<&str>,
    ) -> AssetResult<Vec<String>> {
        let mut query = ListQuery {
            kind,
            filter,
            max_results: self.batch_size,
            next_cursor: None,
        };
        let mut identifiers = Vec::new();
        let mut pages = 0usize;

        loop {
            let page = self.remote.list_resources(&query).await?;
            pages += 1;
            tracing::debug!(
                %kind,
                page = pages,
                resources = page.resources.len(),
                "listed remote page"
            );

            identifiers.extend(
                page.resources
                    .into_iter()
                    .filter(|r| required_tag.map_or(true, |tag| r.tags.iter().any(|t| t == tag)))
                    .map(|r| r.public_id),
            );

            match page.next_cursor {
                Some(cursor) if query.next_cursor.as_ref() == Some(&cursor) => {
                    return Err(AssetError::transport(
                        None,
                        format!("listing of {kind} resources returned the same cursor twice"),
                    ));
                }
                Some(cursor) => query.next_cursor = Some(cursor),
                None => break,
            }
        }

        Ok(identifiers)
    }
}
