//! Orphan and redundant object cleanup.
//!
//! A run walks `CollectReferenced → ListRemote → Diff → Confirm → Delete →
//! Report`. The orphan set is recomputed from scratch on every run and never
//! persisted.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::Deserialize;

use crate::confirm::Confirmation;
use crate::hashed::HashedStaticStorage;
use crate::report::{confirmation_prompt, DeleteFailure, ReconcileOutcome, ReconcileReport};
use crate::static_files::StaticStorage;
use crate::storage::MediaStorages;
use crate::types::{clean_name, prepend_prefix};
use crate::{AssetError, AssetResult, ResourceKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileState {
    CollectReferenced,
    ListRemote,
    Diff,
    Confirm,
    Delete,
    Report,
}

impl ReconcileState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileState::CollectReferenced => "collect_referenced",
            ReconcileState::ListRemote => "list_remote",
            ReconcileState::Diff => "diff",
            ReconcileState::Confirm => "confirm",
            ReconcileState::Delete => "delete",
            ReconcileState::Report => "report",
        }
    }
}

impl std::fmt::Display for ReconcileState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage side of a reconciliation run
#[async_trait]
pub trait ReconcileTarget: Send + Sync {
    /// Every identifier of `kind` carrying the target's tag
    async fn list_tagged(&self, kind: ResourceKind) -> AssetResult<Vec<String>>;

    /// `true` when the service confirmed the removal
    async fn delete_object(&self, kind: ResourceKind, public_id: &str) -> AssetResult<bool>;
}

#[async_trait]
impl ReconcileTarget for MediaStorages {
    async fn list_tagged(&self, kind: ResourceKind) -> AssetResult<Vec<String>> {
        self.get(kind).list_tagged().await
    }

    async fn delete_object(&self, kind: ResourceKind, public_id: &str) -> AssetResult<bool> {
        self.get(kind).delete(public_id).await
    }
}

#[async_trait]
impl ReconcileTarget for StaticStorage {
    async fn list_tagged(&self, kind: ResourceKind) -> AssetResult<Vec<String>> {
        StaticStorage::list_tagged(self, kind).await
    }

    async fn delete_object(&self, kind: ResourceKind, public_id: &str) -> AssetResult<bool> {
        StaticStorage::delete_object(self, kind, public_id).await
    }
}

/// Names media records still point at
#[async_trait]
pub trait MediaReferences: Send + Sync {
    /// Resource kinds any stored record can refer to
    fn resource_kinds(&self) -> BTreeSet<ResourceKind>;

    /// Every stored identifier still referenced
    async fn referenced_names(&self) -> AssetResult<BTreeSet<String>>;
}

/// Fixed set of references, e.g. exported from a database
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ReferenceSet {
    pub kinds: BTreeSet<ResourceKind>,
    #[serde(default)]
    pub names: BTreeSet<String>,
}

impl ReferenceSet {
    pub fn new<K, N, S>(kinds: K, names: N) -> Self
    where
        K: IntoIterator<Item = ResourceKind>,
        N: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kinds: kinds.into_iter().collect(),
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse `{"kinds": ["image", …], "names": [...]}`
    pub fn from_json(content: &str) -> AssetResult<Self> {
        Ok(serde_json::from_str(content)?)
    }
}

#[async_trait]
impl MediaReferences for ReferenceSet {
    fn resource_kinds(&self) -> BTreeSet<ResourceKind> {
        self.kinds.clone()
    }

    async fn referenced_names(&self) -> AssetResult<BTreeSet<String>> {
        Ok(self.names.clone())
    }
}

/// Remote identifiers that are neither referenced nor under an excluded prefix
pub fn orphans<I>(remote: I, referenced: &BTreeSet<String>, exclude_prefixes: &[String]) -> BTreeSet<String>
where
    I: IntoIterator<Item = String>,
{
    remote
        .into_iter()
        .filter(|id| !exclude_prefixes.iter().any(|prefix| id.starts_with(prefix.as_str())))
        .filter(|id| !referenced.contains(id))
        .collect()
}

/// One cleanup pass over a [`ReconcileTarget`]
pub struct Reconciler<'a> {
    target: &'a dyn ReconcileTarget,
    kinds: BTreeSet<ResourceKind>,
    referenced: BTreeSet<String>,
    exclude_prefixes: Vec<String>,
}

impl<'a> Reconciler<'a> {
    pub fn new<K>(target: &'a dyn ReconcileTarget, kinds: K, referenced: BTreeSet<String>) -> Self
    where
        K: IntoIterator<Item = ResourceKind>,
    {
        Self {
            target,
            kinds: kinds.into_iter().collect(),
            referenced,
            exclude_prefixes: Vec::new(),
        }
    }

    /// Identifiers starting with any of `prefixes` are never removed
    pub fn with_exclude_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.exclude_prefixes = prefixes;
        self
    }

    /// Orphaned objects of every tracked kind
    pub async fn files_to_remove(&self) -> AssetResult<Vec<(ResourceKind, String)>> {
        let mut files = Vec::new();
        for &kind in &self.kinds {
            tracing::debug!(state = %ReconcileState::ListRemote, %kind, "listing tagged objects");
            let remote = self.target.list_tagged(kind).await?;
            let listed = remote.len();

            let kind_orphans = orphans(remote, &self.referenced, &self.exclude_prefixes);
            tracing::debug!(
                state = %ReconcileState::Diff,
                %kind,
                listed,
                orphans = kind_orphans.len(),
                "computed orphans"
            );
            files.extend(kind_orphans.into_iter().map(|id| (kind, id)));
        }
        Ok(files)
    }

    pub async fn run(&self, confirmation: &Confirmation) -> AssetResult<ReconcileReport> {
        let files = self.files_to_remove().await?;
        if files.is_empty() {
            tracing::info!(state = %ReconcileState::Report, "nothing to delete");
            return Ok(ReconcileReport::nothing_to_delete());
        }

        tracing::debug!(state = %ReconcileState::Confirm, pending = files.len(), "awaiting confirmation");
        if !confirmation.confirm(&confirmation_prompt(&files))? {
            tracing::info!(state = %ReconcileState::Report, pending = files.len(), "deletion declined");
            return Ok(ReconcileReport::declined(files.len()));
        }

        let mut report = ReconcileReport {
            outcome: ReconcileOutcome::Removed,
            removed: Vec::new(),
            failed: Vec::new(),
        };
        for (kind, public_id) in files {
            tracing::debug!(state = %ReconcileState::Delete, %kind, public_id = %public_id, "deleting");
            let result = self.target.delete_object(kind, &public_id).await;
            let failure = match result {
                Ok(true) => {
                    report.removed.push((kind, public_id));
                    continue;
                }
                Ok(false) => "service did not confirm the removal".to_string(),
                Err(e) => e.to_string(),
            };
            tracing::warn!(%kind, public_id = %public_id, error = %failure, "delete failed");
            report.failed.push(DeleteFailure {
                kind,
                public_id,
                message: failure,
            });
        }

        tracing::info!(
            state = %ReconcileState::Report,
            removed = report.removed.len(),
            failed = report.failed.len(),
            "reconciliation finished"
        );
        Ok(report)
    }
}

/// Delete media objects no stored record refers to
pub async fn collect_orphaned_media(
    storages: &MediaStorages,
    references: &dyn MediaReferences,
    exclude_paths: &[String],
    confirmation: &Confirmation,
) -> AssetResult<ReconcileReport> {
    tracing::debug!(state = %ReconcileState::CollectReferenced, "collecting media references");
    let referenced = references.referenced_names().await?;
    let prefix = storages.config().current().prefix.clone();
    let exclude_prefixes = exclude_paths
        .iter()
        .map(|path| prepend_prefix(&prefix, path))
        .collect();

    Reconciler::new(storages, references.resource_kinds(), referenced)
        .with_exclude_prefixes(exclude_prefixes)
        .run(confirmation)
        .await
}

/// Delete static objects the manifest no longer maps to. With
/// `keep_unhashed` the unhashed copies of current files are kept too.
pub async fn collect_redundant_static(
    hashed: &HashedStaticStorage,
    confirmation: &Confirmation,
    keep_unhashed: bool,
) -> AssetResult<ReconcileReport> {
    tracing::debug!(state = %ReconcileState::CollectReferenced, "reading manifest");
    let manifest = hashed
        .load_manifest()
        .await?
        .ok_or_else(|| AssetError::manifest_missing(hashed.manifest_store().path()))?;

    let storage = hashed.storage();
    let mut needed: BTreeSet<String> = manifest.values().map(String::from).collect();
    if keep_unhashed {
        needed.extend(manifest.keys().map(String::from));
    }
    let referenced = needed
        .iter()
        .map(|name| storage.public_id_for(&clean_name(name)))
        .collect();

    Reconciler::new(storage, ResourceKind::ALL, referenced)
        .run(confirmation)
        .await
}
