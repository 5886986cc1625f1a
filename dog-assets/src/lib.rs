//! # dog-assets: remote asset storage with content-hash deduplication
//!
//! `dog-assets` mirrors a local file namespace (uploaded media and build-time
//! static assets) onto a tag-addressable remote blob service such as
//! Cloudinary. Static files are stored under content-hashed names, uploads are
//! skipped when the remote copy already has the same content, and a cleanup
//! pass deletes remote objects nothing refers to anymore.
//!
//! ## Key Features
//!
//! - **Per-kind media storages**: image, raw and video objects, each tagged so they can be enumerated later
//! - **Deduplicating static storage**: remote ETags are compared with the local MD5 fingerprint before uploading
//! - **Hashed names and manifest**: `css/site.css` is stored as `css/site.3f2a9c1b0d4e.css` and the mapping is kept locally
//! - **Stylesheet rewriting**: `url()` references inside collected CSS point at the hashed names of their targets
//! - **Reconciliation**: orphaned media and redundant static objects are found by set difference and deleted after confirmation
//! - **Service agnostic**: everything talks to the [`RemoteApi`] trait; [`CloudinaryClient`] and [`MemoryRemote`] implement it
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use dog_assets::prelude::*;
//!
//! # #[tokio::main]
//! # async fn main() -> AssetResult<()> {
//! let remote = Arc::new(MemoryRemote::new());
//! let config = ConfigHandle::new(AssetsConfig::new("demo", "key", "secret"))?;
//!
//! // Media goes to the storage of its kind
//! let storages = MediaStorages::new(remote.clone(), config.clone());
//! let public_id = storages
//!     .save_asset(Asset::new("avatars/ada.png", ResourceKind::Image, &b"png"[..]))
//!     .await?;
//!
//! // Nothing refers to the avatar anymore, so cleanup removes it
//! let references = ReferenceSet::new([ResourceKind::Image], Vec::<String>::new());
//! let report = collect_orphaned_media(&storages, &references, &[], &Confirmation::NoInput).await?;
//! assert_eq!(report.removed_ids(), vec![public_id.as_str()]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────┐
//! │  Reconciler / collectstatic  │  ← cleanup and collection runs
//! ├──────────────────────────────┤
//! │  HashedStaticStorage         │  ← hashed names + manifest
//! ├──────────────────────────────┤
//! │  MediaStorage / StaticStorage│  ← per-object operations
//! ├──────────────────────────────┤
//! │  RemoteApi / RemoteIndex     │  ← service calls and paginated listing
//! └──────────────────────────────┘
//! ```

pub mod cloudinary;
mod config;
pub mod confirm;
pub mod css;
mod error;
pub mod finder;
pub mod fingerprint;
pub mod hashed;
pub mod index;
pub mod manifest;
pub mod memory;
pub mod reconcile;
pub mod remote;
pub mod report;
pub mod static_files;
pub mod storage;
mod types;
pub mod validators;

// Re-export main types for clean API
pub use cloudinary::CloudinaryClient;
pub use config::{AssetsConfig, ConfigHandle, EtagMatch, SignatureAlgorithm};
pub use confirm::{Confirmation, Prompt, ScriptedPrompt, StdinPrompt};
pub use error::{AssetError, AssetResult};
pub use finder::StaticFinder;
pub use fingerprint::{fingerprint, hashed_name, ContentFingerprint};
pub use hashed::{CollectOptions, CollectReport, HashedStaticStorage, PostProcessOptions, PostProcessed};
pub use index::RemoteIndex;
pub use manifest::{Manifest, ManifestStore};
pub use memory::{MemoryRemote, RemoteCalls};
pub use reconcile::{
    collect_orphaned_media, collect_redundant_static, orphans, MediaReferences, ReconcileState,
    ReconcileTarget, Reconciler, ReferenceSet,
};
pub use remote::{
    DestroyResult, ListFilter, ListQuery, ObjectHead, RemoteApi, RemoteResource, ResourcePage,
    UploadRequest, UploadResult,
};
pub use report::{DeleteFailure, ReconcileOutcome, ReconcileReport};
pub use static_files::{SaveOutcome, StaticStorage};
pub use storage::{MediaStorage, MediaStorages};
pub use types::{clean_name, normalise_name, prepend_prefix, Asset, ResourceKind};
pub use validators::validate_video;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        collect_orphaned_media, collect_redundant_static, Asset, AssetError, AssetResult,
        AssetsConfig, ConfigHandle, Confirmation, HashedStaticStorage, MediaStorages,
        MemoryRemote, ReferenceSet, RemoteApi, ResourceKind, StaticStorage,
    };
}
