use std::path::Path;
use std::sync::Arc;

use dog_assets::{
    collect_orphaned_media, collect_redundant_static, hashed_name, AssetError, AssetsConfig,
    CollectOptions, ConfigHandle, Confirmation, EtagMatch, HashedStaticStorage, MediaStorages,
    MemoryRemote, ReconcileOutcome, ReferenceSet, RemoteIndex, ResourceKind, ScriptedPrompt,
    StaticStorage,
};

/// Test factory functions
fn create_test_config() -> AssetsConfig {
    AssetsConfig::new("demo", "key", "secret")
}

fn create_media(remote: &Arc<MemoryRemote>, config: AssetsConfig) -> MediaStorages {
    MediaStorages::new(remote.clone(), ConfigHandle::new(config).unwrap())
}

fn create_hashed(remote: &Arc<MemoryRemote>, root: &Path, config: AssetsConfig) -> HashedStaticStorage {
    let config = config
        .with_manifest_root(root.join("manifest"))
        .with_static_dirs([root.join("static")]);
    let storage = StaticStorage::new(remote.clone(), ConfigHandle::new(config).unwrap());
    HashedStaticStorage::from_storage(storage)
}

fn write_source(root: &Path, name: &str, content: &str) {
    let path = root.join("static").join(name);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn hashed_only() -> CollectOptions {
    CollectOptions {
        upload_unhashed: false,
        dry_run: false,
    }
}

/// A1. Unchanged Content Is Uploaded Once
#[tokio::test]
async fn test_unchanged_content_is_uploaded_once() {
    let dir = tempfile::tempdir().unwrap();
    let remote = Arc::new(MemoryRemote::new());
    write_source(dir.path(), "style.css", "A");

    // Arrange: first collection stores the hashed file
    let storage = create_hashed(&remote, dir.path(), create_test_config());
    storage.collect(hashed_only()).await.unwrap();
    assert_eq!(remote.calls().uploads, 1);

    // Act: collect the same content again with a fresh storage
    remote.reset_calls();
    let storage = create_hashed(&remote, dir.path(), create_test_config());
    let report = storage.collect(hashed_only()).await.unwrap();

    // Assert: the ETag check found the identical copy
    assert_eq!(remote.calls().uploads, 0);
    assert_eq!(report.uploaded(), 0);
    let expected = format!("static/{}", hashed_name("style.css", b"A"));
    assert_eq!(storage.stored_name("style.css").await.unwrap(), expected);
}

/// A2. Changed Content Gets A New Hashed Name
#[tokio::test]
async fn test_changed_content_gets_new_hashed_name() {
    let dir = tempfile::tempdir().unwrap();
    let remote = Arc::new(MemoryRemote::new());
    write_source(dir.path(), "style.css", "A");
    create_hashed(&remote, dir.path(), create_test_config())
        .collect(hashed_only())
        .await
        .unwrap();

    // Act: edit the source and collect again
    write_source(dir.path(), "style.css", "B");
    remote.reset_calls();
    let storage = create_hashed(&remote, dir.path(), create_test_config());
    storage.collect(hashed_only()).await.unwrap();

    // Assert: exactly one upload, under the new name
    let old = format!("static/{}", hashed_name("style.css", b"A"));
    let new = format!("static/{}", hashed_name("style.css", b"B"));
    assert_ne!(old, new);
    assert_eq!(remote.calls().uploads, 1);
    assert!(remote.contains(ResourceKind::Raw, &old));
    assert!(remote.contains(ResourceKind::Raw, &new));
    assert_eq!(storage.stored_name("style.css").await.unwrap(), new);

    // Act: drop what the manifest no longer maps to
    let report = collect_redundant_static(&storage, &Confirmation::NoInput, false)
        .await
        .unwrap();

    // Assert: only the superseded copy is gone
    assert_eq!(report.removed_ids(), vec![old.as_str()]);
    assert!(!remote.contains(ResourceKind::Raw, &old));
    assert!(remote.contains(ResourceKind::Raw, &new));
}

/// A3. Unhashed Copies Survive Only When Asked
#[tokio::test]
async fn test_unhashed_copies_survive_only_when_asked() {
    let dir = tempfile::tempdir().unwrap();
    let remote = Arc::new(MemoryRemote::new());
    write_source(dir.path(), "img/logo.png", "png");
    write_source(dir.path(), "app.js", "js");

    let storage = create_hashed(&remote, dir.path(), create_test_config());
    storage
        .collect(CollectOptions {
            upload_unhashed: true,
            dry_run: false,
        })
        .await
        .unwrap();
    assert!(remote.contains(ResourceKind::Image, "static/img/logo"));
    assert!(remote.contains(ResourceKind::Raw, "static/app.js"));

    // Act: keep unhashed copies
    let report = collect_redundant_static(&storage, &Confirmation::NoInput, true)
        .await
        .unwrap();
    assert_eq!(report.outcome, ReconcileOutcome::NothingToDelete);

    // Act: drop unhashed copies
    let report = collect_redundant_static(&storage, &Confirmation::NoInput, false)
        .await
        .unwrap();

    // Assert: both kinds were reconciled and hashed copies kept
    let mut removed = report.removed.clone();
    removed.sort();
    assert_eq!(
        removed,
        vec![
            (ResourceKind::Image, "static/img/logo".to_string()),
            (ResourceKind::Raw, "static/app.js".to_string()),
        ]
    );
    let logo = hashed_name("img/logo.png", b"png");
    assert!(remote.contains(ResourceKind::Image, &format!("static/{}", logo.trim_end_matches(".png"))));
}

/// A4. Redundant Static Cleanup Requires A Manifest
#[tokio::test]
async fn test_redundant_static_requires_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let remote = Arc::new(MemoryRemote::new());
    remote.insert(ResourceKind::Raw, "static/app.js", &b"js"[..], &["static"]);
    let storage = create_hashed(&remote, dir.path(), create_test_config());

    // Absent manifest
    let err = collect_redundant_static(&storage, &Confirmation::NoInput, false)
        .await
        .unwrap_err();
    assert!(matches!(err, AssetError::ManifestMissing { .. }));
    assert!(err.to_string().ends_with("staticfiles.json. Run collectstatic first and try again."));
    assert_eq!(remote.calls().destroys, 0);

    // Present but empty manifest
    storage.save_manifest().await.unwrap();
    let report = collect_redundant_static(&storage, &Confirmation::NoInput, false)
        .await
        .unwrap();
    assert_eq!(report.removed_ids(), vec!["static/app.js"]);
}

/// B1. Unreferenced Media Is Removed
#[tokio::test]
async fn test_unreferenced_media_is_removed() {
    let remote = Arc::new(MemoryRemote::new());
    for id in ["media/a", "media/b", "media/c"] {
        remote.insert(ResourceKind::Image, id, &b"png"[..], &["media"]);
    }
    let storages = create_media(&remote, create_test_config());
    let references = ReferenceSet::new([ResourceKind::Image], ["media/a", "media/b"]);

    let report = collect_orphaned_media(&storages, &references, &[], &Confirmation::NoInput)
        .await
        .unwrap();

    assert_eq!(report.removed_ids(), vec!["media/c"]);
    assert_eq!(report.status_line(), "1 files have been deleted successfully.");
    assert_eq!(remote.public_ids(ResourceKind::Image), vec!["media/a", "media/b"]);
}

/// B2. Excluded Paths Are Never Removed
#[tokio::test]
async fn test_excluded_paths_are_never_removed() {
    let remote = Arc::new(MemoryRemote::new());
    remote.insert(ResourceKind::Image, "media/archive/old", &b"png"[..], &["media"]);
    remote.insert(ResourceKind::Image, "media/x", &b"png"[..], &["media"]);
    let storages = create_media(&remote, create_test_config());
    let references = ReferenceSet::new([ResourceKind::Image], Vec::<String>::new());

    let report = collect_orphaned_media(
        &storages,
        &references,
        &["archive/".to_string()],
        &Confirmation::NoInput,
    )
    .await
    .unwrap();

    assert_eq!(report.removed_ids(), vec!["media/x"]);
    assert!(remote.contains(ResourceKind::Image, "media/archive/old"));
}

/// B3. Declined Confirmation Deletes Nothing
#[tokio::test]
async fn test_declined_confirmation_deletes_nothing() {
    let remote = Arc::new(MemoryRemote::new());
    remote.insert(ResourceKind::Raw, "media/a.txt", &b"a"[..], &["media"]);
    remote.insert(ResourceKind::Raw, "media/b.txt", &b"b"[..], &["media"]);
    let storages = create_media(&remote, create_test_config());
    let references = ReferenceSet::new([ResourceKind::Raw], Vec::<String>::new());

    let prompt = Arc::new(ScriptedPrompt::new(["no"]));
    let report = collect_orphaned_media(
        &storages,
        &references,
        &[],
        &Confirmation::with_prompt(prompt.clone()),
    )
    .await
    .unwrap();

    assert_eq!(report.outcome, ReconcileOutcome::Declined { pending: 2 });
    assert_eq!(report.status_line(), "As ordered, no file has been deleted.");
    assert_eq!(remote.calls().destroys, 0);
    let asked = prompt.asked();
    assert_eq!(asked.len(), 1);
    assert!(asked[0].starts_with("2 files will be deleted:"));
}

/// B4. Affirmed Confirmation Deletes Every Orphan
#[tokio::test]
async fn test_affirmed_confirmation_deletes_every_orphan() {
    let remote = Arc::new(MemoryRemote::new());
    remote.insert(ResourceKind::Raw, "media/a.txt", &b"a"[..], &["media"]);
    remote.insert(ResourceKind::Video, "media/clip", &b"v"[..], &["media"]);
    let storages = create_media(&remote, create_test_config());
    let references = ReferenceSet::new([ResourceKind::Raw, ResourceKind::Video], Vec::<String>::new());

    let report = collect_orphaned_media(
        &storages,
        &references,
        &[],
        &Confirmation::with_prompt(ScriptedPrompt::new(["yes\n"])),
    )
    .await
    .unwrap();

    assert_eq!(report.removed_count(), 2);
    assert_eq!(remote.calls().destroys, 2);
    assert!(report.is_success());
}

/// B5. Nothing To Delete Skips The Prompt
#[tokio::test]
async fn test_nothing_to_delete_skips_prompt() {
    let remote = Arc::new(MemoryRemote::new());
    remote.insert(ResourceKind::Image, "media/a", &b"png"[..], &["media"]);
    let storages = create_media(&remote, create_test_config());
    let references = ReferenceSet::new([ResourceKind::Image], ["media/a"]);

    let prompt = Arc::new(ScriptedPrompt::new(["yes"]));
    let report = collect_orphaned_media(
        &storages,
        &references,
        &[],
        &Confirmation::with_prompt(prompt.clone()),
    )
    .await
    .unwrap();

    assert_eq!(report.status_line(), "There is no file to delete.");
    assert!(prompt.asked().is_empty());
}

/// B6. A Failed Delete Does Not Stop The Run
#[tokio::test]
async fn test_failed_delete_does_not_stop_run() {
    let remote = Arc::new(MemoryRemote::new());
    for id in ["media/a", "media/b", "media/c"] {
        remote.insert(ResourceKind::Image, id, &b"png"[..], &["media"]);
    }
    remote.fail_next_destroy("media/b");
    let storages = create_media(&remote, create_test_config());
    let references = ReferenceSet::new([ResourceKind::Image], Vec::<String>::new());

    let report = collect_orphaned_media(&storages, &references, &[], &Confirmation::NoInput)
        .await
        .unwrap();

    assert_eq!(report.removed_ids(), vec!["media/a", "media/c"]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].public_id, "media/b");
    assert!(!report.is_success());
}

/// B7. Objects Under Another Tag Are Left Alone
#[tokio::test]
async fn test_objects_under_other_tag_are_left_alone() {
    let remote = Arc::new(MemoryRemote::new());
    remote.insert(ResourceKind::Image, "media/mine", &b"png"[..], &["media"]);
    remote.insert(ResourceKind::Image, "media/theirs", &b"png"[..], &["other-app"]);
    let storages = create_media(&remote, create_test_config());
    let references = ReferenceSet::new([ResourceKind::Image], Vec::<String>::new());

    let report = collect_orphaned_media(&storages, &references, &[], &Confirmation::NoInput)
        .await
        .unwrap();

    assert_eq!(report.removed_ids(), vec!["media/mine"]);
    assert!(remote.contains(ResourceKind::Image, "media/theirs"));
}

/// C1. Large Listings Follow Every Cursor
#[tokio::test]
async fn test_large_listing_follows_every_cursor() {
    let remote = Arc::new(MemoryRemote::new());
    for i in 0..1200 {
        remote.insert(ResourceKind::Raw, format!("media/{i:04}.txt"), &b"x"[..], &["media"]);
    }

    let listed = RemoteIndex::new(remote.clone())
        .list_by_tag(ResourceKind::Raw, "media")
        .await
        .unwrap();

    assert_eq!(listed.len(), 1200);
    assert_eq!(remote.calls().list_requests, 3);
}

/// C2. Server Page Size Caps Requested Batches
#[tokio::test]
async fn test_server_page_size_caps_requested_batches() {
    let remote = Arc::new(MemoryRemote::with_page_size(100));
    for i in 0..250 {
        remote.insert(ResourceKind::Image, format!("media/{i:03}"), &b"x"[..], &["media"]);
    }
    let storages = create_media(&remote, create_test_config());

    let listed = storages.get(ResourceKind::Image).list_tagged().await.unwrap();

    assert_eq!(listed.len(), 250);
    assert_eq!(remote.calls().list_requests, 3);
}

/// D1. Prefix ETag Policy Accepts The Short Fingerprint
#[tokio::test]
async fn test_prefix_etag_policy() {
    let remote = Arc::new(MemoryRemote::new());
    let config = ConfigHandle::new(create_test_config().with_etag_match(EtagMatch::Prefix)).unwrap();
    let storage = StaticStorage::new(remote.clone(), config);
    remote.insert(ResourceKind::Raw, "static/app.js", &b"js"[..], &["static"]);

    assert!(storage.exists_with_etag("app.js", b"js").await.unwrap());
    assert!(!storage.exists_with_etag("app.js", b"other").await.unwrap());
    assert!(!storage.save_with_outcome("app.js", &b"js"[..]).await.unwrap().uploaded);
    assert_eq!(remote.calls().uploads, 0);
}

/// D2. Reloaded Configuration Applies To Existing Storages
#[tokio::test]
async fn test_reloaded_configuration_applies_to_existing_storages() {
    let remote = Arc::new(MemoryRemote::new());
    let config = ConfigHandle::new(create_test_config()).unwrap();
    let storages = MediaStorages::new(remote.clone(), config.clone());

    config.reload(create_test_config().with_media_tag("fresh").with_prefix("uploads")).unwrap();
    let public_id = storages
        .get(ResourceKind::Raw)
        .save("notes.txt", &b"n"[..])
        .await
        .unwrap();

    assert!(public_id.starts_with("uploads/notes_"), "{public_id}");
    let tagged = RemoteIndex::new(remote.clone())
        .list_by_tag(ResourceKind::Raw, "fresh")
        .await
        .unwrap();
    assert_eq!(tagged, vec![public_id]);
}
