use std::fs;
use std::path::Path;
use std::sync::Arc;

use sitepub_cdn::{InvalidationOutcome, InvalidationSkip, MemoryCdn};
use sitepub_core::{Acl, ConfigFile, DeployConfig};
use sitepub_deploy::{publish, PublishError, PublishState, Services, Stage};
use sitepub_sync::backends::MemoryStore;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

struct Harness {
    store: Arc<MemoryStore>,
    cdn: Arc<MemoryCdn>,
    services: Services,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new("my-site"));
    let cdn = Arc::new(MemoryCdn::new());
    let services = Services {
        store: store.clone(),
        admin: store.clone(),
        cdn: cdn.clone(),
    };
    Harness {
        store,
        cdn,
        services,
    }
}

fn prebuilt_site(root: &Path) {
    let public = root.join("hugo").join("public");
    fs::create_dir_all(public.join("posts")).expect("mkdir");
    fs::write(public.join("index.html"), "<h1>home</h1>").expect("write");
    fs::write(public.join("404.html"), "gone").expect("write");
    fs::write(public.join("posts/first.html"), "first").expect("write");
}

fn resolve(root: &Path, layer: ConfigFile, dry_run: bool) -> DeployConfig {
    let layer = ConfigFile {
        bucket: Some("my-site".into()),
        ..layer
    };
    DeployConfig::resolve(root, layer, dry_run).expect("resolve")
}

#[cfg(unix)]
fn fake_generator(dir: &Path, body: &str) -> String {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-hugo");
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod");
    path.to_string_lossy().into_owned()
}

#[tokio::test]
#[cfg(unix)]
async fn private_build_syncs_privately_and_never_invalidates() {
    let tmp = TempDir::new().expect("tmp");
    let bin = TempDir::new().expect("bin");
    fs::create_dir_all(tmp.path().join("hugo")).expect("mkdir");
    // $4 is the --destination value.
    let generator = fake_generator(
        bin.path(),
        "mkdir -p \"$4\" && echo home > \"$4/index.html\" && echo gone > \"$4/404.html\"",
    );
    let config = resolve(
        tmp.path(),
        ConfigFile {
            generator: Some(generator),
            ..ConfigFile::default()
        },
        false,
    );
    let h = harness();

    let outputs = publish(&config, &h.services, &CancellationToken::new())
        .await
        .expect("publish");

    assert!(outputs.built);
    assert_eq!(outputs.sync.uploaded.len(), 2);
    assert_eq!(h.store.object("index.html").expect("index").acl, Acl::Private);

    let bucket = h.store.bucket_state();
    assert!(bucket.exists);
    assert!(bucket.object_writer);
    assert!(bucket.policy.is_none(), "private sites get no bucket policy");
    assert_eq!(bucket.website, Some(("index.html".into(), "404.html".into())));

    assert!(!outputs.cdn_enabled);
    assert!(h.cdn.invalidations().is_empty());
    assert_eq!(
        outputs.invalidation,
        Some(InvalidationOutcome::Skipped {
            reason: InvalidationSkip::Private
        })
    );
    assert_eq!(outputs.state, PublishState::Done { warning: None });
    assert_eq!(
        outputs.history.iter().map(|s| s.name()).collect::<Vec<_>>(),
        vec![
            "idle",
            "building",
            "built",
            "syncing",
            "synced",
            "invalidating",
            "skipped",
            "done"
        ]
    );
}

#[tokio::test]
async fn public_dry_run_skips_build_and_invalidation_but_still_syncs() {
    let tmp = TempDir::new().expect("tmp");
    prebuilt_site(tmp.path());
    let config = resolve(
        tmp.path(),
        ConfigFile {
            public: Some(true),
            build: Some(false),
            // Never spawned: dry-run wins.
            generator: Some("sitepub-no-such-generator".into()),
            ..ConfigFile::default()
        },
        true,
    );
    let h = harness();

    let outputs = publish(&config, &h.services, &CancellationToken::new())
        .await
        .expect("publish");

    assert!(!outputs.built);
    assert_eq!(outputs.sync.uploaded.len(), 3);
    for key in h.store.keys() {
        assert_eq!(h.store.object(&key).expect("object").acl, Acl::PublicRead);
    }
    assert!(h.store.bucket_state().policy.is_some());
    assert!(h.cdn.invalidations().is_empty());
    assert_eq!(
        outputs.invalidation,
        Some(InvalidationOutcome::Skipped {
            reason: InvalidationSkip::DryRun
        })
    );
    assert!(outputs.history.contains(&PublishState::Skipped {
        stage: Stage::Build,
        reason: "dry-run, skipping".into()
    }));
}

#[tokio::test]
#[cfg(unix)]
async fn build_failure_stops_before_any_store_call() {
    let tmp = TempDir::new().expect("tmp");
    let bin = TempDir::new().expect("bin");
    prebuilt_site(tmp.path());
    let generator = fake_generator(bin.path(), "echo 'ERROR template: missing partial' >&2\nexit 1");
    let config = resolve(
        tmp.path(),
        ConfigFile {
            public: Some(true),
            generator: Some(generator),
            ..ConfigFile::default()
        },
        false,
    );
    let h = harness();

    let err = publish(&config, &h.services, &CancellationToken::new())
        .await
        .unwrap_err();

    match &err {
        PublishError::Build(source) => {
            assert!(source.to_string().contains("missing partial"), "got: {source}")
        }
        other => panic!("expected Build, got {other:?}"),
    }
    assert_eq!(h.store.call_count(), 0);
    assert!(h.cdn.created().is_empty());
    assert!(h.cdn.invalidations().is_empty());
}

#[tokio::test]
async fn public_run_invalidates_once_per_run_with_fresh_reference() {
    let tmp = TempDir::new().expect("tmp");
    prebuilt_site(tmp.path());
    let config = resolve(
        tmp.path(),
        ConfigFile {
            public: Some(true),
            build: Some(false),
            ..ConfigFile::default()
        },
        false,
    );
    let h = harness();
    let cancel = CancellationToken::new();

    let first = publish(&config, &h.services, &cancel).await.expect("first");
    let second = publish(&config, &h.services, &cancel).await.expect("second");

    assert_eq!(first.distribution_id, second.distribution_id);
    assert_eq!(h.cdn.created().len(), 1);
    assert!(second.sync.uploaded.is_empty(), "second run is idempotent");

    let sent = h.cdn.invalidations();
    assert_eq!(sent.len(), 2);
    assert_ne!(sent[0].caller_reference, sent[1].caller_reference);
    assert!(matches!(
        second.invalidation,
        Some(InvalidationOutcome::Accepted { .. })
    ));
    assert!(second.cdn_url.starts_with("https://"));
    assert!(second.website_url.starts_with("http://"));
}

#[tokio::test]
async fn invalidation_failure_finishes_with_a_warning() {
    let tmp = TempDir::new().expect("tmp");
    prebuilt_site(tmp.path());
    let config = resolve(
        tmp.path(),
        ConfigFile {
            public: Some(true),
            build: Some(false),
            ..ConfigFile::default()
        },
        false,
    );
    let h = harness();
    h.cdn.fail_invalidations();

    let outputs = publish(&config, &h.services, &CancellationToken::new())
        .await
        .expect("invalidation failure is not fatal");

    assert!(outputs.invalidation.is_none());
    assert!(outputs
        .warning()
        .is_some_and(|w| w.contains("CreateInvalidation")));
    assert_eq!(h.store.keys().len(), 3);
}

#[tokio::test]
async fn sync_failure_halts_before_the_cdn() {
    let tmp = TempDir::new().expect("tmp");
    prebuilt_site(tmp.path());
    let config = resolve(
        tmp.path(),
        ConfigFile {
            public: Some(true),
            build: Some(false),
            ..ConfigFile::default()
        },
        false,
    );
    let h = harness();
    h.store.reject("index.html", 403);

    let err = publish(&config, &h.services, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, PublishError::Sync(_)), "got: {err:?}");
    assert!(h.cdn.created().is_empty());
    assert!(h.cdn.invalidations().is_empty());
}

#[tokio::test]
async fn interrupt_during_build_leaves_the_bucket_untouched() {
    let tmp = TempDir::new().expect("tmp");
    prebuilt_site(tmp.path());
    let config = resolve(
        tmp.path(),
        ConfigFile {
            public: Some(true),
            build: Some(false),
            ..ConfigFile::default()
        },
        false,
    );
    let h = harness();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = publish(&config, &h.services, &cancel).await.unwrap_err();
    assert!(matches!(err, PublishError::Interrupted), "got: {err:?}");
    assert_eq!(h.store.call_count(), 0);
    assert!(!h.store.bucket_state().exists);
    assert!(h.cdn.created().is_empty());
}
