//! Retrofit orchestrator scenarios over the in-memory mocks.

use std::sync::Arc;

use url::Url;

use crate::config::Config;
use crate::models::PickRecord;
use crate::services::retrofit::RetrofitService;
use crate::testing::{MockMetadataStore, MockObjectStore, StubResizer};

fn test_config() -> Config {
    Config {
        bucket: "boxoffice-media".to_string(),
        public_base_url: Url::parse("https://media.example.com").unwrap(),
        legacy_base_url: Url::parse("https://legacy.example.com/storage/v1").unwrap(),
        region: "auto".to_string(),
    }
}

fn pick(
    id: i64,
    file_path: &str,
    file_name: &str,
    thumbnail_url: Option<&str>,
    preview_url: Option<&str>,
) -> PickRecord {
    PickRecord {
        id,
        file_path: file_path.to_string(),
        file_name: file_name.to_string(),
        content_type: Some("image/jpeg".to_string()),
        file_size: Some(2048),
        thumbnail_url: thumbnail_url.map(str::to_string),
        preview_url: preview_url.map(str::to_string),
    }
}

struct Fixture {
    store: Arc<MockObjectStore>,
    meta: Arc<MockMetadataStore>,
    resizer: Arc<StubResizer>,
}

impl Fixture {
    fn new() -> Self {
        Self {
            store: Arc::new(MockObjectStore::new("https://media.example.com")),
            meta: Arc::new(MockMetadataStore::new()),
            resizer: Arc::new(StubResizer::new()),
        }
    }

    fn service(&self) -> RetrofitService {
        RetrofitService::new(
            self.store.clone(),
            self.meta.clone(),
            self.resizer.clone(),
            &test_config(),
        )
    }
}

#[tokio::test]
async fn current_derivatives_skip_without_any_io() {
    let fx = Fixture::new();
    for id in 1..=3 {
        fx.meta.add_pick(pick(
            id,
            "https://media.example.com/picks/1700000000000-a.jpg",
            "a.jpg",
            Some("https://media.example.com/picks/1700000000001-a_thumb.webp"),
            Some("https://media.example.com/picks/1700000000002-a_preview.webp"),
        ));
    }

    let retrofit = fx.service().run(None, None).await.unwrap();

    assert_eq!(retrofit.total, 3);
    assert_eq!(retrofit.skipped, 3);
    assert_eq!(retrofit.thumbnails_created, 0);
    assert_eq!(retrofit.previews_created, 0);
    // the distinguishing property: zero storage traffic on a re-run
    assert!(fx.store.calls().is_empty());
    assert!(fx.resizer.requested_dimensions().is_empty());
}

#[tokio::test]
async fn legacy_thumbnail_with_current_preview_only_replaces_the_thumbnail() {
    let fx = Fixture::new();
    let original_url = "https://media.example.com/picks/1700000000000-gala.jpg";
    let old_thumb = "https://media.example.com/picks/1700000000001-gala_thumb.jpg";
    let preview = "https://media.example.com/picks/1700000000002-gala_preview.webp";
    fx.meta
        .add_pick(pick(1, original_url, "gala.jpg", Some(old_thumb), Some(preview)));
    fx.store.insert_object(original_url, b"original jpeg bytes");

    let retrofit = fx.service().run(None, None).await.unwrap();

    assert_eq!(retrofit.thumbnails_created, 1);
    assert_eq!(retrofit.previews_created, 0);
    assert!(retrofit.errors.is_empty());

    let updated = &fx.meta.picks()[0];
    // preview untouched, thumbnail rewritten to a WebP derivative
    assert_eq!(updated.preview_url.as_deref(), Some(preview));
    let new_thumb = updated.thumbnail_url.as_deref().unwrap();
    assert!(new_thumb.starts_with("https://media.example.com/picks/"));
    assert!(new_thumb.ends_with(".webp"));
    assert_ne!(new_thumb, old_thumb);

    // the superseded thumbnail key went to the delete step exactly once
    assert_eq!(
        fx.store.deleted_keys(),
        vec!["picks/1700000000001-gala_thumb.jpg".to_string()]
    );

    // only the thumbnail bound was requested
    assert_eq!(fx.resizer.requested_dimensions(), vec![320]);
}

#[tokio::test]
async fn missing_derivatives_create_both_and_delete_nothing() {
    let fx = Fixture::new();
    let original_url = "https://media.example.com/picks/1700000000000-foyer.jpg";
    fx.meta.add_pick(pick(1, original_url, "foyer.jpg", None, None));
    fx.store.insert_object(original_url, b"original");

    let retrofit = fx.service().run(None, None).await.unwrap();

    assert_eq!(retrofit.thumbnails_created, 1);
    assert_eq!(retrofit.previews_created, 1);
    assert_eq!(retrofit.skipped, 0);
    assert_eq!(fx.resizer.requested_dimensions(), vec![320, 1600]);
    assert!(fx.store.deleted_keys().is_empty());

    let updated = &fx.meta.picks()[0];
    assert!(updated.thumbnail_url.as_deref().unwrap().ends_with(".webp"));
    assert!(updated.preview_url.as_deref().unwrap().ends_with(".webp"));
}

#[tokio::test]
async fn rerun_after_retrofit_is_a_no_op() {
    let fx = Fixture::new();
    let original_url = "https://media.example.com/picks/1700000000000-foyer.jpg";
    fx.meta.add_pick(pick(1, original_url, "foyer.jpg", None, None));
    fx.store.insert_object(original_url, b"original");

    let first = fx.service().run(None, None).await.unwrap();
    assert_eq!(first.thumbnails_created, 1);
    let calls_after_first = fx.store.calls().len();

    let second = fx.service().run(None, None).await.unwrap();
    assert_eq!(second.skipped, 1);
    assert_eq!(second.thumbnails_created, 0);
    assert_eq!(second.previews_created, 0);
    assert_eq!(fx.store.calls().len(), calls_after_first);
}

#[tokio::test]
async fn metadata_failure_after_upload_is_an_error_not_a_creation() {
    let fx = Fixture::new();
    let original_url = "https://media.example.com/picks/1700000000000-gala.jpg";
    let old_thumb = "https://media.example.com/picks/1700000000001-gala_thumb.jpg";
    fx.meta.add_pick(pick(
        1,
        original_url,
        "gala.jpg",
        Some(old_thumb),
        Some("https://media.example.com/picks/1700000000002-gala_preview.webp"),
    ));
    fx.store.insert_object(original_url, b"original");
    fx.meta.fail_updates();

    let retrofit = fx.service().run(None, None).await.unwrap();

    assert_eq!(retrofit.thumbnails_created, 0);
    assert_eq!(retrofit.errors.len(), 1);
    assert!(retrofit.errors[0].contains("metadata update failed"));
    // the upload happened, the superseded file must not be deleted
    assert_eq!(fx.store.call_count("put_object"), 1);
    assert!(fx.store.deleted_keys().is_empty());
}

#[tokio::test]
async fn fetch_failure_is_a_per_item_error() {
    let fx = Fixture::new();
    // legacy path, and no legacy bytes seeded
    fx.meta
        .add_pick(pick(1, "images/lost.jpg", "lost.jpg", None, None));

    let retrofit = fx.service().run(None, None).await.unwrap();

    assert_eq!(retrofit.errors.len(), 1);
    assert!(retrofit.errors[0].starts_with("lost.jpg: "));
    assert_eq!(retrofit.thumbnails_created, 0);
    assert_eq!(
        retrofit.total,
        retrofit.skipped + retrofit.errors.len()
    );
}

#[tokio::test]
async fn resize_failure_is_a_per_item_error() {
    let fx = Fixture::new();
    let original_url = "https://media.example.com/picks/1700000000000-foyer.jpg";
    fx.meta.add_pick(pick(1, original_url, "foyer.jpg", None, None));
    fx.store.insert_object(original_url, b"original");
    fx.resizer.fail();

    let retrofit = fx.service().run(None, None).await.unwrap();

    assert_eq!(retrofit.errors.len(), 1);
    assert_eq!(retrofit.thumbnails_created, 0);
    assert_eq!(fx.store.call_count("put_object"), 0);
}

#[tokio::test]
async fn superseded_derivative_on_legacy_storage_is_removed_there() {
    let fx = Fixture::new();
    let original_url = "https://media.example.com/picks/1700000000000-gala.jpg";
    // pre-migration thumbnail that never moved off legacy storage
    let legacy_thumb = "images/derived/gala_thumb.jpg";
    fx.meta.add_pick(pick(
        1,
        original_url,
        "gala.jpg",
        Some(legacy_thumb),
        Some("https://media.example.com/picks/1700000000002-gala_preview.webp"),
    ));
    fx.store.insert_object(original_url, b"original");

    let retrofit = fx.service().run(None, None).await.unwrap();

    assert_eq!(retrofit.thumbnails_created, 1);
    assert!(fx.store.deleted_keys().is_empty());
    assert_eq!(fx.meta.removed_legacy(), vec![legacy_thumb.to_string()]);
}

#[tokio::test]
async fn failed_superseded_delete_is_a_warning() {
    let fx = Fixture::new();
    let original_url = "https://media.example.com/picks/1700000000000-gala.jpg";
    let old_thumb = "https://media.example.com/picks/1700000000001-gala_thumb.jpg";
    fx.meta.add_pick(pick(
        1,
        original_url,
        "gala.jpg",
        Some(old_thumb),
        Some("https://media.example.com/picks/1700000000002-gala_preview.webp"),
    ));
    fx.store.insert_object(original_url, b"original");
    fx.store.fail_deletes();

    let retrofit = fx.service().run(None, None).await.unwrap();

    // the metadata write stands, the failure only surfaces as a warning
    assert_eq!(retrofit.thumbnails_created, 1);
    assert!(retrofit.errors.is_empty());
    assert_eq!(retrofit.cleanup_warnings.len(), 1);
    assert!(retrofit.cleanup_warnings[0].starts_with("gala.jpg: "));
}
