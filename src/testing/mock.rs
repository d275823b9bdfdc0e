//! In-memory mocks with call recording.
//!
//! Every mock keeps a log of [`RecordedCall`]s and offers `fail_*` switches
//! to inject the failure modes the orchestrators must survive.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::models::{DocumentRecord, PickRecord, StorageSettings};
use crate::services::metadata::{MetadataError, MetadataStore};
use crate::services::object_store::{ObjectStore, StorageError, public_url_for_key};
use crate::services::resize::{ImageResizer, ResizeError};

/// Record of a method call on a mock.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    /// Method name, e.g. `"put_object"`
    pub method: String,
    /// Stringified arguments
    pub args: Vec<String>,
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

// ============================================================================
// MockObjectStore
// ============================================================================

/// Object store double. Uploads land in an in-memory map keyed by public
/// URL; fetches read from the same map.
pub struct MockObjectStore {
    public_base: String,
    calls: Mutex<Vec<RecordedCall>>,
    objects: Mutex<HashMap<String, Vec<u8>>>,
    fail_put_substrings: Mutex<Vec<String>>,
    fail_deletes: Mutex<bool>,
}

impl MockObjectStore {
    pub fn new(public_base: &str) -> Self {
        Self {
            public_base: public_base.trim_end_matches('/').to_string(),
            calls: Mutex::new(Vec::new()),
            objects: Mutex::new(HashMap::new()),
            fail_put_substrings: Mutex::new(Vec::new()),
            fail_deletes: Mutex::new(false),
        }
    }

    /// Seed a fetchable object at the given URL.
    pub fn insert_object(&self, url: &str, bytes: &[u8]) {
        lock(&self.objects).insert(url.to_string(), bytes.to_vec());
    }

    /// Make every `put_object` whose key contains `fragment` fail.
    pub fn fail_puts_containing(&self, fragment: &str) {
        lock(&self.fail_put_substrings).push(fragment.to_string());
    }

    /// Make `delete_objects` report zero deletions.
    pub fn fail_deletes(&self) {
        *lock(&self.fail_deletes) = true;
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    /// Number of calls of the given method.
    pub fn call_count(&self, method: &str) -> usize {
        lock(&self.calls).iter().filter(|c| c.method == method).count()
    }

    /// Keys passed to `put_object`, in order.
    pub fn put_keys(&self) -> Vec<String> {
        lock(&self.calls)
            .iter()
            .filter(|c| c.method == "put_object")
            .filter_map(|c| c.args.first().cloned())
            .collect()
    }

    /// Keys passed to `delete_objects`, in order, one entry per key.
    pub fn deleted_keys(&self) -> Vec<String> {
        lock(&self.calls)
            .iter()
            .filter(|c| c.method == "delete_objects")
            .flat_map(|c| c.args.clone())
            .collect()
    }

    fn record(&self, method: &str, args: Vec<String>) {
        lock(&self.calls).push(RecordedCall {
            method: method.to_string(),
            args,
        });
    }
}

#[async_trait]
impl ObjectStore for MockObjectStore {
    async fn put_object(
        &self,
        key: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<String, StorageError> {
        self.record("put_object", vec![key.to_string(), content_type.to_string()]);
        if lock(&self.fail_put_substrings)
            .iter()
            .any(|fragment| key.contains(fragment.as_str()))
        {
            return Err(StorageError::UploadFailed {
                status: 500,
                body: "injected upload failure".to_string(),
            });
        }
        let url = public_url_for_key(&self.public_base, key);
        lock(&self.objects).insert(url.clone(), bytes.to_vec());
        Ok(url)
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, StorageError> {
        self.record("fetch", vec![url.to_string()]);
        lock(&self.objects)
            .get(url)
            .cloned()
            .ok_or_else(|| StorageError::FetchFailed {
                url: url.to_string(),
                status: 404,
            })
    }

    async fn delete_objects(&self, keys: &[String]) -> usize {
        self.record("delete_objects", keys.to_vec());
        if *lock(&self.fail_deletes) { 0 } else { keys.len() }
    }
}

// ============================================================================
// MockMetadataStore
// ============================================================================

/// Metadata store double over in-memory rows.
///
/// The listing methods return every row regardless of the host argument, so
/// tests exercise the orchestrators' defensive re-checks rather than the SQL
/// pre-filter.
#[derive(Default)]
pub struct MockMetadataStore {
    settings: Mutex<Option<StorageSettings>>,
    documents: Mutex<Vec<DocumentRecord>>,
    picks: Mutex<Vec<PickRecord>>,
    legacy_files: Mutex<HashMap<String, Vec<u8>>>,
    removed_legacy: Mutex<Vec<String>>,
    fail_updates: Mutex<bool>,
    fail_legacy_removes: Mutex<bool>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a complete, valid settings row.
    pub fn set_settings(&self, endpoint: &str, access_key_id: &str, secret_access_key: &str) {
        *lock(&self.settings) = Some(StorageSettings {
            endpoint: Some(endpoint.to_string()),
            access_key_id: Some(access_key_id.to_string()),
            secret_access_key: Some(secret_access_key.to_string()),
        });
    }

    pub fn add_document(&self, document: DocumentRecord) {
        lock(&self.documents).push(document);
    }

    pub fn add_pick(&self, pick: PickRecord) {
        lock(&self.picks).push(pick);
    }

    /// Seed a downloadable file on the legacy backend.
    pub fn add_legacy_file(&self, path: &str, bytes: &[u8]) {
        lock(&self.legacy_files).insert(path.to_string(), bytes.to_vec());
    }

    /// Make every metadata update fail.
    pub fn fail_updates(&self) {
        *lock(&self.fail_updates) = true;
    }

    /// Make every legacy delete fail.
    pub fn fail_legacy_removes(&self) {
        *lock(&self.fail_legacy_removes) = true;
    }

    pub fn documents(&self) -> Vec<DocumentRecord> {
        lock(&self.documents).clone()
    }

    pub fn picks(&self) -> Vec<PickRecord> {
        lock(&self.picks).clone()
    }

    /// Legacy paths removed so far, in order.
    pub fn removed_legacy(&self) -> Vec<String> {
        lock(&self.removed_legacy).clone()
    }

    pub fn call_count(&self, method: &str) -> usize {
        lock(&self.calls).iter().filter(|c| c.method == method).count()
    }

    fn record(&self, method: &str, args: Vec<String>) {
        lock(&self.calls).push(RecordedCall {
            method: method.to_string(),
            args,
        });
    }

    fn injected_update_failure(&self) -> Option<MetadataError> {
        if *lock(&self.fail_updates) {
            Some(MetadataError::Database(sqlx::Error::RowNotFound))
        } else {
            None
        }
    }
}

#[async_trait]
impl MetadataStore for MockMetadataStore {
    async fn storage_settings(&self) -> Result<Option<StorageSettings>, MetadataError> {
        self.record("storage_settings", vec![]);
        Ok(lock(&self.settings).clone())
    }

    async fn documents_not_on(&self, host: &str) -> Result<Vec<DocumentRecord>, MetadataError> {
        self.record("documents_not_on", vec![host.to_string()]);
        Ok(lock(&self.documents).clone())
    }

    async fn picks_not_on(&self, host: &str) -> Result<Vec<PickRecord>, MetadataError> {
        self.record("picks_not_on", vec![host.to_string()]);
        Ok(lock(&self.picks).clone())
    }

    async fn list_picks(&self) -> Result<Vec<PickRecord>, MetadataError> {
        self.record("list_picks", vec![]);
        Ok(lock(&self.picks).clone())
    }

    async fn set_document_path(&self, id: i64, file_path: &str) -> Result<(), MetadataError> {
        self.record("set_document_path", vec![id.to_string(), file_path.to_string()]);
        if let Some(error) = self.injected_update_failure() {
            return Err(error);
        }
        for document in lock(&self.documents).iter_mut() {
            if document.id == id {
                document.file_path = file_path.to_string();
            }
        }
        Ok(())
    }

    async fn set_pick_path(&self, id: i64, file_path: &str) -> Result<(), MetadataError> {
        self.record("set_pick_path", vec![id.to_string(), file_path.to_string()]);
        if let Some(error) = self.injected_update_failure() {
            return Err(error);
        }
        for pick in lock(&self.picks).iter_mut() {
            if pick.id == id {
                pick.file_path = file_path.to_string();
            }
        }
        Ok(())
    }

    async fn set_pick_derivatives(
        &self,
        id: i64,
        thumbnail_url: Option<&str>,
        preview_url: Option<&str>,
    ) -> Result<(), MetadataError> {
        self.record(
            "set_pick_derivatives",
            vec![
                id.to_string(),
                thumbnail_url.unwrap_or("-").to_string(),
                preview_url.unwrap_or("-").to_string(),
            ],
        );
        if let Some(error) = self.injected_update_failure() {
            return Err(error);
        }
        for pick in lock(&self.picks).iter_mut() {
            if pick.id == id {
                if let Some(thumb) = thumbnail_url {
                    pick.thumbnail_url = Some(thumb.to_string());
                }
                if let Some(preview) = preview_url {
                    pick.preview_url = Some(preview.to_string());
                }
            }
        }
        Ok(())
    }

    async fn fetch_legacy(&self, path: &str) -> Result<Vec<u8>, MetadataError> {
        self.record("fetch_legacy", vec![path.to_string()]);
        lock(&self.legacy_files)
            .get(path)
            .cloned()
            .ok_or_else(|| MetadataError::LegacyStatus {
                path: path.to_string(),
                status: 404,
            })
    }

    async fn remove_legacy(&self, path: &str) -> Result<(), MetadataError> {
        self.record("remove_legacy", vec![path.to_string()]);
        if *lock(&self.fail_legacy_removes) {
            return Err(MetadataError::LegacyStatus {
                path: path.to_string(),
                status: 503,
            });
        }
        lock(&self.removed_legacy).push(path.to_string());
        Ok(())
    }
}

// ============================================================================
// StubResizer
// ============================================================================

/// Resizer double producing deterministic placeholder bytes.
#[derive(Default)]
pub struct StubResizer {
    fail: Mutex<bool>,
    requested_dimensions: Mutex<Vec<u32>>,
}

impl StubResizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self) {
        *lock(&self.fail) = true;
    }

    /// `max_dimension` arguments seen so far, in order.
    pub fn requested_dimensions(&self) -> Vec<u32> {
        lock(&self.requested_dimensions).clone()
    }
}

#[async_trait]
impl ImageResizer for StubResizer {
    async fn resize(
        &self,
        bytes: &[u8],
        max_dimension: u32,
        quality: u8,
    ) -> Result<Vec<u8>, ResizeError> {
        lock(&self.requested_dimensions).push(max_dimension);
        if *lock(&self.fail) {
            return Err(ResizeError::Failed("injected resize failure".to_string()));
        }
        Ok(format!("webp:{max_dimension}:q{quality}:{}", bytes.len()).into_bytes())
    }
}
