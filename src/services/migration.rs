//! Legacy storage migration
//!
//! Moves document and pick files from the legacy storage backend to the
//! S3-compatible backend: download, upload, rewrite the metadata pointer,
//! then best-effort delete of the legacy copy. Items are processed
//! sequentially; a per-item failure is recorded and the run continues.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::Config;

use super::credentials::CredentialsError;
use super::metadata::{MetadataError, MetadataStore};
use super::object_store::{ObjectStore, StorageError, object_key};
use super::progress::{ProgressSender, report};

/// Fallback when a legacy row never recorded a content type.
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error(transparent)]
    Credentials(#[from] CredentialsError),

    #[error("metadata store error: {0}")]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Outcome of one migration run. Every candidate lands in exactly one of
/// `migrated`, `skipped`, or `errors`, so
/// `total == migrated + skipped + errors.len()` holds at the end of any run.
#[derive(Debug, Clone, Default)]
pub struct MigrationReport {
    pub total: usize,
    pub migrated: usize,
    pub skipped: usize,
    /// One `"<file name>: <message>"` entry per failed item, display-ready
    pub errors: Vec<String>,
    /// Legacy copies that survived a failed cleanup delete. Non-fatal; the
    /// migrated pointer is already authoritative.
    pub cleanup_warnings: Vec<String>,
}

/// Which record family a migration candidate belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordKind {
    Document,
    Pick,
}

impl RecordKind {
    fn folder(self) -> &'static str {
        match self {
            Self::Document => "documents",
            Self::Pick => "picks",
        }
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    id: i64,
    file_path: String,
    file_name: String,
    content_type: Option<String>,
    kind: RecordKind,
}

/// Sequential migration orchestrator.
pub struct MigrationService {
    store: Arc<dyn ObjectStore>,
    meta: Arc<dyn MetadataStore>,
    public_host: String,
}

impl MigrationService {
    pub fn new(store: Arc<dyn ObjectStore>, meta: Arc<dyn MetadataStore>, config: &Config) -> Self {
        Self {
            store,
            meta,
            public_host: config.public_host().to_string(),
        }
    }

    /// Run the migration over all candidates, one item at a time.
    ///
    /// Progress is reported after every item without blocking the loop;
    /// cancellation is honored between items, never mid-upload. Items not
    /// started when the run is cancelled count as skipped.
    pub async fn run(
        &self,
        progress: Option<&ProgressSender>,
        cancel: Option<watch::Receiver<bool>>,
    ) -> Result<MigrationReport, MigrationError> {
        let candidates = self.candidates().await?;
        let total = candidates.len();
        let mut migration = MigrationReport {
            total,
            ..Default::default()
        };

        info!(total, "starting legacy storage migration");

        for (index, item) in candidates.iter().enumerate() {
            if cancelled(&cancel) {
                info!(processed = index, "migration cancelled");
                migration.skipped += total - index;
                break;
            }

            self.migrate_item(item, &mut migration).await;
            report(progress, index + 1, total, &item.file_name);
        }

        info!(
            total = migration.total,
            migrated = migration.migrated,
            skipped = migration.skipped,
            errors = migration.errors.len(),
            "migration finished"
        );
        Ok(migration)
    }

    async fn candidates(&self) -> Result<Vec<Candidate>, MigrationError> {
        let documents = self.meta.documents_not_on(&self.public_host).await?;
        let picks = self.meta.picks_not_on(&self.public_host).await?;

        let mut candidates: Vec<Candidate> = documents
            .into_iter()
            .map(|d| Candidate {
                id: d.id,
                file_path: d.file_path,
                file_name: d.file_name,
                content_type: d.content_type,
                kind: RecordKind::Document,
            })
            .collect();
        candidates.extend(picks.into_iter().map(|p| Candidate {
            id: p.id,
            file_path: p.file_path,
            file_name: p.file_name,
            content_type: p.content_type,
            kind: RecordKind::Pick,
        }));
        Ok(candidates)
    }

    async fn migrate_item(&self, item: &Candidate, migration: &mut MigrationReport) {
        // The listing already excluded migrated rows; a hit here means the
        // row changed under us and there is nothing left to move.
        if item.file_path.contains(&self.public_host) {
            migration.skipped += 1;
            return;
        }

        let bytes = match self.meta.fetch_legacy(&item.file_path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(file = %item.file_name, error = %e, "legacy download failed");
                migration.errors.push(format!("{}: {e}", item.file_name));
                return;
            }
        };

        let key = object_key(item.kind.folder(), &item.file_name);
        let content_type = item.content_type.as_deref().unwrap_or(DEFAULT_CONTENT_TYPE);
        let public_url = match self.store.put_object(&key, &bytes, content_type).await {
            Ok(url) => url,
            Err(e) => {
                warn!(file = %item.file_name, error = %e, "upload failed");
                migration.errors.push(format!("{}: {e}", item.file_name));
                return;
            }
        };

        // The bytes exist remotely at this point. A failed pointer rewrite
        // must surface as an error, not as a silently half-migrated row.
        if let Err(e) = self.set_path(item, &public_url).await {
            warn!(file = %item.file_name, error = %e, "metadata update failed after upload");
            migration.errors.push(format!(
                "{}: uploaded but metadata update failed: {e}",
                item.file_name
            ));
            return;
        }

        // The new pointer is authoritative now; a failed legacy delete only
        // leaves an orphan behind.
        if let Err(e) = self.meta.remove_legacy(&item.file_path).await {
            warn!(file = %item.file_name, error = %e, "legacy copy not deleted");
            migration.cleanup_warnings.push(format!(
                "{}: legacy copy not deleted: {e}",
                item.file_name
            ));
        }

        migration.migrated += 1;
    }

    async fn set_path(&self, item: &Candidate, public_url: &str) -> Result<(), MetadataError> {
        match item.kind {
            RecordKind::Document => self.meta.set_document_path(item.id, public_url).await,
            RecordKind::Pick => self.meta.set_pick_path(item.id, public_url).await,
        }
    }
}

pub(crate) fn cancelled(cancel: &Option<watch::Receiver<bool>>) -> bool {
    cancel.as_ref().is_some_and(|rx| *rx.borrow())
}
