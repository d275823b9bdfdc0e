//! Job entry points
//!
//! The dashboard triggers these directly. Each entry point resolves the
//! operator credentials, builds a signed storage client for the run, and
//! drives the orchestrator; the caller gets the finished report back and may
//! watch progress through the channel while the job runs.
//!
//! Both jobs are idempotent: a migration only sees rows still pointing at
//! legacy storage, and a retrofit skips images whose derivatives are already
//! current.

use std::sync::Arc;

use tokio::sync::watch;

use crate::config::Config;

use super::credentials;
use super::metadata::MetadataStore;
use super::migration::{MigrationError, MigrationReport, MigrationService};
use super::object_store::S3CompatStore;
use super::progress::ProgressSender;
use super::resize::ImageResizer;
use super::retrofit::{RetrofitError, RetrofitReport, RetrofitService};

/// Move every legacy-hosted document and pick to the S3-compatible backend.
pub async fn run_migration(
    meta: Arc<dyn MetadataStore>,
    config: Config,
    progress: Option<ProgressSender>,
    cancel: Option<watch::Receiver<bool>>,
) -> Result<MigrationReport, MigrationError> {
    let credentials = credentials::resolve(meta.as_ref()).await?;
    let store = Arc::new(S3CompatStore::new(credentials, config.clone())?);
    MigrationService::new(store, meta, &config)
        .run(progress.as_ref(), cancel)
        .await
}

/// Backfill missing or pre-WebP thumbnail/preview derivatives for all picks.
pub async fn run_retrofit(
    meta: Arc<dyn MetadataStore>,
    resizer: Arc<dyn ImageResizer>,
    config: Config,
    progress: Option<ProgressSender>,
    cancel: Option<watch::Receiver<bool>>,
) -> Result<RetrofitReport, RetrofitError> {
    let credentials = credentials::resolve(meta.as_ref()).await?;
    let store = Arc::new(S3CompatStore::new(credentials, config.clone())?);
    RetrofitService::new(store, meta, resizer, &config)
        .run(progress.as_ref(), cancel)
        .await
}
