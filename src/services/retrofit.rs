//! Derivative retrofit
//!
//! Backfills WebP thumbnail/preview derivatives for picks. Each derivative
//! slot is classified once; images whose slots are both current are skipped
//! without any network I/O, which is what makes a re-run a no-op.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::Config;
use crate::models::PickRecord;

use super::credentials::CredentialsError;
use super::metadata::{MetadataError, MetadataStore};
use super::migration::cancelled;
use super::object_store::{ObjectStore, StorageError, key_for_public_url, object_key};
use super::progress::{ProgressSender, report};
use super::resize::{ImageResizer, WEBP_CONTENT_TYPE, WEBP_EXTENSION};

/// Longest-side bound for thumbnails (list views)
const THUMBNAIL_MAX_DIMENSION: u32 = 320;
/// Longest-side bound for previews (detail pages)
const PREVIEW_MAX_DIMENSION: u32 = 1600;
/// WebP encoding quality for both derivatives
const WEBP_QUALITY: u8 = 80;

#[derive(Debug, Error)]
pub enum RetrofitError {
    #[error(transparent)]
    Credentials(#[from] CredentialsError),

    #[error("metadata store error: {0}")]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Classification of one derivative slot, computed once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DerivativeState {
    /// Present and already WebP; nothing to do
    Current,
    /// Never generated
    Missing,
    /// Present in a pre-WebP format; carries the URL to delete after the
    /// replacement is recorded
    Legacy(String),
}

impl DerivativeState {
    pub fn needs_work(&self) -> bool {
        !matches!(self, Self::Current)
    }
}

/// Classify a derivative URL field.
pub fn classify(url: Option<&str>) -> DerivativeState {
    match url.map(str::trim) {
        None | Some("") => DerivativeState::Missing,
        Some(u) if u.ends_with(WEBP_EXTENSION) => DerivativeState::Current,
        Some(u) => DerivativeState::Legacy(u.to_string()),
    }
}

/// Outcome of one retrofit run. A single image can contribute to both
/// created counters; `total == processed + skipped + errors.len()` where
/// `processed` is the number of images that got at least one new derivative.
#[derive(Debug, Clone, Default)]
pub struct RetrofitReport {
    pub total: usize,
    pub thumbnails_created: usize,
    pub previews_created: usize,
    /// Images needing no work (both slots current)
    pub skipped: usize,
    /// One `"<file name>: <message>"` entry per failed image
    pub errors: Vec<String>,
    /// Superseded derivative files that survived a failed cleanup delete
    pub cleanup_warnings: Vec<String>,
}

/// Sequential retrofit orchestrator.
pub struct RetrofitService {
    store: Arc<dyn ObjectStore>,
    meta: Arc<dyn MetadataStore>,
    resizer: Arc<dyn ImageResizer>,
    public_base: String,
    public_host: String,
}

impl RetrofitService {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        meta: Arc<dyn MetadataStore>,
        resizer: Arc<dyn ImageResizer>,
        config: &Config,
    ) -> Self {
        Self {
            store,
            meta,
            resizer,
            public_base: config.public_base_url.as_str().to_string(),
            public_host: config.public_host().to_string(),
        }
    }

    /// Run the retrofit over all picks, one image at a time.
    pub async fn run(
        &self,
        progress: Option<&ProgressSender>,
        cancel: Option<watch::Receiver<bool>>,
    ) -> Result<RetrofitReport, RetrofitError> {
        let picks = self.meta.list_picks().await?;
        let total = picks.len();
        let mut retrofit = RetrofitReport {
            total,
            ..Default::default()
        };

        info!(total, "starting derivative retrofit");

        for (index, pick) in picks.iter().enumerate() {
            if cancelled(&cancel) {
                info!(processed = index, "retrofit cancelled");
                retrofit.skipped += total - index;
                break;
            }

            self.retrofit_item(pick, &mut retrofit).await;
            report(progress, index + 1, total, &pick.file_name);
        }

        info!(
            total = retrofit.total,
            thumbnails = retrofit.thumbnails_created,
            previews = retrofit.previews_created,
            skipped = retrofit.skipped,
            errors = retrofit.errors.len(),
            "retrofit finished"
        );
        Ok(retrofit)
    }

    async fn retrofit_item(&self, pick: &PickRecord, retrofit: &mut RetrofitReport) {
        let thumbnail_state = classify(pick.thumbnail_url.as_deref());
        let preview_state = classify(pick.preview_url.as_deref());

        if !thumbnail_state.needs_work() && !preview_state.needs_work() {
            retrofit.skipped += 1;
            return;
        }

        let original = match self.fetch_original(pick).await {
            Ok(bytes) => bytes,
            Err(message) => {
                warn!(file = %pick.file_name, error = %message, "original fetch failed");
                retrofit.errors.push(format!("{}: {message}", pick.file_name));
                return;
            }
        };

        let mut new_thumbnail = None;
        let mut new_preview = None;
        let mut superseded = Vec::new();

        if thumbnail_state.needs_work() {
            match self
                .build_derivative(&original, &pick.file_name, "thumb", THUMBNAIL_MAX_DIMENSION)
                .await
            {
                Ok(url) => {
                    if let DerivativeState::Legacy(old) = &thumbnail_state {
                        superseded.push(old.clone());
                    }
                    new_thumbnail = Some(url);
                }
                Err(message) => {
                    warn!(file = %pick.file_name, error = %message, "thumbnail generation failed");
                    retrofit.errors.push(format!("{}: {message}", pick.file_name));
                    return;
                }
            }
        }

        if preview_state.needs_work() {
            match self
                .build_derivative(&original, &pick.file_name, "preview", PREVIEW_MAX_DIMENSION)
                .await
            {
                Ok(url) => {
                    if let DerivativeState::Legacy(old) = &preview_state {
                        superseded.push(old.clone());
                    }
                    new_preview = Some(url);
                }
                Err(message) => {
                    warn!(file = %pick.file_name, error = %message, "preview generation failed");
                    retrofit.errors.push(format!("{}: {message}", pick.file_name));
                    return;
                }
            }
        }

        // Partial update: slots that needed no work are left untouched. An
        // uploaded derivative whose pointer never lands is an error, not a
        // creation.
        if let Err(e) = self
            .meta
            .set_pick_derivatives(pick.id, new_thumbnail.as_deref(), new_preview.as_deref())
            .await
        {
            warn!(file = %pick.file_name, error = %e, "metadata update failed after upload");
            retrofit.errors.push(format!(
                "{}: derivatives uploaded but metadata update failed: {e}",
                pick.file_name
            ));
            return;
        }

        if new_thumbnail.is_some() {
            retrofit.thumbnails_created += 1;
        }
        if new_preview.is_some() {
            retrofit.previews_created += 1;
        }

        // Only now, with the new pointers recorded, the old files are
        // deletable. Failures leave orphans, never inconsistent metadata.
        self.delete_superseded(pick, &superseded, retrofit).await;
    }

    async fn fetch_original(&self, pick: &PickRecord) -> Result<Vec<u8>, String> {
        if pick.file_path.contains(&self.public_host) {
            self.store
                .fetch(&pick.file_path)
                .await
                .map_err(|e| e.to_string())
        } else {
            self.meta
                .fetch_legacy(&pick.file_path)
                .await
                .map_err(|e| e.to_string())
        }
    }

    async fn build_derivative(
        &self,
        original: &[u8],
        file_name: &str,
        suffix: &str,
        max_dimension: u32,
    ) -> Result<String, String> {
        let resized = self
            .resizer
            .resize(original, max_dimension, WEBP_QUALITY)
            .await
            .map_err(|e| e.to_string())?;
        let key = object_key("picks", &derivative_file_name(file_name, suffix));
        self.store
            .put_object(&key, &resized, WEBP_CONTENT_TYPE)
            .await
            .map_err(|e| e.to_string())
    }

    async fn delete_superseded(
        &self,
        pick: &PickRecord,
        superseded: &[String],
        retrofit: &mut RetrofitReport,
    ) {
        let mut keys = Vec::new();
        let mut legacy_paths = Vec::new();
        for old in superseded {
            match key_for_public_url(old, &self.public_base) {
                Some(key) => keys.push(key),
                // A pre-migration derivative still lives on legacy storage.
                None => legacy_paths.push(old.clone()),
            }
        }

        if !keys.is_empty() {
            let deleted = self.store.delete_objects(&keys).await;
            if deleted < keys.len() {
                retrofit.cleanup_warnings.push(format!(
                    "{}: {} superseded derivative(s) not deleted",
                    pick.file_name,
                    keys.len() - deleted
                ));
            }
        }
        for path in legacy_paths {
            if let Err(e) = self.meta.remove_legacy(&path).await {
                warn!(file = %pick.file_name, error = %e, "superseded legacy derivative not deleted");
                retrofit.cleanup_warnings.push(format!(
                    "{}: superseded derivative not deleted: {e}",
                    pick.file_name
                ));
            }
        }
    }
}

/// `poster.jpg` + `thumb` → `poster_thumb.webp`
fn derivative_file_name(file_name: &str, suffix: &str) -> String {
    let stem = match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file_name,
    };
    format!("{stem}_{suffix}{WEBP_EXTENSION}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_covers_all_three_states() {
        assert_eq!(classify(None), DerivativeState::Missing);
        assert_eq!(classify(Some("")), DerivativeState::Missing);
        assert_eq!(classify(Some("  ")), DerivativeState::Missing);
        assert_eq!(
            classify(Some("https://media.example.com/picks/1-a_thumb.webp")),
            DerivativeState::Current
        );
        assert_eq!(
            classify(Some("https://media.example.com/picks/1-a_thumb.jpg")),
            DerivativeState::Legacy("https://media.example.com/picks/1-a_thumb.jpg".to_string())
        );
    }

    #[test]
    fn current_slots_need_no_work() {
        assert!(!DerivativeState::Current.needs_work());
        assert!(DerivativeState::Missing.needs_work());
        assert!(DerivativeState::Legacy("x".to_string()).needs_work());
    }

    #[test]
    fn derivative_names_replace_the_extension() {
        assert_eq!(derivative_file_name("poster.jpg", "thumb"), "poster_thumb.webp");
        assert_eq!(
            derivative_file_name("stage.front.png", "preview"),
            "stage.front_preview.webp"
        );
        assert_eq!(derivative_file_name("noext", "thumb"), "noext_thumb.webp");
        assert_eq!(derivative_file_name(".hidden", "thumb"), ".hidden_thumb.webp");
    }
}
