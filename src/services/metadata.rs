//! Metadata store collaborator
//!
//! The relational store owns the document/pick rows and the operator
//! settings; this crate only needs select, update, and the legacy-storage
//! fetch/remove calls. [`MetadataStore`] is the seam the orchestrators use;
//! [`PgMetadataStore`] is the production implementation over PostgreSQL,
//! with the legacy calls going through the prior backend's object API.

use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::models::{DocumentRecord, PickRecord, StorageSettings};

use super::object_store::REQUEST_TIMEOUT;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("http client error: {0}")]
    Http(String),

    #[error("legacy storage request failed: {0}")]
    LegacyRequest(String),

    #[error("legacy storage returned status {status} for {path}")]
    LegacyStatus { path: String, status: u16 },
}

/// Read/write access to the record families the jobs touch.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// The settings row holding the three credential fields, if the operator
    /// has saved one.
    async fn storage_settings(&self) -> Result<Option<StorageSettings>, MetadataError>;

    /// Documents whose `file_path` does not point at the given host.
    async fn documents_not_on(&self, host: &str) -> Result<Vec<DocumentRecord>, MetadataError>;

    /// Picks whose `file_path` does not point at the given host.
    async fn picks_not_on(&self, host: &str) -> Result<Vec<PickRecord>, MetadataError>;

    /// All picks, for the derivative retrofit.
    async fn list_picks(&self) -> Result<Vec<PickRecord>, MetadataError>;

    async fn set_document_path(&self, id: i64, file_path: &str) -> Result<(), MetadataError>;

    async fn set_pick_path(&self, id: i64, file_path: &str) -> Result<(), MetadataError>;

    /// Partial update: only the provided derivative URLs are written, fields
    /// passed as `None` stay untouched.
    async fn set_pick_derivatives(
        &self,
        id: i64,
        thumbnail_url: Option<&str>,
        preview_url: Option<&str>,
    ) -> Result<(), MetadataError>;

    /// Download a file from the legacy storage backend.
    async fn fetch_legacy(&self, path: &str) -> Result<Vec<u8>, MetadataError>;

    /// Delete a file from the legacy storage backend.
    async fn remove_legacy(&self, path: &str) -> Result<(), MetadataError>;
}

/// PostgreSQL-backed metadata store.
pub struct PgMetadataStore {
    pool: PgPool,
    http: reqwest::Client,
    legacy_base_url: Url,
}

impl PgMetadataStore {
    pub fn new(pool: PgPool, legacy_base_url: Url) -> Result<Self, MetadataError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| MetadataError::Http(e.to_string()))?;
        Ok(Self {
            pool,
            http,
            legacy_base_url,
        })
    }

    fn legacy_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.legacy_base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl MetadataStore for PgMetadataStore {
    async fn storage_settings(&self) -> Result<Option<StorageSettings>, MetadataError> {
        let settings = sqlx::query_as::<_, StorageSettings>(
            r#"
            SELECT storage_endpoint AS endpoint,
                   storage_access_key_id AS access_key_id,
                   storage_secret_access_key AS secret_access_key
            FROM app_settings
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(settings)
    }

    async fn documents_not_on(&self, host: &str) -> Result<Vec<DocumentRecord>, MetadataError> {
        let rows = sqlx::query_as::<_, DocumentRecord>(
            r#"
            SELECT id, file_path, file_name, content_type, file_size
            FROM documents
            WHERE file_path NOT LIKE $1
            ORDER BY id
            "#,
        )
        .bind(format!("%{host}%"))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn picks_not_on(&self, host: &str) -> Result<Vec<PickRecord>, MetadataError> {
        let rows = sqlx::query_as::<_, PickRecord>(
            r#"
            SELECT id, file_path, file_name, content_type, file_size,
                   thumbnail_url, preview_url
            FROM picks
            WHERE file_path NOT LIKE $1
            ORDER BY id
            "#,
        )
        .bind(format!("%{host}%"))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn list_picks(&self) -> Result<Vec<PickRecord>, MetadataError> {
        let rows = sqlx::query_as::<_, PickRecord>(
            r#"
            SELECT id, file_path, file_name, content_type, file_size,
                   thumbnail_url, preview_url
            FROM picks
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn set_document_path(&self, id: i64, file_path: &str) -> Result<(), MetadataError> {
        sqlx::query("UPDATE documents SET file_path = $1 WHERE id = $2")
            .bind(file_path)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_pick_path(&self, id: i64, file_path: &str) -> Result<(), MetadataError> {
        sqlx::query("UPDATE picks SET file_path = $1 WHERE id = $2")
            .bind(file_path)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_pick_derivatives(
        &self,
        id: i64,
        thumbnail_url: Option<&str>,
        preview_url: Option<&str>,
    ) -> Result<(), MetadataError> {
        match (thumbnail_url, preview_url) {
            (Some(thumb), Some(preview)) => {
                sqlx::query("UPDATE picks SET thumbnail_url = $1, preview_url = $2 WHERE id = $3")
                    .bind(thumb)
                    .bind(preview)
                    .bind(id)
                    .execute(&self.pool)
                    .await?;
            }
            (Some(thumb), None) => {
                sqlx::query("UPDATE picks SET thumbnail_url = $1 WHERE id = $2")
                    .bind(thumb)
                    .bind(id)
                    .execute(&self.pool)
                    .await?;
            }
            (None, Some(preview)) => {
                sqlx::query("UPDATE picks SET preview_url = $1 WHERE id = $2")
                    .bind(preview)
                    .bind(id)
                    .execute(&self.pool)
                    .await?;
            }
            (None, None) => {}
        }
        Ok(())
    }

    async fn fetch_legacy(&self, path: &str) -> Result<Vec<u8>, MetadataError> {
        let url = self.legacy_url(path);
        debug!(path, "downloading from legacy storage");
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| MetadataError::LegacyRequest(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(MetadataError::LegacyStatus {
                path: path.to_string(),
                status: status.as_u16(),
            });
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| MetadataError::LegacyRequest(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn remove_legacy(&self, path: &str) -> Result<(), MetadataError> {
        let url = self.legacy_url(path);
        let response = self
            .http
            .delete(&url)
            .send()
            .await
            .map_err(|e| MetadataError::LegacyRequest(e.to_string()))?;
        let status = response.status();
        // A file that is already gone counts as removed.
        if !status.is_success() && status.as_u16() != 404 {
            return Err(MetadataError::LegacyStatus {
                path: path.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}
