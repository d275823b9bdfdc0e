//! Object storage client
//!
//! Issues self-signed PUT/GET/DELETE requests against the S3-compatible
//! backend. The [`ObjectStore`] trait is the seam the orchestrators depend
//! on; [`S3CompatStore`] is the production implementation over `reqwest`
//! and the SigV4 signer.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::config::Config;

use super::credentials::{CredentialsError, StorageCredentials};
use super::sigv4;

/// Timeout applied to every storage and legacy-fetch HTTP call. A timeout is
/// an ordinary per-item error, not a job abort.
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Signing service name for S3-compatible APIs.
const SIGNING_SERVICE: &str = "s3";

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Credentials rejected at client construction
    #[error("configuration error: {0}")]
    Config(#[from] CredentialsError),

    /// The endpoint/bucket/key combination does not form a valid URL
    #[error("invalid object URL for key {key}: {message}")]
    InvalidUrl { key: String, message: String },

    /// Transport-level failure (connect, timeout, TLS)
    #[error("request failed: {0}")]
    Request(String),

    /// The backend answered an upload with a non-2xx status. The response
    /// body is kept for diagnostics.
    #[error("upload failed with status {status}: {body}")]
    UploadFailed { status: u16, body: String },

    /// A read returned a non-2xx status
    #[error("fetch of {url} failed with status {status}")]
    FetchFailed { url: String, status: u16 },
}

/// Object storage operations the orchestrators need.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload an object and return its public URL.
    async fn put_object(
        &self,
        key: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<String, StorageError>;

    /// Plain GET of a publicly readable URL.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, StorageError>;

    /// Best-effort delete. Returns the number of keys actually deleted;
    /// failures are logged, never raised.
    async fn delete_objects(&self, keys: &[String]) -> usize;
}

/// Production client for the S3-compatible backend.
pub struct S3CompatStore {
    http: reqwest::Client,
    credentials: StorageCredentials,
    config: Config,
}

impl S3CompatStore {
    /// Build a client. Credentials are validated here so that signing can
    /// assume a complete set.
    pub fn new(credentials: StorageCredentials, config: Config) -> Result<Self, StorageError> {
        credentials.validate()?;
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| StorageError::Request(e.to_string()))?;
        Ok(Self {
            http,
            credentials,
            config,
        })
    }

    /// Target URL for an object: `endpoint/bucket/key`.
    fn object_url(&self, key: &str) -> Result<Url, StorageError> {
        let endpoint = self.credentials.endpoint.trim_end_matches('/');
        Url::parse(&format!("{endpoint}/{}/{key}", self.config.bucket)).map_err(|e| {
            StorageError::InvalidUrl {
                key: key.to_string(),
                message: e.to_string(),
            }
        })
    }

    /// Public URL the metadata store records for a key.
    pub fn public_url(&self, key: &str) -> String {
        public_url_for_key(self.config.public_base_url.as_str(), key)
    }

    async fn delete_object(&self, key: &str) -> Result<u16, StorageError> {
        let url = self.object_url(key)?;
        let signed = sigv4::sign(
            "DELETE",
            &url,
            &[],
            b"",
            &self.credentials,
            &self.config.region,
            SIGNING_SERVICE,
        );
        let response = self
            .http
            .delete(url)
            .header("x-amz-date", &signed.amz_date)
            .header("x-amz-content-sha256", &signed.content_sha256)
            .header("Authorization", &signed.authorization)
            .send()
            .await
            .map_err(|e| StorageError::Request(e.to_string()))?;
        Ok(response.status().as_u16())
    }
}

#[async_trait]
impl ObjectStore for S3CompatStore {
    async fn put_object(
        &self,
        key: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<String, StorageError> {
        let url = self.object_url(key)?;
        let content_length = bytes.len().to_string();
        let signed = sigv4::sign(
            "PUT",
            &url,
            &[
                ("content-type", content_type),
                ("content-length", &content_length),
            ],
            bytes,
            &self.credentials,
            &self.config.region,
            SIGNING_SERVICE,
        );

        debug!(key, size = bytes.len(), content_type, "uploading object");

        let response = self
            .http
            .put(url)
            .header("Content-Type", content_type)
            .header("Content-Length", &content_length)
            .header("x-amz-date", &signed.amz_date)
            .header("x-amz-content-sha256", &signed.content_sha256)
            .header("Authorization", &signed.authorization)
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| StorageError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::UploadFailed {
                status: status.as_u16(),
                body,
            });
        }

        debug!(key, "object uploaded");
        Ok(self.public_url(key))
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, StorageError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| StorageError::Request(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::FetchFailed {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| StorageError::Request(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn delete_objects(&self, keys: &[String]) -> usize {
        let mut deleted = 0;
        for key in keys {
            match self.delete_object(key).await {
                // 404 means the object is already gone, which is what a
                // delete is for.
                Ok(status) if (200..300).contains(&status) || status == 404 => deleted += 1,
                Ok(status) => {
                    warn!(key, status, "delete was refused");
                }
                Err(e) => {
                    warn!(key, error = %e, "delete request failed");
                }
            }
        }
        deleted
    }
}

/// Replace every character outside `[A-Za-z0-9._-]` so arbitrary
/// user-supplied names always form a valid object key.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Build a collision-resistant object key: `folder/<unix-millis>-<name>`.
/// Millisecond granularity keeps keys unique across a sequential batch.
pub fn object_key(folder: &str, file_name: &str) -> String {
    object_key_at(folder, file_name, Utc::now().timestamp_millis())
}

pub(crate) fn object_key_at(folder: &str, file_name: &str, millis: i64) -> String {
    format!("{folder}/{millis}-{}", sanitize_file_name(file_name))
}

/// Join a public base URL and a key.
pub fn public_url_for_key(public_base: &str, key: &str) -> String {
    format!("{}/{key}", public_base.trim_end_matches('/'))
}

/// Invert [`public_url_for_key`]: recover the object key from a public URL,
/// or `None` when the URL is not under the given base.
pub fn key_for_public_url(url: &str, public_base: &str) -> Option<String> {
    let base = public_base.trim_end_matches('/');
    let rest = url.strip_prefix(base)?;
    let key = rest.trim_start_matches('/');
    if key.is_empty() {
        None
    } else {
        Some(key.to_string())
    }
}
