//! Image resize collaborator
//!
//! Resizing runs in an external service; this crate only owns the seam.
//! Output is always WebP, the format the derivative retrofit standardizes
//! on.

use async_trait::async_trait;
use thiserror::Error;

/// Content type of every derivative the pipeline produces.
pub const WEBP_CONTENT_TYPE: &str = "image/webp";

/// File extension a current-format derivative URL ends in.
pub const WEBP_EXTENSION: &str = ".webp";

#[derive(Debug, Error)]
pub enum ResizeError {
    #[error("resize failed: {0}")]
    Failed(String),
    #[error("input is not a decodable image: {0}")]
    InvalidImage(String),
}

/// Scale an image to fit within `max_dimension` pixels on its longest side
/// and encode it as WebP at the given quality.
#[async_trait]
pub trait ImageResizer: Send + Sync {
    async fn resize(
        &self,
        bytes: &[u8],
        max_dimension: u32,
        quality: u8,
    ) -> Result<Vec<u8>, ResizeError>;
}
