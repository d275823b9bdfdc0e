//! Pick (curated image) model

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A curated image row shown on the marketing pages.
///
/// Carries the same file pointer contract as a document, plus the two
/// derivative URLs the retrofit job maintains. After a completed retrofit
/// both derivative URLs either are absent or end in `.webp`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PickRecord {
    pub id: i64,
    pub file_path: String,
    pub file_name: String,
    pub content_type: Option<String>,
    pub file_size: Option<i64>,
    pub thumbnail_url: Option<String>,
    pub preview_url: Option<String>,
}
