//! Document model

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A stored document row (contracts, rider PDFs, press kits).
///
/// `file_path` is either a legacy-storage path (pre-migration) or a
/// fully-qualified public URL on the new backend (post-migration); it is
/// never anything in between.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DocumentRecord {
    pub id: i64,
    pub file_path: String,
    pub file_name: String,
    pub content_type: Option<String>,
    pub file_size: Option<i64>,
}
