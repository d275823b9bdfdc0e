//! Operator-managed storage settings

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// The storage settings row the operator fills in through the dashboard.
///
/// Fields are optional at the database level because the operator may save
/// the form half-filled; `services::credentials::resolve` turns this into a
/// validated [`crate::services::StorageCredentials`] or refuses to run.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StorageSettings {
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}
