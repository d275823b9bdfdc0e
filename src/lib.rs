//! stagehand — object storage client and media migration jobs for the
//! box-office dashboard.
//!
//! The crate owns the one piece of the platform with real moving parts: a
//! self-signed S3-compatible upload path plus the batch jobs that move
//! legacy files to the new backend and backfill WebP image derivatives.
//! Everything else (calendars, bookings, the dashboard UI itself) lives
//! outside and talks to this crate through the job entry points in
//! [`services::jobs`].

pub mod config;
pub mod models;
pub mod services;
pub mod testing;

pub use config::{Config, ConfigError};

pub use models::{DocumentRecord, PickRecord, StorageSettings};

// Storage client exports
pub use services::{
    ObjectStore, S3CompatStore, SignedHeaders, StorageCredentials, StorageError,
    key_for_public_url, object_key, public_url_for_key, sanitize_file_name, sign,
};

// Collaborator seams
pub use services::{
    CredentialsError, ImageResizer, MetadataError, MetadataStore, PgMetadataStore, ResizeError,
};

// Job exports
pub use services::{
    DerivativeState, MigrationError, MigrationReport, MigrationService, Progress, ProgressSender,
    RetrofitError, RetrofitReport, RetrofitService, run_migration, run_retrofit,
};
