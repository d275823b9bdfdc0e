pub mod credentials;
pub mod jobs;
pub mod metadata;
pub mod migration;
pub mod object_store;
pub mod progress;
pub mod resize;
pub mod retrofit;
pub mod sigv4;


#[cfg(test)]
mod retrofit_tests;

pub use credentials::{CredentialsError, StorageCredentials, resolve};
pub use jobs::{run_migration, run_retrofit};
pub use metadata::{MetadataError, MetadataStore, PgMetadataStore};
pub use migration::{MigrationError, MigrationReport, MigrationService};
pub use object_store::{
    ObjectStore, S3CompatStore, StorageError, key_for_public_url, object_key, public_url_for_key,
    sanitize_file_name,
};
pub use progress::{Progress, ProgressSender};
pub use resize::{ImageResizer, ResizeError, WEBP_CONTENT_TYPE, WEBP_EXTENSION};
pub use retrofit::{DerivativeState, RetrofitError, RetrofitReport, RetrofitService, classify};
pub use sigv4::{SignedHeaders, hash_payload, sign};
