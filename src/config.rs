use std::env;

use url::Url;

/// Static deployment parameters for the storage pipeline.
///
/// These describe where objects live and are fixed per deployment. The
/// operator-entered credentials are not part of this struct; they are read
/// from the settings row at job start (see `services::credentials`).
#[derive(Debug, Clone)]
pub struct Config {
    /// Bucket name on the S3-compatible backend
    pub bucket: String,
    /// Base URL under which uploaded objects are publicly readable
    pub public_base_url: Url,
    /// Base URL of the legacy storage backend's object API
    pub legacy_base_url: Url,
    /// Signing region (the backend here uses "auto")
    pub region: String,
}

impl Config {
    /// Build a configuration from string parameters, with the region left at
    /// its `"auto"` default.
    pub fn new(
        bucket: &str,
        public_base_url: &str,
        legacy_base_url: &str,
    ) -> Result<Self, ConfigError> {
        let public_base_url = Url::parse(public_base_url.trim_end_matches('/'))
            .map_err(|_| ConfigError::InvalidValue("public base URL"))?;
        let legacy_base_url = Url::parse(legacy_base_url.trim_end_matches('/'))
            .map_err(|_| ConfigError::InvalidValue("legacy base URL"))?;
        let config = Self {
            bucket: bucket.to_string(),
            public_base_url,
            legacy_base_url,
            region: "auto".to_string(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let bucket =
            env::var("STORAGE_BUCKET").map_err(|_| ConfigError::MissingEnvVar("STORAGE_BUCKET"))?;

        let public_base_url = env::var("STORAGE_PUBLIC_BASE_URL")
            .map_err(|_| ConfigError::MissingEnvVar("STORAGE_PUBLIC_BASE_URL"))?;
        let public_base_url = Url::parse(public_base_url.trim_end_matches('/'))
            .map_err(|_| ConfigError::InvalidValue("STORAGE_PUBLIC_BASE_URL"))?;

        let legacy_base_url = env::var("LEGACY_STORAGE_BASE_URL")
            .map_err(|_| ConfigError::MissingEnvVar("LEGACY_STORAGE_BASE_URL"))?;
        let legacy_base_url = Url::parse(legacy_base_url.trim_end_matches('/'))
            .map_err(|_| ConfigError::InvalidValue("LEGACY_STORAGE_BASE_URL"))?;

        let region = env::var("STORAGE_REGION").unwrap_or_else(|_| "auto".to_string());

        let config = Self {
            bucket,
            public_base_url,
            legacy_base_url,
            region,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration completeness and correctness
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bucket.is_empty() {
            return Err(ConfigError::ValidationFailed("bucket cannot be empty"));
        }
        // S3 bucket names must be 3-63 characters
        if self.bucket.len() < 3 || self.bucket.len() > 63 {
            return Err(ConfigError::ValidationFailed(
                "bucket must be 3-63 characters long",
            ));
        }
        if self.region.is_empty() {
            return Err(ConfigError::ValidationFailed("region cannot be empty"));
        }
        if !matches!(self.public_base_url.scheme(), "http" | "https") {
            return Err(ConfigError::ValidationFailed(
                "public base URL must be http or https",
            ));
        }
        if !matches!(self.legacy_base_url.scheme(), "http" | "https") {
            return Err(ConfigError::ValidationFailed(
                "legacy base URL must be http or https",
            ));
        }
        Ok(())
    }

    /// Host of the public base URL. A `file_path` containing this host is
    /// already on the new backend.
    pub fn public_host(&self) -> &str {
        self.public_base_url.host_str().unwrap_or_default()
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            bucket: "boxoffice-media".to_string(),
            public_base_url: Url::parse("https://media.example.com").unwrap(),
            legacy_base_url: Url::parse("https://legacy.example.com/storage/v1").unwrap(),
            region: "auto".to_string(),
        }
    }

    #[test]
    fn from_env_missing_bucket() {
        temp_env::with_vars_unset(
            vec![
                "STORAGE_BUCKET",
                "STORAGE_PUBLIC_BASE_URL",
                "LEGACY_STORAGE_BASE_URL",
                "STORAGE_REGION",
            ],
            || {
                let result = Config::from_env();
                assert_eq!(
                    result.unwrap_err(),
                    ConfigError::MissingEnvVar("STORAGE_BUCKET")
                );
            },
        );
    }

    #[test]
    fn from_env_full_config() {
        temp_env::with_vars(
            vec![
                ("STORAGE_BUCKET", Some("boxoffice-media")),
                ("STORAGE_PUBLIC_BASE_URL", Some("https://media.example.com/")),
                (
                    "LEGACY_STORAGE_BASE_URL",
                    Some("https://legacy.example.com/storage/v1"),
                ),
                ("STORAGE_REGION", None),
            ],
            || {
                let config = Config::from_env().expect("should parse full config");
                assert_eq!(config.bucket, "boxoffice-media");
                // Trailing slash is normalized away before parsing
                assert_eq!(config.public_base_url.as_str(), "https://media.example.com/");
                assert_eq!(config.region, "auto");
                assert_eq!(config.public_host(), "media.example.com");
            },
        );
    }

    #[test]
    fn validate_rejects_short_bucket() {
        let mut config = test_config();
        config.bucket = "ab".to_string();
        assert_eq!(
            config.validate().unwrap_err(),
            ConfigError::ValidationFailed("bucket must be 3-63 characters long")
        );
    }

    #[test]
    fn public_host_is_derived_from_base_url() {
        assert_eq!(test_config().public_host(), "media.example.com");
    }
}
