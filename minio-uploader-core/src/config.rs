use std::fmt;
use tracing::{debug, info};

pub const DEFAULT_ENDPOINT: &str = "http://localhost:9000";
pub const DEFAULT_ACCESS_KEY: &str = "erdcloud";
pub const DEFAULT_SECRET_KEY: &str = "Pw!123456";
pub const DEFAULT_ALIAS: &str = "myminio";
pub const DEFAULT_BUCKET: &str = "plat";

/// Connection settings for the object store, loaded once at startup.
#[derive(Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub alias: String,
    pub bucket: String,
}

impl StorageConfig {
    /// Reads the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup.
    ///
    /// Each setting is looked up as `MINIO_<KEY>` first, then as `<KEY>`, then falls
    /// back to its default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| {
            lookup(&format!("MINIO_{key}"))
                .or_else(|| lookup(key))
                .unwrap_or_else(|| default.to_string())
        };
        let config = Self {
            endpoint: get("ENDPOINT", DEFAULT_ENDPOINT),
            access_key: get("ACCESS_KEY", DEFAULT_ACCESS_KEY),
            secret_key: get("SECRET_KEY", DEFAULT_SECRET_KEY),
            alias: get("ALIAS", DEFAULT_ALIAS),
            bucket: get("BUCKET", DEFAULT_BUCKET),
        };
        config.trace_loaded();
        config
    }

    /// `<alias>/<bucket>`, the mc path of the target bucket.
    pub fn bucket_path(&self) -> String {
        format!("{}/{}", self.alias, self.bucket)
    }

    pub fn trace_loaded(&self) {
        info!(
            endpoint = %self.endpoint,
            alias = %self.alias,
            bucket = %self.bucket,
            "Loaded storage config"
        );
        debug!(?self, "Storage config loaded (full debug)");
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("endpoint", &self.endpoint)
            .field("access_key", &self.access_key)
            .field("secret_key", &"***")
            .field("alias", &self.alias)
            .field("bucket", &self.bucket)
            .finish()
    }
}
