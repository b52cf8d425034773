//! Object store client boundary
//!
//! The store is modeled as an explicit trait plus a configuration struct
//! constructed once at startup and handed to the orchestrator — never as
//! ambient global state — so tests can substitute a fake store and the
//! S3/MinIO client stays swappable.

use std::path::Path;

use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{BehaviorVersion, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use uuid::Uuid;

use crate::{Error, Result};

/// Connection settings for an S3-compatible object store
#[derive(Debug, Clone)]
pub struct StoreSettings {
    /// Store host (optionally with port), without a scheme
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    /// Whether to address the store over https
    pub secure: bool,
    pub bucket: String,
}

impl StoreSettings {
    /// Public base address of the store.
    pub fn base_url(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{scheme}://{}", self.endpoint)
    }
}

/// Put-object and public-URL-construction semantics of the object store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload the file at `path` under `key` with the given content type.
    async fn put_object(&self, key: &str, path: &Path, content_type: &str) -> Result<()>;

    /// Publicly resolvable URL for an uploaded key.
    fn public_url(&self, key: &str) -> String;
}

/// Generate a globally-unique object name.
///
/// Names are random, never derived from content, so concurrent writers
/// cannot collide in the bucket namespace.
pub fn object_name(extension: &str) -> String {
    format!("image_{}.{}", Uuid::new_v4(), extension)
}

/// S3/MinIO-backed object store
pub struct S3Store {
    client: aws_sdk_s3::Client,
    settings: StoreSettings,
}

impl S3Store {
    pub fn new(settings: StoreSettings) -> Self {
        let credentials = Credentials::new(
            settings.access_key.clone(),
            settings.secret_key.clone(),
            None,
            None,
            "htmltoimg",
        );

        // MinIO serves buckets path-style under a single endpoint
        let config = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .endpoint_url(settings.base_url())
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: aws_sdk_s3::Client::from_conf(config),
            settings,
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put_object(&self, key: &str, path: &Path, content_type: &str) -> Result<()> {
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| Error::Upload(format!("Failed to read artifact: {}", e)))?;

        self.client
            .put_object()
            .bucket(&self.settings.bucket)
            .key(key)
            .content_type(content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Upload(format!("{}", DisplayErrorContext(e))))?;

        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.settings.base_url(), self.settings.bucket, key)
    }
}
