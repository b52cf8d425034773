//! Per-request render orchestration
//!
//! One `RenderService::render` call owns the entire request lifecycle:
//! transient HTML document, a fresh browser instance, the settlement wait,
//! the capture artifact, advisory compression, and the upload. Every
//! transient resource is a `NamedTempFile`, so deletion is guaranteed on
//! every exit path; explicit `close()` calls on the happy paths surface
//! deletion errors into the log without ever masking the primary outcome.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use url::Url;

use crate::compress::{compress_to_jpeg, CompressionSettings};
use crate::heuristic;
use crate::store::{object_name, ObjectStore};
use crate::{BackendFactory, Browser, Error, RenderOptions, Result};

/// The only artifact handed back to the caller
#[derive(Debug, Clone)]
pub struct UploadResult {
    /// Public URL of the uploaded capture
    pub url: String,
}

/// Drives one request end to end: document → browser → capture → upload.
#[derive(Clone)]
pub struct RenderService {
    options: RenderOptions,
    compression: CompressionSettings,
    factory: BackendFactory,
    store: Option<Arc<dyn ObjectStore>>,
}

impl RenderService {
    /// Service over the default per-request CDP backend.
    pub fn new(
        options: RenderOptions,
        compression: CompressionSettings,
        store: Option<Arc<dyn ObjectStore>>,
    ) -> Self {
        let factory = crate::chrome_backend_factory(options.clone());
        Self {
            options,
            compression,
            factory,
            store,
        }
    }

    /// Service over an arbitrary backend factory (fakes in tests, pooled
    /// strategies in other deployments).
    pub fn with_factory(
        options: RenderOptions,
        compression: CompressionSettings,
        store: Option<Arc<dyn ObjectStore>>,
        factory: BackendFactory,
    ) -> Self {
        Self {
            options,
            compression,
            factory,
            store,
        }
    }

    /// Render `html` to an image, upload it, and return the public URL.
    pub async fn render(&self, html: &str) -> Result<UploadResult> {
        let document = write_transient_document(html)?;
        debug!(document = %document.path().display(), html_length = html.len(), "wrote transient document");

        let rendered = self.render_document(document.path()).await;

        // The transient document is deleted on every exit path; a deletion
        // failure is logged and never overrides the render outcome.
        if let Err(err) = document.close() {
            warn!(error = %err, "failed to remove transient document");
        }

        let capture = rendered?;
        self.upload(capture).await
    }

    async fn render_document(&self, document: &Path) -> Result<NamedTempFile> {
        let document_url = Url::from_file_path(document).map_err(|_| {
            Error::Navigation(format!("not an absolute local path: {}", document.display()))
        })?;

        let browser = Browser::with_factory(self.factory.clone()).await?;

        let driven = self.drive(&browser, document_url.as_str()).await;

        // Teardown is unconditional, and a teardown failure never masks the
        // render outcome.
        if let Err(err) = browser.close().await {
            warn!(error = %err, "browser teardown failed");
        }

        driven
    }

    async fn drive(&self, page: &Browser, url: &str) -> Result<NamedTempFile> {
        page.navigate(url).await?;

        let outcome =
            heuristic::await_asset_settlement(page, self.options.asset_wait_budget).await?;
        debug!(?outcome, "asset settlement finished");

        // Absorb paint/layout lag the asset-load signal cannot see
        tokio::time::sleep(self.options.settle_delay).await;

        match page.failed_resources().await {
            Ok(failures) => {
                for failure in &failures {
                    warn!(url = %failure.url, kind = %failure.kind, "asset failed to load");
                }
            }
            Err(err) => debug!(error = %err, "could not collect failed-resource diagnostics"),
        }

        let bytes = page.capture().await?;

        let mut artifact = tempfile::Builder::new().suffix(".png").tempfile()?;
        artifact.write_all(&bytes)?;
        artifact.flush()?;
        Ok(artifact)
    }

    async fn upload(&self, capture: NamedTempFile) -> Result<UploadResult> {
        let store = self.store.as_ref().ok_or(Error::StoreNotConfigured)?;

        let compressed = if self.compression.enabled {
            self.compress(capture.path()).await
        } else {
            None
        };

        // Content type follows strictly from which artifact is uploaded
        let (path, extension, content_type): (&Path, &str, &str) = match &compressed {
            Some(jpeg) => (jpeg.path(), "jpg", "image/jpeg"),
            None => (capture.path(), "png", "image/png"),
        };

        let key = object_name(extension);
        info!(object = %key, content_type, "uploading capture");

        let uploaded = store.put_object(&key, path, content_type).await;

        // The compressed copy is removed whether or not the upload succeeded
        if let Some(jpeg) = compressed {
            if let Err(err) = jpeg.close() {
                warn!(error = %err, "failed to remove compressed artifact");
            }
        }

        uploaded?;

        let url = store.public_url(&key);
        info!(url = %url, "upload complete");
        Ok(UploadResult { url })
    }

    /// Advisory compression: any failure falls back to the original capture.
    async fn compress(&self, capture: &Path) -> Option<NamedTempFile> {
        let output = match tempfile::Builder::new().suffix(".jpg").tempfile() {
            Ok(file) => file,
            Err(err) => {
                warn!(error = %err, "could not allocate compression output; uploading the original capture");
                return None;
            }
        };

        let settings = self.compression.clone();
        let input = capture.to_path_buf();
        let output_path = output.path().to_path_buf();

        let result =
            tokio::task::spawn_blocking(move || compress_to_jpeg(&input, &output_path, &settings))
                .await;

        match result {
            Ok(Ok(())) => Some(output),
            Ok(Err(err)) => {
                warn!(error = %err, "compression failed; uploading the original capture");
                None
            }
            Err(err) => {
                warn!(error = %err, "compression task panicked; uploading the original capture");
                None
            }
        }
    }
}

fn write_transient_document(html: &str) -> Result<NamedTempFile> {
    let mut file = tempfile::Builder::new().suffix(".html").tempfile()?;
    file.write_all(html.as_bytes())?;
    file.flush()?;
    Ok(file)
}
