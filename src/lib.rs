//! htmltoimg
//!
//! A render-and-relay HTTP service: it accepts an HTML document, renders it
//! to a fixed-viewport raster image with a headless browser, optionally
//! re-encodes the capture as JPEG, uploads the result to an S3-compatible
//! object store, and returns the public URL.
//!
//! # Architecture
//!
//! - **CDP Backend** (default): per-request headless Chrome instances driven
//!   over the Chrome DevTools Protocol
//! - **Modular Design**: the render backend and the object store sit behind
//!   traits so tests substitute fakes and deployments can swap strategies
//! - **Bounded Waits**: asset settlement is awaited under an explicit budget;
//!   a slow image never fails a request
//!
//! # Example
//!
//! ```no_run
//! use htmltoimg::{compress::CompressionSettings, render::RenderService, RenderOptions};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let service = RenderService::new(
//!     RenderOptions::default(),
//!     CompressionSettings::default(),
//!     None, // no object store configured: uploads fail explicitly
//! );
//! let outcome = service.render(r#"<html><body>hi</body></html>"#).await;
//! # let _ = outcome; Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

pub mod error;
pub use error::{Error, Result};

pub mod cdp;

// Async-friendly browser facade (worker-thread-backed abstraction)
pub mod async_api;
pub use async_api::Browser;

// Rendering-completion heuristic
pub mod heuristic;

// Advisory JPEG re-encoding of captures
pub mod compress;

// Object store client boundary
pub mod store;

// Per-request render orchestration
pub mod render;

// HTTP surface
pub mod http;

pub mod config;
pub mod telemetry;

/// Configuration for one render pass
///
/// The defaults reproduce the service's fixed output contract: a 1080x1350
/// device-independent viewport captured at 2x pixel density, a bounded wait
/// for referenced image assets, and a short settling delay before capture to
/// absorb paint and layout lag.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Viewport dimensions in device-independent units
    pub viewport: Viewport,
    /// Capture pixel-density multiplier (2.0 doubles the output dimensions)
    pub device_scale_factor: f64,
    /// Timeout for the initial document navigation
    pub navigation_timeout: Duration,
    /// Upper bound on waiting for referenced images to settle
    pub asset_wait_budget: Duration,
    /// Fixed delay applied after settlement (or budget expiry) before capture
    pub settle_delay: Duration,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            viewport: Viewport::default(),
            device_scale_factor: 2.0,
            navigation_timeout: Duration::from_secs(30),
            asset_wait_budget: Duration::from_secs(10),
            settle_delay: Duration::from_secs(1),
        }
    }
}

/// Viewport dimensions
#[derive(Debug, Clone, Copy)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1350,
        }
    }
}

/// A subresource fetch the page reported as failed
///
/// Collected for diagnostics only: failed assets are logged alongside the
/// request outcome and never fail the render.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct FailedResource {
    /// Resource URL as the page saw it
    pub url: String,
    /// Element kind that triggered the fetch (img, link, audio, video, ...)
    pub kind: String,
}

/// Core trait for render backend implementations
///
/// One backend instance serves exactly one request: it is created, driven
/// through navigate / settlement / capture, and closed. The trait is the
/// seam that keeps the per-request-Chrome strategy swappable (pooled
/// instances, or a fake in tests) without touching the orchestrator or the
/// completion heuristic.
pub trait RenderBackend {
    /// Load a document URL and wait for the DOM to be parsed.
    ///
    /// Implementations must not wait for network idle: pages with long-lived
    /// connections never become idle.
    fn navigate(&mut self, url: &str) -> Result<()>;

    /// Enumerate every image-bearing URL reachable from the document:
    /// `img[src]` plus each element's computed background-image URL(s).
    /// May contain duplicates; callers dedupe.
    fn image_references(&mut self) -> Result<Vec<String>>;

    /// Start an out-of-band load attempt for each URL, independent of the
    /// loads the document itself triggered. Each attempt records settlement
    /// whether it succeeds or fails.
    fn begin_asset_loads(&mut self, urls: &[String]) -> Result<()>;

    /// Whether the out-of-band load for `url` has reached a terminal state.
    fn asset_settled(&mut self, url: &str) -> Result<bool>;

    /// Subresource fetches (image/media/stylesheet kinds) the page reported
    /// as failed since navigation.
    fn failed_resources(&mut self) -> Result<Vec<FailedResource>>;

    /// Capture the configured viewport (never the full scrollable document)
    /// as PNG bytes.
    fn capture(&mut self) -> Result<Vec<u8>>;

    /// Close the backend and release its resources.
    fn close(self: Box<Self>) -> Result<()>;
}

/// Factory producing one backend per request.
///
/// The factory runs on the worker thread that will own the backend, so the
/// backend itself does not need to be `Send`.
pub type BackendFactory = Arc<dyn Fn() -> Result<Box<dyn RenderBackend>> + Send + Sync>;

/// Backend factory for the default CDP implementation
pub fn chrome_backend_factory(options: RenderOptions) -> BackendFactory {
    Arc::new(move || {
        let backend = cdp::CdpBackend::new(options.clone())?;
        Ok(Box::new(backend) as Box<dyn RenderBackend>)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = RenderOptions::default();
        assert_eq!(options.viewport.width, 1080);
        assert_eq!(options.viewport.height, 1350);
        assert_eq!(options.device_scale_factor, 2.0);
        assert_eq!(options.asset_wait_budget, Duration::from_secs(10));
        assert_eq!(options.settle_delay, Duration::from_secs(1));
    }

    #[test]
    fn test_viewport() {
        let viewport = Viewport {
            width: 1920,
            height: 1080,
        };
        assert_eq!(viewport.width, 1920);
        assert_eq!(viewport.height, 1080);
    }
}
