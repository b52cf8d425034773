//! Chrome DevTools Protocol backend implementation

use crate::{Error, FailedResource, RenderBackend, RenderOptions, Result};
use headless_chrome::browser::tab::Tab;
use headless_chrome::protocol::cdp::Page;
use headless_chrome::{Browser, LaunchOptions};
use std::sync::Arc;

/// Capture-phase listener installed before navigation so that subresource
/// load errors (images, stylesheets, media) are recorded from the first
/// fetch. Element error events do not bubble; only the capture phase sees
/// them all.
const FAILED_RESOURCE_RECORDER: &str = r#"(function(){
    window.__htmltoimg_failed = [];
    window.addEventListener('error', function(event){
        const target = event.target;
        if (!target || !target.tagName) return;
        const tag = target.tagName.toLowerCase();
        if (tag === 'img' || tag === 'link' || tag === 'audio' || tag === 'video' || tag === 'source') {
            window.__htmltoimg_failed.push({ url: target.src || target.href || '', kind: tag });
        }
    }, true);
})();"#;

/// Collects every image-bearing URL reachable from the document: explicit
/// `img[src]` plus each element's computed background-image URL(s).
/// Background URLs are resolved against the document base so the out-of-band
/// loaders see the same absolute URL the page fetched.
const COLLECT_IMAGE_REFERENCES: &str = r#"(function(){
    const urls = new Set();
    document.querySelectorAll('img[src]').forEach(function(img){
        if (img.src) urls.add(img.src);
    });
    document.querySelectorAll('*').forEach(function(el){
        const bg = getComputedStyle(el).backgroundImage;
        if (!bg || bg === 'none') return;
        for (const match of bg.matchAll(/url\(["']?([^"')]+)["']?\)/g)) {
            try { urls.add(new URL(match[1], document.baseURI).href); } catch (e) {}
        }
    });
    return JSON.stringify(Array.from(urls));
})()"#;

/// CDP-based render backend (uses the `headless_chrome` crate)
///
/// Launches a fresh headless Chrome instance scoped to a single request,
/// manages a single tab, and implements the `RenderBackend` contract over
/// it. The instance is never shared or pooled across requests.
pub struct CdpBackend {
    browser: Browser,
    tab: Arc<Tab>,
    options: RenderOptions,
}

impl CdpBackend {
    /// Launch a browser instance sized to the configured viewport.
    pub fn new(options: RenderOptions) -> Result<Self> {
        let launch_options = LaunchOptions::default_builder()
            .headless(true)
            .window_size(Some((options.viewport.width, options.viewport.height)))
            .build()
            .map_err(|e| Error::Launch(format!("Failed to build launch options: {}", e)))?;

        let browser = Browser::new(launch_options)
            .map_err(|e| Error::Launch(format!("Failed to launch browser: {}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| Error::Launch(format!("Failed to create tab: {}", e)))?;

        tab.set_default_timeout(options.navigation_timeout);

        // Must be installed before navigation: subresource fetches start as
        // soon as the parser sees them.
        tab.call_method(Page::AddScriptToEvaluateOnNewDocument {
            source: FAILED_RESOURCE_RECORDER.to_string(),
            world_name: None,
            include_command_line_api: None,
            run_immediately: None,
        })
        .map_err(|e| Error::Launch(format!("Failed to install resource recorder: {}", e)))?;

        Ok(Self {
            browser,
            tab,
            options,
        })
    }

    /// Evaluate an expression that returns a JSON string, and parse it.
    fn evaluate_json<T: serde::de::DeserializeOwned>(&self, expression: &str) -> Result<T> {
        let eval = self
            .tab
            .evaluate(expression, false)
            .map_err(|e| Error::Evaluation(format!("Evaluation failed: {}", e)))?;

        let value = eval
            .value
            .ok_or_else(|| Error::Evaluation("No value returned from evaluation".into()))?;

        let raw = value
            .as_str()
            .ok_or_else(|| Error::Evaluation(format!("Expected a JSON string, got {}", value)))?;

        serde_json::from_str(raw)
            .map_err(|e| Error::Evaluation(format!("Malformed evaluation payload: {}", e)))
    }
}

impl RenderBackend for CdpBackend {
    fn navigate(&mut self, url: &str) -> Result<()> {
        self.tab
            .navigate_to(url)
            .map_err(|e| Error::Navigation(format!("Navigation failed: {}", e)))?;

        // Waits for the document to finish parsing, not for network idle:
        // long-lived connections would keep the network busy forever.
        self.tab
            .wait_until_navigated()
            .map_err(|e| Error::Navigation(format!("Wait for navigation failed: {}", e)))?;

        Ok(())
    }

    fn image_references(&mut self) -> Result<Vec<String>> {
        self.evaluate_json(COLLECT_IMAGE_REFERENCES)
    }

    fn begin_asset_loads(&mut self, urls: &[String]) -> Result<()> {
        if urls.is_empty() {
            return Ok(());
        }

        let urls_json = serde_json::to_string(urls)
            .map_err(|e| Error::Evaluation(format!("Failed to encode asset URLs: {}", e)))?;

        // One loader per URL; onload and onerror both mark settlement, so a
        // broken asset terminates its wait instead of hanging it.
        let script = format!(
            r#"(function(urls){{
                const settled = window.__htmltoimg_settled = window.__htmltoimg_settled || {{}};
                urls.forEach(function(u){{
                    if (u in settled) return;
                    settled[u] = false;
                    const probe = new Image();
                    probe.onload = function(){{ settled[u] = true; }};
                    probe.onerror = function(){{ settled[u] = true; }};
                    probe.src = u;
                }});
            }})({urls_json})"#
        );

        self.tab
            .evaluate(&script, false)
            .map_err(|e| Error::Evaluation(format!("Failed to start asset loads: {}", e)))?;

        Ok(())
    }

    fn asset_settled(&mut self, url: &str) -> Result<bool> {
        let url_json = serde_json::to_string(url)
            .map_err(|e| Error::Evaluation(format!("Failed to encode asset URL: {}", e)))?;

        let script = format!(
            r#"(function(u){{
                const settled = window.__htmltoimg_settled || {{}};
                return settled[u] === true;
            }})({url_json})"#
        );

        let eval = self
            .tab
            .evaluate(&script, false)
            .map_err(|e| Error::Evaluation(format!("Settlement check failed: {}", e)))?;

        match eval.value {
            Some(serde_json::Value::Bool(settled)) => Ok(settled),
            Some(other) => Ok(other.as_str() == Some("true")),
            None => Ok(false),
        }
    }

    fn failed_resources(&mut self) -> Result<Vec<FailedResource>> {
        self.evaluate_json("JSON.stringify(window.__htmltoimg_failed || [])")
    }

    fn capture(&mut self) -> Result<Vec<u8>> {
        // Clip to the configured viewport (never the full scrollable
        // document); the clip scale yields the higher-density capture.
        let clip = Page::Viewport {
            x: 0.0,
            y: 0.0,
            width: self.options.viewport.width as f64,
            height: self.options.viewport.height as f64,
            scale: self.options.device_scale_factor,
        };

        let screenshot_data = self
            .tab
            .capture_screenshot(
                Page::CaptureScreenshotFormatOption::Png,
                None,
                Some(clip),
                true,
            )
            .map_err(|e| Error::Capture(format!("Screenshot failed: {}", e)))?;

        Ok(screenshot_data)
    }

    fn close(self: Box<Self>) -> Result<()> {
        // Drop the browser and tab explicitly so the child process is
        // terminated promptly.
        drop(self.tab);
        drop(self.browser);
        Ok(())
    }
}
