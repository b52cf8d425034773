//! Shared test doubles: a scripted render backend and an in-memory store.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use htmltoimg::store::ObjectStore;
use htmltoimg::{BackendFactory, Error, FailedResource, RenderBackend, Result};

/// Everything the tests want to inspect after a request has run.
#[derive(Default)]
pub struct FakeState {
    pub backends_created: usize,
    pub navigated: Vec<String>,
    pub loads_started: Vec<String>,
    pub closed: bool,
}

/// Script for one fake backend instance.
#[derive(Clone)]
pub struct FakeSpec {
    /// URLs reported by `image_references`
    pub references: Vec<String>,
    /// Settlement delay per URL, measured from `begin_asset_loads`;
    /// URLs absent from the map never settle
    pub settle_after: HashMap<String, Duration>,
    /// URLs whose settlement probe errors (errors count as settled)
    pub probe_errors: HashSet<String>,
    /// Bytes returned by `capture`
    pub capture: Vec<u8>,
    /// When set, `navigate` fails with this message
    pub fail_navigation: Option<String>,
    /// Failed-fetch diagnostics reported by the page
    pub failed: Vec<(String, String)>,
}

impl Default for FakeSpec {
    fn default() -> Self {
        Self {
            references: Vec::new(),
            settle_after: HashMap::new(),
            probe_errors: HashSet::new(),
            capture: png_bytes(),
            fail_navigation: None,
            failed: Vec::new(),
        }
    }
}

pub struct FakeBackend {
    spec: FakeSpec,
    state: Arc<Mutex<FakeState>>,
    loads_started_at: Option<Instant>,
}

impl RenderBackend for FakeBackend {
    fn navigate(&mut self, url: &str) -> Result<()> {
        self.state.lock().unwrap().navigated.push(url.to_string());
        match &self.spec.fail_navigation {
            Some(message) => Err(Error::Navigation(message.clone())),
            None => Ok(()),
        }
    }

    fn image_references(&mut self) -> Result<Vec<String>> {
        Ok(self.spec.references.clone())
    }

    fn begin_asset_loads(&mut self, urls: &[String]) -> Result<()> {
        self.loads_started_at = Some(Instant::now());
        self.state
            .lock()
            .unwrap()
            .loads_started
            .extend(urls.iter().cloned());
        Ok(())
    }

    fn asset_settled(&mut self, url: &str) -> Result<bool> {
        if self.spec.probe_errors.contains(url) {
            return Err(Error::Evaluation("probe lost".to_string()));
        }
        let Some(started) = self.loads_started_at else {
            return Ok(false);
        };
        match self.spec.settle_after.get(url) {
            Some(delay) => Ok(started.elapsed() >= *delay),
            None => Ok(false),
        }
    }

    fn failed_resources(&mut self) -> Result<Vec<FailedResource>> {
        Ok(self
            .spec
            .failed
            .iter()
            .map(|(url, kind)| FailedResource {
                url: url.clone(),
                kind: kind.clone(),
            })
            .collect())
    }

    fn capture(&mut self) -> Result<Vec<u8>> {
        Ok(self.spec.capture.clone())
    }

    fn close(self: Box<Self>) -> Result<()> {
        self.state.lock().unwrap().closed = true;
        Ok(())
    }
}

/// Factory producing one scripted backend per request.
pub fn fake_factory(spec: FakeSpec, state: Arc<Mutex<FakeState>>) -> BackendFactory {
    Arc::new(move || {
        let mut shared = state.lock().unwrap();
        shared.backends_created += 1;
        drop(shared);
        Ok(Box::new(FakeBackend {
            spec: spec.clone(),
            state: state.clone(),
            loads_started_at: None,
        }) as Box<dyn RenderBackend>)
    })
}

/// A small valid PNG, as the CDP backend would produce.
pub fn png_bytes() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(4, 4, image::Rgb([200, 100, 50]));
    let mut bytes = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut bytes, image::ImageFormat::Png)
        .unwrap();
    bytes.into_inner()
}

/// In-memory object store recording every upload.
#[derive(Default)]
pub struct FakeStore {
    pub uploads: Mutex<Vec<(String, String, usize)>>,
    pub fail_with: Option<String>,
}

#[async_trait]
impl ObjectStore for FakeStore {
    async fn put_object(&self, key: &str, path: &Path, content_type: &str) -> Result<()> {
        let bytes = std::fs::read(path)?;
        if let Some(message) = &self.fail_with {
            return Err(Error::Upload(message.clone()));
        }
        self.uploads
            .lock()
            .unwrap()
            .push((key.to_string(), content_type.to_string(), bytes.len()));
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("https://store.test/renders/{key}")
    }
}
