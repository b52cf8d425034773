use crate::{BackendFactory, Error, FailedResource, RenderOptions, Result};
use std::sync::mpsc::{self, Sender};
use std::thread;
use tokio::sync::oneshot;

enum Command {
    Navigate(String, oneshot::Sender<Result<()>>),
    ImageReferences(oneshot::Sender<Result<Vec<String>>>),
    BeginAssetLoads(Vec<String>, oneshot::Sender<Result<()>>),
    AssetSettled(String, oneshot::Sender<Result<bool>>),
    FailedResources(oneshot::Sender<Result<Vec<FailedResource>>>),
    Capture(oneshot::Sender<Result<Vec<u8>>>),
    Close(oneshot::Sender<Result<()>>),
}

/// An async-friendly browser abstraction backed by a dedicated worker thread.
///
/// The worker thread owns a synchronous `RenderBackend` instance and executes
/// commands sent from async tasks, so request handlers can drive the blocking
/// CDP protocol without requiring the backend to be `Send` across threads.
/// One `Browser` corresponds to one backend instance and therefore to one
/// request.
#[derive(Clone)]
pub struct Browser {
    cmd_tx: Sender<Command>,
}

impl Browser {
    /// Launch the default CDP backend on a fresh worker thread.
    pub async fn launch(options: RenderOptions) -> Result<Self> {
        Self::with_factory(crate::chrome_backend_factory(options)).await
    }

    /// Create a browser over an arbitrary backend factory.
    ///
    /// The factory is invoked on the worker thread; tests use this to
    /// substitute a scripted backend.
    pub async fn with_factory(factory: BackendFactory) -> Result<Self> {
        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
        let (init_tx, init_rx): (oneshot::Sender<Result<()>>, oneshot::Receiver<Result<()>>) =
            oneshot::channel();

        thread::spawn(move || {
            // Construct the backend on the worker thread
            let mut backend = match factory() {
                Ok(backend) => backend,
                Err(err) => {
                    let _ = init_tx.send(Err(err));
                    return;
                }
            };

            let _ = init_tx.send(Ok(()));

            // Command loop
            while let Ok(cmd) = cmd_rx.recv() {
                match cmd {
                    Command::Navigate(url, resp) => {
                        let _ = resp.send(backend.navigate(&url));
                    }
                    Command::ImageReferences(resp) => {
                        let _ = resp.send(backend.image_references());
                    }
                    Command::BeginAssetLoads(urls, resp) => {
                        let _ = resp.send(backend.begin_asset_loads(&urls));
                    }
                    Command::AssetSettled(url, resp) => {
                        let _ = resp.send(backend.asset_settled(&url));
                    }
                    Command::FailedResources(resp) => {
                        let _ = resp.send(backend.failed_resources());
                    }
                    Command::Capture(resp) => {
                        let _ = resp.send(backend.capture());
                    }
                    Command::Close(resp) => {
                        let res = backend.close();
                        let _ = resp.send(res);
                        break;
                    }
                }
            }
        });

        // Wait for the worker to report initialization success or failure
        let init_res = init_rx
            .await
            .map_err(|e| Error::Launch(format!("Worker init canceled: {}", e)))?;
        init_res?;

        Ok(Self { cmd_tx })
    }

    /// Navigate to a URL and wait for the document to be parsed.
    pub async fn navigate(&self, url: &str) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        let _ = self.cmd_tx.send(Command::Navigate(url.to_string(), tx));
        rx.await
            .map_err(|e| Error::Other(format!("Navigate canceled: {}", e)))?
    }

    /// Enumerate image-bearing URLs reachable from the document.
    pub async fn image_references(&self) -> Result<Vec<String>> {
        let (tx, rx) = oneshot::channel();
        let _ = self.cmd_tx.send(Command::ImageReferences(tx));
        rx.await
            .map_err(|e| Error::Other(format!("ImageReferences canceled: {}", e)))?
    }

    /// Start out-of-band load attempts for the given URLs.
    pub async fn begin_asset_loads(&self, urls: Vec<String>) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        let _ = self.cmd_tx.send(Command::BeginAssetLoads(urls, tx));
        rx.await
            .map_err(|e| Error::Other(format!("BeginAssetLoads canceled: {}", e)))?
    }

    /// Whether the out-of-band load for `url` has settled (success or failure).
    pub async fn asset_settled(&self, url: &str) -> Result<bool> {
        let (tx, rx) = oneshot::channel();
        let _ = self.cmd_tx.send(Command::AssetSettled(url.to_string(), tx));
        rx.await
            .map_err(|e| Error::Other(format!("AssetSettled canceled: {}", e)))?
    }

    /// Subresource fetches the page reported as failed.
    pub async fn failed_resources(&self) -> Result<Vec<FailedResource>> {
        let (tx, rx) = oneshot::channel();
        let _ = self.cmd_tx.send(Command::FailedResources(tx));
        rx.await
            .map_err(|e| Error::Other(format!("FailedResources canceled: {}", e)))?
    }

    /// Capture the viewport as PNG bytes.
    pub async fn capture(&self) -> Result<Vec<u8>> {
        let (tx, rx) = oneshot::channel();
        let _ = self.cmd_tx.send(Command::Capture(tx));
        rx.await
            .map_err(|e| Error::Other(format!("Capture canceled: {}", e)))?
    }

    /// Shut down the background worker and close the backend.
    pub async fn close(self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        let _ = self.cmd_tx.send(Command::Close(tx));
        rx.await
            .map_err(|e| Error::Other(format!("Close canceled: {}", e)))?
    }
}
