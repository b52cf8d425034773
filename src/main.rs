use std::net::Ipv4Addr;
use std::process;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};

use htmltoimg::config::Settings;
use htmltoimg::http::{build_router, AppState};
use htmltoimg::render::RenderService;
use htmltoimg::store::{ObjectStore, S3Store};
use htmltoimg::{telemetry, RenderOptions};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_startup_error(&error);
        process::exit(1);
    }
}

fn report_startup_error(error: &anyhow::Error) {
    if tracing::dispatcher::has_been_set() {
        error!(error = %error, "service failed to start");
    } else {
        eprintln!("service failed to start: {error:#}");
    }
}

async fn run() -> anyhow::Result<()> {
    let settings = Settings::parse();
    telemetry::init(&settings).context("failed to initialize logging")?;

    let store = settings
        .store()
        .map(|store_settings| Arc::new(S3Store::new(store_settings)) as Arc<dyn ObjectStore>);
    if store.is_none() {
        warn!("object store is not configured; render requests will fail at the upload step");
    }

    let service = RenderService::new(RenderOptions::default(), settings.compression(), store);
    let app = build_router(AppState {
        render: Arc::new(service),
    });

    let listener = tokio::net::TcpListener::bind((Ipv4Addr::UNSPECIFIED, settings.port))
        .await
        .with_context(|| format!("failed to bind port {}", settings.port))?;

    info!(
        host = %Ipv4Addr::UNSPECIFIED,
        port = settings.port,
        bucket = settings.store_bucket.as_deref().unwrap_or("<unconfigured>"),
        "starting HTML to image service"
    );

    axum::serve(listener, app.into_make_service())
        .await
        .context("server error")?;

    Ok(())
}
