//! Tracing installation

use tracing_subscriber::{
    filter::Directive,
    fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::{LogFormat, Settings};
use crate::{Error, Result};

/// Install a global tracing subscriber using the provided settings.
pub fn init(settings: &Settings) -> Result<()> {
    let default_directive = settings.log_level.parse::<Directive>().map_err(|err| {
        Error::Other(format!(
            "invalid log level '{}': {}",
            settings.log_level, err
        ))
    })?;

    let env_filter = EnvFilter::builder()
        .with_default_directive(default_directive)
        .from_env_lossy();

    let fmt_layer = match settings.log_format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|err| Error::Other(format!("failed to install tracing subscriber: {}", err)))
}
