//! Logging bootstrap shared by the server and the admin CLI.

use anyhow::Context;
use bookcourier_kernel::settings::{LogFormat, TelemetrySettings};
use tracing_subscriber::EnvFilter;

/// Build the log filter: `RUST_LOG` when set, otherwise the configured directives.
pub fn env_filter(settings: &TelemetrySettings) -> anyhow::Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&settings.log_filter)
            .with_context(|| format!("invalid log filter '{}'", settings.log_filter)),
    }
}

/// Install the global tracing subscriber.
///
/// Calling this twice is harmless; the second call keeps the first subscriber.
pub fn init(settings: &TelemetrySettings) -> anyhow::Result<()> {
    let filter = env_filter(settings)?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let installed = match settings.log_format {
        LogFormat::Pretty => builder.with_target(true).try_init(),
        LogFormat::Json => builder.json().flatten_event(true).try_init(),
    };

    if installed.is_ok() {
        tracing::info!(
            target: "bookcourier-telemetry",
            format = ?settings.log_format,
            "logging initialized"
        );
    }

    Ok(())
}
