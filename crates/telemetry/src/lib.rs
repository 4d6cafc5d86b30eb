//! Logging and tracing bootstrap.

use anyhow::anyhow;
use tracing_subscriber::{fmt, EnvFilter};
use turfbook_kernel::settings::{LogFormat, TelemetrySettings};

/// Build the filter: `RUST_LOG` wins over the configured directive.
pub fn env_filter(settings: &TelemetrySettings) -> anyhow::Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&settings.filter)
            .map_err(|e| anyhow!("invalid telemetry filter '{}': {}", settings.filter, e)),
    }
}

/// Install the global tracing subscriber.
///
/// Calling it again after a subscriber is installed is a no-op.
pub fn init(settings: &TelemetrySettings) -> anyhow::Result<()> {
    let filter = env_filter(settings)?;

    let installed = match settings.log_format {
        LogFormat::Pretty => fmt().with_env_filter(filter).with_target(true).try_init(),
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .try_init(),
    };

    if installed.is_ok() {
        tracing::info!(
            target: "turfbook-telemetry",
            format = ?settings.log_format,
            "telemetry initialized"
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_filter() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let settings = TelemetrySettings {
            log_format: LogFormat::Pretty,
            filter: "turfbook=loud".to_string(),
        };
        assert!(env_filter(&settings).is_err());
    }

    #[test]
    fn init_twice_is_harmless() {
        let settings = TelemetrySettings {
            log_format: LogFormat::Json,
            ..TelemetrySettings::default()
        };
        init(&settings).unwrap();
        init(&settings).unwrap();
    }
}
