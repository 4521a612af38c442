//! Tracing subscriber initialization with structured logging and optional
//! OpenTelemetry trace export.
//!
//! # Usage
//!
//! ```no_run
//! use cadence_types::config::LogConfig;
//!
//! // Configured level, pretty output
//! cadence_observe::init_tracing(&LogConfig::default(), None).unwrap();
//! ```

use std::sync::OnceLock;

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use cadence_types::config::{LogConfig, LogFormat};

/// Stores the OTel tracer provider so it can be shut down cleanly on exit.
static TRACER_PROVIDER: OnceLock<SdkTracerProvider> = OnceLock::new();

/// Filter directives used when `RUST_LOG` is unset.
///
/// A level passed on the command line wins over the configured one.
pub fn default_directives<'a>(config: &'a LogConfig, level_override: Option<&'a str>) -> &'a str {
    level_override.unwrap_or(config.level.as_str())
}

/// Initialize the global tracing subscriber.
///
/// - `RUST_LOG` takes precedence; otherwise `level_override`, then
///   `config.level`.
/// - `config.format` selects human-readable or JSON lines output.
/// - When `config.otel` is true, spans are also bridged to OpenTelemetry
///   using a stdout exporter.
///
/// # Errors
///
/// Returns an error if the global subscriber has already been set.
pub fn init_tracing(
    config: &LogConfig,
    level_override: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(config, level_override)));

    let (pretty_layer, json_layer) = match config.format {
        LogFormat::Pretty => (
            Some(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_span_events(FmtSpan::CLOSE),
            ),
            None,
        ),
        LogFormat::Json => (
            None,
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true),
            ),
        ),
    };

    let otel_layer = if config.otel {
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(opentelemetry_stdout::SpanExporter::default())
            .build();
        let tracer = provider.tracer("cadence");

        // Store the provider for shutdown and register it globally.
        let _ = TRACER_PROVIDER.set(provider.clone());
        opentelemetry::global::set_tracer_provider(provider);
        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(pretty_layer)
        .with(json_layer)
        .with(otel_layer)
        .try_init()?;

    Ok(())
}

/// Flush pending traces and shut down the OpenTelemetry tracer provider.
///
/// Safe to call even when OTel was not enabled (no-op in that case).
pub fn shutdown_tracing() {
    if let Some(provider) = TRACER_PROVIDER.get() {
        if let Err(e) = provider.shutdown() {
            eprintln!("Warning: OTel tracer provider shutdown error: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_wins_over_config_level() {
        let config = LogConfig {
            level: "warn".to_string(),
            ..Default::default()
        };
        assert_eq!(default_directives(&config, None), "warn");
        assert_eq!(default_directives(&config, Some("debug")), "debug");
    }

    #[test]
    fn test_second_init_fails() {
        let config = LogConfig::default();
        // Whichever test initializes first wins; the second attempt errors.
        let first = init_tracing(&config, Some("off"));
        let second = init_tracing(&config, Some("off"));
        assert!(first.is_err() || second.is_err());
    }
}
