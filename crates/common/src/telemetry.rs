//! Tracing subscriber setup with optional OTLP export

use crate::config::ObservabilityConfig;
use crate::errors::{AppError, Result};
use opentelemetry::{trace::TracerProvider as _, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    runtime,
    trace::{self as sdktrace, BatchSpanProcessor},
    Resource,
};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is not set
fn default_filter(config: &ObservabilityConfig) -> String {
    format!(
        "{level},sonar_deposit_common={level},tower_http={level}",
        level = config.log_level
    )
}

fn tracer_provider(endpoint: &str, service_name: &str) -> Result<sdktrace::TracerProvider> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| AppError::Configuration {
            message: format!("Failed to build span exporter: {}", e),
        })?;

    let processor = BatchSpanProcessor::builder(exporter, runtime::Tokio).build();
    let resource = Resource::new(vec![
        KeyValue::new("service.name", service_name.to_string()),
        KeyValue::new("service.version", crate::VERSION),
    ]);

    Ok(sdktrace::TracerProvider::builder()
        .with_span_processor(processor)
        .with_resource(resource)
        .build())
}

/// Flushes pending spans when dropped
pub struct TelemetryGuard {
    provider: Option<sdktrace::TracerProvider>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.provider.take() {
            if let Err(e) = provider.shutdown() {
                eprintln!("Failed to shut down tracer provider: {}", e);
            }
        }
    }
}

/// Install the global subscriber: JSON or pretty logs, env filter, and an
/// OpenTelemetry layer when an endpoint is configured.
///
/// Must be called from within a tokio runtime when OTLP export is enabled.
pub fn init_tracing(config: &ObservabilityConfig) -> Result<TelemetryGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(config)));

    let provider = config
        .otel_endpoint
        .as_deref()
        .map(|endpoint| tracer_provider(endpoint, &config.service_name))
        .transpose()?;
    let otel_layer = provider.as_ref().map(|provider| {
        tracing_opentelemetry::layer().with_tracer(provider.tracer(config.service_name.clone()))
    });
    if let Some(provider) = &provider {
        opentelemetry::global::set_tracer_provider(provider.clone());
    }

    let json_layer = config
        .json_logging
        .then(|| fmt::layer().json().with_target(true));
    let pretty_layer = (!config.json_logging).then(|| fmt::layer().with_target(true));

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(pretty_layer)
        .with(otel_layer)
        .try_init()
        .map_err(|e| AppError::Configuration {
            message: format!("Failed to install tracing subscriber: {}", e),
        })?;

    tracing::info!(
        service = %config.service_name,
        json = config.json_logging,
        otel = config.otel_endpoint.is_some(),
        "Tracing initialized"
    );

    Ok(TelemetryGuard { provider })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_uses_level() {
        let config = ObservabilityConfig {
            log_level: "debug".into(),
            ..ObservabilityConfig::default()
        };
        let filter = default_filter(&config);
        assert!(filter.starts_with("debug,"));
        assert!(filter.contains("tower_http=debug"));
    }

    #[test]
    fn test_guard_without_provider() {
        drop(TelemetryGuard { provider: None });
    }
}
