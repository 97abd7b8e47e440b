//! Logging and trace export for the `gitdoc` binary.
//!
//! The library only emits `tracing` events; installing a subscriber is the
//! binary's job. Output is chosen by `OTEL_EXPORTER_OTLP_ENDPOINT`:
//! - unset → compact human-readable log lines on stderr
//! - `"stderr"` → JSON events and span closings on stderr
//! - `"http://..."` → OTLP HTTP export of traces and logs (`otel` feature)
//!
//! The level comes from `RUST_LOG` when set, otherwise from the CLI verbosity.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

/// Dropping the guard flushes and shuts down any OTLP pipeline.
/// Hold it in `main()` until exit.
pub struct TelemetryGuard {
    #[cfg(feature = "otel")]
    providers: Option<(
        opentelemetry_sdk::trace::SdkTracerProvider,
        opentelemetry_sdk::logs::SdkLoggerProvider,
    )>,
}

impl TelemetryGuard {
    const fn empty() -> Self {
        Self {
            #[cfg(feature = "otel")]
            providers: None,
        }
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        #[cfg(feature = "otel")]
        if let Some((traces, logs)) = self.providers.take() {
            if let Err(e) = traces.shutdown() {
                eprintln!("otel trace shutdown error: {e}");
            }
            if let Err(e) = logs.shutdown() {
                eprintln!("otel log shutdown error: {e}");
            }
        }
    }
}

/// Install the global subscriber. `verbosity` counts `-v` flags.
#[must_use]
pub fn init(verbosity: u8) -> TelemetryGuard {
    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok().as_deref() {
        None | Some("") => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .compact()
                        .with_writer(std::io::stderr),
                )
                .init();
            TelemetryGuard::empty()
        }
        Some("stderr") => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr)
                        .with_span_events(tracing_subscriber::fmt::format::FmtSpan::CLOSE),
                )
                .init();
            TelemetryGuard::empty()
        }
        #[cfg(feature = "otel")]
        Some(_) => init_otlp(filter),
        #[cfg(not(feature = "otel"))]
        Some(_) => {
            eprintln!(
                "warning: OTEL_EXPORTER_OTLP_ENDPOINT set but gitdoc built without 'otel' feature"
            );
            TelemetryGuard::empty()
        }
    }
}

/// OTLP HTTP export. The SDK reads the endpoint from the environment itself.
#[cfg(feature = "otel")]
fn init_otlp(filter: EnvFilter) -> TelemetryGuard {
    use opentelemetry::KeyValue;
    use opentelemetry::trace::TracerProvider as _;

    let resource = opentelemetry_sdk::Resource::builder()
        .with_attribute(KeyValue::new("service.name", env!("CARGO_PKG_NAME")))
        .with_attribute(KeyValue::new("service.version", env!("CARGO_PKG_VERSION")))
        .build();

    let span_exporter = match opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .build()
    {
        Ok(e) => e,
        Err(e) => {
            eprintln!("warning: failed to init OTLP span exporter: {e}");
            return TelemetryGuard::empty();
        }
    };
    let log_exporter = match opentelemetry_otlp::LogExporter::builder()
        .with_http()
        .build()
    {
        Ok(e) => e,
        Err(e) => {
            eprintln!("warning: failed to init OTLP log exporter: {e}");
            return TelemetryGuard::empty();
        }
    };

    let traces = opentelemetry_sdk::trace::SdkTracerProvider::builder()
        .with_simple_exporter(span_exporter)
        .with_resource(resource.clone())
        .build();
    let logs = opentelemetry_sdk::logs::SdkLoggerProvider::builder()
        .with_simple_exporter(log_exporter)
        .with_resource(resource)
        .build();

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_opentelemetry::layer().with_tracer(traces.tracer(env!("CARGO_PKG_NAME"))))
        .with(opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge::new(&logs))
        .init();

    TelemetryGuard {
        providers: Some((traces, logs)),
    }
}
