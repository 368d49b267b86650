//! Logging setup and error tracing helpers
//!
//! Log output goes to stderr (stdout carries the control protocol) or, in
//! diagnostic mode, to a file. With the `otel` feature, spans are also exported
//! over OTLP.

mod error_ext;

pub use error_ext::ErrorTraceExt;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::cli::Cli;

#[cfg(feature = "otel")]
use opentelemetry::global;
#[cfg(feature = "otel")]
use opentelemetry::trace::TracerProvider;
#[cfg(feature = "otel")]
use opentelemetry_otlp::WithExportConfig;
#[cfg(feature = "otel")]
use opentelemetry_sdk::trace::SdkTracerProvider;

// Kept for flushing at shutdown
#[cfg(feature = "otel")]
static OTEL_PROVIDER: std::sync::OnceLock<SdkTracerProvider> = std::sync::OnceLock::new();

/// Flush and shut down the OpenTelemetry provider
///
/// Call before exiting so pending spans reach the collector.
#[cfg(feature = "otel")]
pub fn shutdown_otel() {
    if let Some(provider) = OTEL_PROVIDER.get() {
        tracing::info!("Shutting down OpenTelemetry provider...");
        if let Err(e) = provider.shutdown() {
            eprintln!("Failed to shutdown OpenTelemetry provider: {:?}", e);
        }
    }
}

/// Shutdown OpenTelemetry provider (no-op when feature is disabled)
#[cfg(not(feature = "otel"))]
pub fn shutdown_otel() {}

#[cfg(feature = "otel")]
fn init_otel(endpoint: &str, service_name: &str) -> anyhow::Result<SdkTracerProvider> {
    use opentelemetry_sdk::Resource;

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(
            Resource::builder()
                .with_service_name(service_name.to_owned())
                .build(),
        )
        .build();

    global::set_tracer_provider(provider.clone());

    Ok(provider)
}

/// Build an EnvFilter from CLI args and the RUST_LOG environment variable
///
/// Priority: RUST_LOG > CLI arguments (-v, -vv, -q)
pub fn build_env_filter(cli: &Cli) -> tracing_subscriber::EnvFilter {
    if let Ok(rust_log) = std::env::var("RUST_LOG") {
        if !rust_log.is_empty() {
            return tracing_subscriber::EnvFilter::new(rust_log);
        }
    }

    tracing_subscriber::EnvFilter::new(cli.log_level().as_str().to_ascii_lowercase())
}

/// Install the global subscriber with the given writer
fn install<W>(cli: &Cli, writer: W) -> anyhow::Result<()>
where
    W: for<'a> tracing_subscriber::fmt::MakeWriter<'a> + Send + Sync + 'static,
{
    let filter = build_env_filter(cli);
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false);

    #[cfg(feature = "otel")]
    {
        if let Some(endpoint) = cli.otel_endpoint.as_deref() {
            let service_name = &cli.otel_service_name;
            eprintln!("OpenTelemetry enabled: endpoint={endpoint}, service={service_name}");

            let provider = init_otel(endpoint, service_name)?;
            let tracer = provider.tracer("expo-supervisor");
            let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);
            drop(OTEL_PROVIDER.set(provider));

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .with(otel_layer)
                .try_init()?;
            return Ok(());
        }
    }

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()?;
    Ok(())
}

/// Initialize logging based on CLI arguments
pub fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    if !cli.is_otel_enabled() && cli.otel_endpoint.is_some() {
        eprintln!("--otel-endpoint given but the otel feature is not enabled, ignoring");
    }

    if cli.is_diagnostic() {
        let log_path = cli.log_path();
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::File::create(&log_path)?;
        eprintln!("Diagnostic mode: logging to {}", log_path.display());
        install(cli, std::sync::Mutex::new(file))
    } else {
        install(cli, std::io::stderr)
    }
}
