//! Structured logging setup: a `tracing_subscriber::FmtSubscriber` writing to
//! stderr, switching between pretty and JSON lines by output format, both
//! driven by `RUST_LOG` via `EnvFilter::from_default_env()`.

use tracing_subscriber::FmtSubscriber;

use crate::cli::OutputFormat;

/// Installs the global `tracing` subscriber. Must be called once, at process
/// start, before any other module logs.
pub fn setup_logging(format: OutputFormat) {
    let builder = FmtSubscriber::builder()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr);

    match format {
        OutputFormat::Jsonl => {
            let subscriber = builder.json().finish();
            let _ = tracing::subscriber::set_global_default(subscriber);
        }
        OutputFormat::Pretty => {
            let subscriber = builder.pretty().finish();
            let _ = tracing::subscriber::set_global_default(subscriber);
        }
    }
}
