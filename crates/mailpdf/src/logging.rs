//! Logging setup for the command-line binary.
//!
//! `RUST_LOG` takes precedence over the verbosity flag. Records emitted
//! through the `log` facade are forwarded into tracing.

use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter};

/// Filter used when `RUST_LOG` is not set.
fn default_directive(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "mailpdf=debug,info",
        _ => "trace",
    }
}

/// Installs the global subscriber. Fails if one is already installed.
pub fn init(verbose: u8) -> Result<(), String> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    let subscriber = tracing_subscriber::registry().with(env_filter).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(verbose > 0),
    );

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| format!("Failed to initialize tracing: {}", e))?;
    tracing_log::LogTracer::init().map_err(|e| format!("Failed to bridge log records: {}", e))?;

    Ok(())
}
