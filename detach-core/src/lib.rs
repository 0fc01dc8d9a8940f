//! Core library for the detach process-control daemon
//!
//! This crate provides the wire protocol, the process registry, the process
//! supervisor, and the TCP connection server, plus the client used by the
//! command-line tool.

pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod supervisor;

/// Initialize logging infrastructure
///
/// Sets up tracing with systemd journal logging for production use.
/// In development, logs to stderr with appropriate formatting.
pub fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    // Try to use systemd journal logging if available
    #[cfg(target_os = "linux")]
    {
        if std::env::var("JOURNAL_STREAM").is_ok() {
            // We're running under systemd, use journal logging
            let journal_layer = tracing_journald::layer()?;
            tracing_subscriber::registry()
                .with(journal_layer)
                .with(tracing_subscriber::filter::LevelFilter::INFO)
                .init();
            return Ok(());
        }
    }

    // Fallback to stderr logging with pretty formatting
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().pretty())
        .with(tracing_subscriber::filter::LevelFilter::INFO)
        .init();

    Ok(())
}
