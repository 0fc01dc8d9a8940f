//! Client commands for the control socket
//!
//! Each command maps 1:1 onto one wire command: launch, close (cancel), and
//! fetch. They connect, exchange one framed message, and pretty-print the
//! result.

pub mod close;
pub mod fetch;
pub mod launch;

use detach_core::client::DaemonClient;
use detach_core::config::load_config;
use detach_core::error::DetachError;
use detach_core::registry::ProcessRecord;

/// Build a client for the daemon address derived from the user configuration
pub(crate) fn connect() -> Result<DaemonClient, DetachError> {
    let config = load_config()?;
    DaemonClient::from_config(&config)
}

/// Print one record's fields, one per line
pub(crate) fn display_record(record: &ProcessRecord) {
    println!("ID: {}", record.id);
    println!("Start time: {}", record.start_time);
    match &record.stop_time {
        Some(stop_time) => println!("Stop time: {}", stop_time),
        None => println!("Stop time: -"),
    }
}
