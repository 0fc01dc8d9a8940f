//! Close command: request cooperative cancellation of a launched process

use colored::Colorize;
use detach_core::error::DetachError;
use detach_core::protocol::Request;
use detach_core::registry::ProcessRecord;
use tracing::info;

use super::{connect, display_record};

/// Send a cancel request for `process_id` and print the outcome.
///
/// An empty payload means the service did not know the id; that is reported
/// to the user, not treated as a transport error. A non-empty payload does
/// not guarantee the process has exited; cancellation is best-effort.
pub fn run_close(process_id: u32) -> Result<(), DetachError> {
    println!("Sending cancel request...");
    info!("Cancelling process {}", process_id);

    let client = connect()?;
    let payload = client.send(&Request::Cancel { id: process_id })?;

    if payload.is_empty() {
        println!(
            "{}",
            "Service could not identify the process to cancel".yellow()
        );
        return Ok(());
    }

    match serde_json::from_str::<ProcessRecord>(&payload) {
        Ok(record) => {
            println!("{}", "Successfully cancelled process:".green());
            display_record(&record);
        }
        Err(_) => {
            println!("Did not recognize info sent by the service");
            println!("{}", payload);
        }
    }
    Ok(())
}
