//! Launch command: ask the daemon to start a detached process

use colored::Colorize;
use detach_core::error::DetachError;
use detach_core::protocol::Request;
use detach_core::registry::ProcessRecord;
use tracing::info;

use super::{connect, display_record};

/// Send a launch request and print the accepted record.
///
/// The working directory defaults to the client's current directory when not
/// given. The response reflects acceptance only: a bad executable still gets
/// a record, visible later via `fetch` with its stop time set.
pub fn run_launch(
    executable: String,
    working_directory: Option<String>,
    arguments: Vec<String>,
) -> Result<(), DetachError> {
    let working_directory = match working_directory {
        Some(dir) => dir,
        None => std::env::current_dir()?.to_string_lossy().into_owned(),
    };

    println!("Sending launch request...");
    info!("Launching {} in {}", executable, working_directory);

    let client = connect()?;
    let payload = client.send(&Request::Launch {
        executable,
        working_directory,
        arguments,
    })?;

    match serde_json::from_str::<ProcessRecord>(&payload) {
        Ok(record) => {
            println!("{}", "Successfully launched process:".green());
            display_record(&record);
        }
        Err(_) => {
            // Show whatever the service sent rather than failing
            println!("Did not recognize info sent by the service");
            println!("{}", payload);
        }
    }
    Ok(())
}
