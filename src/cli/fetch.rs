//! Fetch command: list every process the daemon has launched

use detach_core::client::parse_records;
use detach_core::error::DetachError;
use detach_core::protocol::Request;
use detach_core::registry::ProcessRecord;

use super::connect;

/// Send a fetch-all request and print the records as an aligned table.
/// Rows the client cannot parse are printed raw.
pub fn run_fetch() -> Result<(), DetachError> {
    println!("Fetching process info...");

    let client = connect()?;
    let payload = client.send(&Request::FetchAll)?;

    println!("{:>3}  {:>27}  {:>27}", "ID", "StartTime", "StopTime");
    for record in parse_records(&payload) {
        match record {
            Ok(record) => println!("{}", format_row(&record)),
            Err(raw) => {
                println!("Did not recognize info sent by the service");
                println!("{}", raw);
            }
        }
    }
    Ok(())
}

fn format_row(record: &ProcessRecord) -> String {
    let start = record.start_time.format("%Y-%m-%d %H:%M:%S").to_string();
    let stop = match &record.stop_time {
        Some(stop_time) => stop_time.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => "-".to_string(),
    };
    format!("{:>3}  {:>27}  {:>27}", record.id, start, stop)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_row_running_process_shows_dash() {
        let record = ProcessRecord {
            id: 3,
            start_time: chrono::Utc.with_ymd_and_hms(2026, 8, 27, 10, 0, 0).unwrap(),
            stop_time: None,
            cancel: Default::default(),
        };
        let row = format_row(&record);
        assert!(row.contains("  3  "));
        assert!(row.contains("2026-08-27 10:00:00"));
        assert!(row.trim_end().ends_with('-'));
    }

    #[test]
    fn test_format_row_completed_process_shows_stop_time() {
        let record = ProcessRecord {
            id: 0,
            start_time: chrono::Utc.with_ymd_and_hms(2026, 8, 27, 10, 0, 0).unwrap(),
            stop_time: Some(chrono::Utc.with_ymd_and_hms(2026, 8, 27, 10, 5, 0).unwrap()),
            cancel: Default::default(),
        };
        assert!(format_row(&record).contains("2026-08-27 10:05:00"));
    }
}
