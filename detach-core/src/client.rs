//! Control-socket client
//!
//! Small synchronous TCP client used by the command-line tool to reach the
//! daemon. One request per connection: frame, send, read to the sentinel,
//! close.

use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};

use crate::config::DaemonConfig;
use crate::error::{ClientError, DetachError};
use crate::protocol::{self, Request, END_OF_MESSAGE, FIELD_SEPARATOR};
use crate::registry::ProcessRecord;
use crate::server::local_hostname;

/// Client for the daemon's control socket
pub struct DaemonClient {
    host: String,
    port: u16,
}

impl DaemonClient {
    /// Create a client for an explicit host and port
    pub fn new(host: String, port: u16) -> Self {
        Self { host, port }
    }

    /// Create a client targeting the address the daemon binds by default:
    /// the configured bind address, or the local hostname
    pub fn from_config(config: &DaemonConfig) -> Result<Self, DetachError> {
        let host = match &config.bind_address {
            Some(address) => address.clone(),
            None => local_hostname()?,
        };
        Ok(Self::new(host, config.port))
    }

    /// Send one request and return the response payload with the sentinel
    /// stripped. An empty payload is a valid response (unknown id or
    /// unrecognized request), not an error.
    pub fn send(&self, request: &Request) -> Result<String, DetachError> {
        let addr_str = format!("{}:{}", self.host, self.port);
        let addr = addr_str
            .to_socket_addrs()
            .ok()
            .and_then(|mut addrs| addrs.next())
            .ok_or_else(|| ClientError::Unreachable {
                addr: addr_str.clone(),
            })?;

        let mut stream = TcpStream::connect(addr).map_err(|_| ClientError::Unreachable {
            addr: addr_str.clone(),
        })?;

        let message = protocol::frame(&protocol::encode_request(request));
        stream
            .write_all(message.as_bytes())
            .and_then(|_| stream.flush())
            .map_err(|e| ClientError::Transport {
                reason: format!("Failed to send message: {}", e),
            })?;

        let mut response = String::new();
        let mut buffer = [0u8; 1024];
        while !response.contains(END_OF_MESSAGE) {
            let received = stream.read(&mut buffer).map_err(|e| ClientError::Transport {
                reason: format!("Failed to read response: {}", e),
            })?;
            if received == 0 {
                break;
            }
            response.push_str(&String::from_utf8_lossy(&buffer[..received]));
        }

        let body = protocol::strip_frame(&response)
            .ok_or_else(|| ClientError::Transport {
                reason: "response ended before the end-of-message sentinel".to_string(),
            })?
            .to_string();

        let _ = stream.shutdown(Shutdown::Both);
        Ok(body)
    }
}

/// Split a fetch-all payload into its individual records.
///
/// Rows that fail to parse are returned as the raw chunk so callers can show
/// them instead of failing the whole listing.
pub fn parse_records(payload: &str) -> Vec<Result<ProcessRecord, String>> {
    payload
        .split(FIELD_SEPARATOR)
        .filter(|chunk| !chunk.is_empty())
        .map(|chunk| serde_json::from_str(chunk).map_err(|_| chunk.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_records_empty_payload() {
        assert!(parse_records("").is_empty());
    }

    #[test]
    fn test_parse_records_keeps_raw_chunk_on_bad_json() {
        let payload = "{\"Id\":0,\"StartTime\":\"2026-08-27T10:00:00Z\",\"StopTime\":null}<|s|>not-json<|s|>";
        let records = parse_records(payload);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].as_ref().unwrap().id, 0);
        assert_eq!(records[1].as_ref().unwrap_err(), "not-json");
    }

    #[test]
    fn test_parse_records_preserves_order_and_stop_time() {
        let payload = "{\"Id\":0,\"StartTime\":\"2026-08-27T10:00:00Z\",\"StopTime\":\"2026-08-27T10:05:00Z\"}<|s|>{\"Id\":1,\"StartTime\":\"2026-08-27T10:01:00Z\",\"StopTime\":null}<|s|>";
        let records = parse_records(payload);
        assert_eq!(records.len(), 2);
        let first = records[0].as_ref().unwrap();
        assert_eq!(first.id, 0);
        assert!(first.stop_time.is_some());
        let second = records[1].as_ref().unwrap();
        assert_eq!(second.id, 1);
        assert!(second.stop_time.is_none());
    }

    #[test]
    fn test_unreachable_daemon_is_reported_as_client_error() {
        // Port 1 on localhost should refuse the connection
        let client = DaemonClient::new("127.0.0.1".to_string(), 1);
        let result = client.send(&Request::FetchAll);
        assert!(matches!(
            result,
            Err(DetachError::Client(ClientError::Unreachable { .. }))
        ));
    }
}
